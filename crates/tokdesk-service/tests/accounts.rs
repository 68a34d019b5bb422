//! Account administration integration tests.

mod common;

use common::{TestHarness, ADMIN_KEY};
use serde_json::json;

#[tokio::test]
async fn create_account_is_idempotent_per_chat() {
    let harness = TestHarness::new();

    let first = harness.create_account(100).await;
    let second = harness.create_account(100).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn new_account_starts_with_zero_balance() {
    let harness = TestHarness::new();

    let account_id = harness.create_account(100).await;

    assert_eq!(harness.balance(&account_id).await, 0);
}

#[tokio::test]
async fn get_missing_account_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/accounts/00000000-0000-4000-8000-000000000000")
        .add_header("x-admin-key", ADMIN_KEY)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn adjustment_moves_balance_and_records_transaction() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;

    let response = harness
        .server
        .post(&format!("/v1/accounts/{account_id}/adjust"))
        .add_header("x-admin-key", ADMIN_KEY)
        .add_header("x-admin-id", "alice")
        .json(&json!({ "amountTokens": 500, "reason": "promo credit" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["amountTokens"], 500);
    assert_eq!(body["kind"], "admin_credit");
    assert_eq!(body["balanceAfterTokens"], 500);
    assert_eq!(body["description"], "promo credit (by alice)");

    assert_eq!(harness.balance(&account_id).await, 500);
}

#[tokio::test]
async fn negative_adjustment_cannot_overdraw() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    harness.fund(&account_id, 100).await;

    harness
        .server
        .post(&format!("/v1/accounts/{account_id}/adjust"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({ "amountTokens": -150, "reason": "correction" }))
        .await
        .assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);

    assert_eq!(harness.balance(&account_id).await, 100);
}

#[tokio::test]
async fn zero_adjustment_is_rejected() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;

    harness
        .server
        .post(&format!("/v1/accounts/{account_id}/adjust"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({ "amountTokens": 0, "reason": "noop" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn transaction_history_is_newest_first_and_paginated() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;

    harness.fund(&account_id, 100).await;
    harness.fund(&account_id, 200).await;
    harness.fund(&account_id, 300).await;

    let response = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/transactions"))
        .add_header("x-admin-key", ADMIN_KEY)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0]["amountTokens"], 300);
    assert_eq!(transactions[2]["amountTokens"], 100);

    let page: serde_json::Value = harness
        .server
        .get(&format!(
            "/v1/accounts/{account_id}/transactions?limit=1&offset=1"
        ))
        .add_header("x-admin-key", ADMIN_KEY)
        .await
        .json();
    let page = page["transactions"].as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["amountTokens"], 200);
}

#[tokio::test]
async fn account_orders_listing_includes_closed_orders() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 300).await;

    let order: serde_json::Value = harness
        .server
        .post("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "accountId": account_id,
            "profileId": profile_id,
            "package": 3
        }))
        .await
        .json();
    let order_id = order["id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/v1/orders/{order_id}/status"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({ "newStatus": "cancelled" }))
        .await
        .assert_status_ok();

    // Cancelled orders leave the work queue but stay in the account history.
    let queue: serde_json::Value = harness
        .server
        .get("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .await
        .json();
    assert!(queue["orders"].as_array().unwrap().is_empty());

    let history: serde_json::Value = harness
        .server
        .get(&format!("/v1/accounts/{account_id}/orders"))
        .add_header("x-admin-key", ADMIN_KEY)
        .await
        .json();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "cancelled");
}

#[tokio::test]
async fn admin_surface_requires_key() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/accounts")
        .json(&json!({ "chatId": 100 }))
        .await
        .assert_status_unauthorized();

    harness
        .server
        .get("/v1/orders")
        .add_header("x-admin-key", "nope")
        .await
        .assert_status_unauthorized();
}
