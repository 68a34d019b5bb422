//! Order lifecycle integration tests.

mod common;

use common::{TestHarness, ADMIN_KEY};
use serde_json::json;

async fn create_order(
    harness: &TestHarness,
    account_id: &str,
    profile_id: &str,
    package: u32,
) -> axum_test::TestResponse {
    harness
        .server
        .post("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "accountId": account_id,
            "profileId": profile_id,
            "package": package
        }))
        .await
}

async fn update_status(
    harness: &TestHarness,
    order_id: &str,
    new_status: &str,
) -> axum_test::TestResponse {
    harness
        .server
        .post(&format!("/v1/orders/{order_id}/status"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({ "newStatus": new_status }))
        .await
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn create_order_debits_cost_atomically() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 300).await;

    let response = create_order(&harness, &account_id, &profile_id, 3).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["costTokens"], 250);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["queuePosition"], 1);

    assert_eq!(harness.balance(&account_id).await, 50);
}

#[tokio::test]
async fn insufficient_balance_rejects_with_402_and_no_order() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 100).await;

    let response = create_order(&harness, &account_id, &profile_id, 3).await;

    response.assert_status(axum::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(harness.balance(&account_id).await, 100);

    let queue = harness
        .server
        .get("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .await;
    queue.assert_status_ok();
    let body: serde_json::Value = queue.json();
    assert!(body["orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_package_is_rejected() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 1000).await;

    create_order(&harness, &account_id, &profile_id, 7)
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn foreign_profile_is_forbidden() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    harness.fund(&account_id, 1000).await;

    // Profile belongs to a different chat's account.
    let _other_account = harness.create_account(200).await;
    let foreign_profile = harness.complete_intake(200).await;

    create_order(&harness, &account_id, &foreign_profile, 1)
        .await
        .assert_status_forbidden();
}

#[tokio::test]
async fn verification_add_on_is_charged() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 200).await;

    let response = harness
        .server
        .post("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "accountId": account_id,
            "profileId": profile_id,
            "package": 1,
            "verification": true
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["costTokens"], 125);
    assert_eq!(harness.balance(&account_id).await, 75);
}

// ============================================================================
// Queue ordering
// ============================================================================

#[tokio::test]
async fn queue_positions_are_monotonic_and_priority_sorts_first() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 1000).await;

    create_order(&harness, &account_id, &profile_id, 1)
        .await
        .assert_status_ok();
    create_order(&harness, &account_id, &profile_id, 1)
        .await
        .assert_status_ok();

    // Third order is priority and must jump the queue.
    harness
        .server
        .post("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({
            "accountId": account_id,
            "profileId": profile_id,
            "package": 1,
            "priority": true
        }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0]["queuePosition"], 3);
    assert_eq!(orders[0]["priority"], true);
    assert_eq!(orders[1]["queuePosition"], 1);
    assert_eq!(orders[2]["queuePosition"], 2);
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn full_lifecycle_to_completed() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 300).await;

    let order: serde_json::Value = create_order(&harness, &account_id, &profile_id, 3)
        .await
        .json();
    let order_id = order["id"].as_str().unwrap();

    let processing = update_status(&harness, order_id, "processing").await;
    processing.assert_status_ok();
    let body: serde_json::Value = processing.json();
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["notificationEmitted"], true);

    let assigned = update_status(&harness, order_id, "assigned").await;
    assigned.assert_status_ok();
    let body: serde_json::Value = assigned.json();
    assert!(body["order"]["assignedAt"].is_string());
    let completed = update_status(&harness, order_id, "completed").await;
    completed.assert_status_ok();
    let body: serde_json::Value = completed.json();
    assert!(body["order"]["completedAt"].is_string());

    // Completion does not refund.
    assert_eq!(harness.balance(&account_id).await, 50);
}

#[tokio::test]
async fn illegal_transition_returns_conflict() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 300).await;

    let order: serde_json::Value = create_order(&harness, &account_id, &profile_id, 3)
        .await
        .json();
    let order_id = order["id"].as_str().unwrap();

    // Pending cannot jump straight to completed.
    update_status(&harness, order_id, "completed")
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);

    // The order is untouched.
    let queue: serde_json::Value = harness
        .server
        .get("/v1/orders")
        .add_header("x-admin-key", ADMIN_KEY)
        .await
        .json();
    assert_eq!(queue["orders"][0]["status"], "pending");
}

#[tokio::test]
async fn cancellation_refunds_exactly_once() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 300).await;

    let order: serde_json::Value = create_order(&harness, &account_id, &profile_id, 3)
        .await
        .json();
    let order_id = order["id"].as_str().unwrap();
    assert_eq!(harness.balance(&account_id).await, 50);

    update_status(&harness, order_id, "cancelled")
        .await
        .assert_status_ok();
    assert_eq!(harness.balance(&account_id).await, 300);

    // Cancelled is terminal; no further transitions, no second refund.
    update_status(&harness, order_id, "cancelled")
        .await
        .assert_status(axum::http::StatusCode::CONFLICT);
    assert_eq!(harness.balance(&account_id).await, 300);
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let harness = TestHarness::new();

    update_status(&harness, "01ARZ3NDEKTSV4RRFFQ69G5FAV", "assigned")
        .await
        .assert_status_not_found();
}

// ============================================================================
// Reruns
// ============================================================================

#[tokio::test]
async fn rerun_of_completed_order_charges_rerun_price() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 500).await;

    let order: serde_json::Value = create_order(&harness, &account_id, &profile_id, 3)
        .await
        .json();
    let order_id = order["id"].as_str().unwrap();

    update_status(&harness, order_id, "processing").await.assert_status_ok();
    update_status(&harness, order_id, "assigned").await.assert_status_ok();
    update_status(&harness, order_id, "completed").await.assert_status_ok();
    assert_eq!(harness.balance(&account_id).await, 250);

    let response = harness
        .server
        .post(&format!("/v1/orders/{order_id}/rerun"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    let rerun: serde_json::Value = response.json();
    assert_eq!(rerun["costTokens"], 100);
    assert_eq!(rerun["rerunOf"].as_str().unwrap(), order_id);
    assert_eq!(harness.balance(&account_id).await, 150);
}

#[tokio::test]
async fn rerun_of_open_order_is_rejected() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    let profile_id = harness.complete_intake(100).await;
    harness.fund(&account_id, 300).await;

    let order: serde_json::Value = create_order(&harness, &account_id, &profile_id, 3)
        .await
        .json();
    let order_id = order["id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/v1/orders/{order_id}/rerun"))
        .add_header("x-admin-key", ADMIN_KEY)
        .json(&json!({}))
        .await
        .assert_status_bad_request();
}
