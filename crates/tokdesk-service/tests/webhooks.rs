//! Payment webhook integration tests.

mod common;

use common::{TestHarness, ADMIN_KEY};
use serde_json::json;

use tokdesk_service::crypto::hmac_sha256_hex;

const WEBHOOK_SECRET: &str = "whsec_test";

fn signed_harness() -> TestHarness {
    TestHarness::build(|config| {
        config.gateway_webhook_secret = Some(WEBHOOK_SECRET.to_string());
    })
}

/// Record a pending purchase directly through the engine, as if the gateway
/// invoice had been created out of band.
fn record_pending(harness: &TestHarness, account_id: &str, tokens: i64, external_id: &str) {
    let account_id = account_id.parse().expect("account id");
    harness
        .state
        .reconcile
        .initiate_purchase(account_id, tokens, external_id.to_string(), "Starter")
        .expect("pending payment");
}

// ============================================================================
// Unsigned mode (no webhook secret configured)
// ============================================================================

#[tokio::test]
async fn paid_webhook_credits_balance() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    let response = harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "paid",
            "amount": 10.0,
            "currency": "usd",
            "description": "100 tokens - Starter"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body.get("amountMismatch").is_none());
    assert_eq!(harness.balance(&account_id).await, 100);
}

#[tokio::test]
async fn amount_mismatch_is_reported_in_acknowledgement() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    let response = harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "paid",
            "description": "250 tokens - Plus"
        }))
        .await;

    // The recorded amount is credited; the disagreement comes back to the
    // caller instead of living only in the logs.
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["amountMismatch"]["creditedTokens"], 100);
    assert_eq!(body["amountMismatch"]["reportedTokens"], 250);
    assert_eq!(harness.balance(&account_id).await, 100);
}

#[tokio::test]
async fn duplicate_paid_webhook_credits_once() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    let payload = json!({
        "externalId": "pay_1",
        "status": "paid",
        "description": "100 tokens - Starter"
    });

    for _ in 0..3 {
        harness
            .server
            .post("/webhooks/payment")
            .json(&payload)
            .await
            .assert_status_ok();
    }

    assert_eq!(harness.balance(&account_id).await, 100);
}

#[tokio::test]
async fn expired_webhook_fails_payment_without_credit() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "expired",
            "description": "100 tokens - Starter"
        }))
        .await
        .assert_status_ok();

    // A late confirmation must not revive the failed payment.
    harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "paid",
            "description": "100 tokens - Starter"
        }))
        .await
        .assert_status_ok();

    assert_eq!(harness.balance(&account_id).await, 0);
}

#[tokio::test]
async fn unmatched_payment_returns_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_ghost",
            "status": "paid",
            "description": "100 tokens - Starter"
        }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn waiting_status_is_acknowledged_without_effect() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "waiting",
            "description": "100 tokens - Starter"
        }))
        .await
        .assert_status_ok();

    assert_eq!(harness.balance(&account_id).await, 0);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/webhooks/payment")
        .json(&json!({ "status": "paid" }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn paid_without_token_quantity_is_rejected() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    let response = harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "paid",
            "description": "thanks for your purchase"
        }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(harness.balance(&account_id).await, 0);
}

// ============================================================================
// Signed mode
// ============================================================================

#[tokio::test]
async fn valid_signature_is_accepted() {
    let harness = signed_harness();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    let body = json!({
        "externalId": "pay_1",
        "status": "paid",
        "description": "100 tokens - Starter"
    })
    .to_string();
    let signature = hmac_sha256_hex(WEBHOOK_SECRET, &body);

    let response = harness
        .server
        .post("/webhooks/payment")
        .add_header("x-gateway-signature", signature)
        .text(&body)
        .await;

    response.assert_status_ok();
    assert_eq!(harness.balance(&account_id).await, 100);
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let harness = signed_harness();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    let body = json!({
        "externalId": "pay_1",
        "status": "paid",
        "description": "100 tokens - Starter"
    })
    .to_string();

    let response = harness
        .server
        .post("/webhooks/payment")
        .add_header("x-gateway-signature", "deadbeef")
        .text(&body)
        .await;

    response.assert_status_unauthorized();
    assert_eq!(harness.balance(&account_id).await, 0);
}

#[tokio::test]
async fn missing_signature_is_rejected_when_secret_configured() {
    let harness = signed_harness();

    let response = harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "paid",
            "description": "100 tokens - Starter"
        }))
        .await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Admin surface sanity
// ============================================================================

#[tokio::test]
async fn webhook_endpoint_is_not_behind_admin_key() {
    let harness = TestHarness::new();
    let account_id = harness.create_account(100).await;
    record_pending(&harness, &account_id, 100, "pay_1");

    // No x-admin-key header; the webhook must still be reachable.
    harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "externalId": "pay_1",
            "status": "paid",
            "description": "100 tokens - Starter"
        }))
        .await
        .assert_status_ok();

    // But the admin surface is not.
    harness
        .server
        .get("/v1/payments/stuck")
        .await
        .assert_status_unauthorized();
    harness
        .server
        .get("/v1/payments/stuck")
        .add_header("x-admin-key", "wrong-key")
        .await
        .assert_status_unauthorized();
    harness
        .server
        .get("/v1/payments/stuck")
        .add_header("x-admin-key", ADMIN_KEY)
        .await
        .assert_status_ok();
}
