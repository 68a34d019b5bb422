//! Payment gateway webhook handler.
//!
//! The webhook endpoint is not behind the admin key; authenticity comes from
//! the HMAC signature when a webhook secret is configured. The raw body must
//! be verified before deserialization.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use tokdesk_engine::{PaymentEvent, PaymentEventStatus, WebhookOutcome};

use crate::crypto::verify_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Webhook payload from the payment gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// The gateway's payment id.
    pub external_id: String,
    /// Payment status string.
    pub status: String,
    /// Reported amount, in the gateway's currency.
    pub amount: Option<f64>,
    /// Currency code.
    pub currency: Option<String>,
    /// Invoice description.
    #[serde(default)]
    pub description: String,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// Whether the event was accepted.
    pub success: bool,
    /// Set when the event's reported token quantity disagrees with the
    /// amount actually credited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_mismatch: Option<AmountMismatch>,
}

/// Disagreement between the gateway's report and the credited ledger entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountMismatch {
    /// Tokens credited, from the recorded pending transaction.
    pub credited_tokens: i64,
    /// Tokens the gateway's description reported.
    pub reported_tokens: i64,
}

/// Map a gateway status string onto a payment event status.
#[must_use]
pub fn parse_status(status: &str) -> PaymentEventStatus {
    match status {
        "paid" => PaymentEventStatus::Paid,
        "expired" => PaymentEventStatus::Expired,
        "failed" => PaymentEventStatus::Failed,
        "waiting" => PaymentEventStatus::Waiting,
        "confirming" => PaymentEventStatus::Confirming,
        other => PaymentEventStatus::Unknown(other.to_string()),
    }
}

/// Handle a payment event from the gateway.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.gateway_webhook_secret {
        let signature = headers
            .get("x-gateway-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if !verify_signature(&body, signature, secret) {
            tracing::warn!("Webhook signature verification failed");
            return Err(ApiError::Unauthorized);
        }
    }

    let payload: WebhookPayload = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {e}")))?;

    tracing::info!(
        external_id = payload.external_id,
        status = payload.status,
        "Payment webhook received"
    );

    let event = PaymentEvent {
        external_payment_id: payload.external_id,
        status: parse_status(&payload.status),
        description: payload.description,
    };

    let outcome = state.reconcile.handle_webhook_event(&event)?;
    let mut amount_mismatch = None;
    match outcome {
        WebhookOutcome::Credited {
            transaction,
            reported_tokens,
        } => {
            tracing::info!(
                account_id = %transaction.account_id,
                amount_tokens = transaction.amount_tokens,
                "Payment credited"
            );
            if transaction.amount_tokens != reported_tokens {
                amount_mismatch = Some(AmountMismatch {
                    credited_tokens: transaction.amount_tokens,
                    reported_tokens,
                });
            }
        }
        WebhookOutcome::AlreadySettled(status) => {
            tracing::info!(?status, "Duplicate webhook ignored");
        }
        WebhookOutcome::MarkedFailed => {
            tracing::info!("Payment marked failed");
        }
        WebhookOutcome::Ignored => {}
    }

    Ok(Json(WebhookResponse {
        success: true,
        amount_mismatch,
    }))
}
