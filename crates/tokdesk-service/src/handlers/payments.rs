//! Payment handlers: purchase initiation, manual approval, stuck listing.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use tokdesk_core::{AccountId, PaymentStatus};
use tokdesk_engine::CreditOutcome;
use tokdesk_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::accounts::TransactionView;
use crate::state::AppState;

/// Request to initiate a token purchase.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    /// The purchasing account.
    pub account_id: AccountId,
    /// Number of tokens to purchase.
    pub tokens: i64,
    /// Label for the invoice description.
    pub label: Option<String>,
}

/// Purchase initiation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    /// The gateway's payment id.
    pub external_id: String,
    /// Hosted payment page for the end user.
    pub payment_link: String,
    /// The pending transaction recorded for this purchase.
    pub transaction: TransactionView,
}

/// Request to manually approve a stuck payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePaymentRequest {
    /// The gateway's payment id.
    pub external_id: String,
    /// Operator note explaining the approval.
    pub note: Option<String>,
}

/// Manual approval response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePaymentResponse {
    /// `"applied"` when this call credited the balance,
    /// `"already_settled"` when an earlier path had.
    pub outcome: &'static str,
    /// The payment's settlement status after the call.
    pub payment_status: PaymentStatus,
    /// The settled transaction, when this call applied the credit.
    pub transaction: Option<TransactionView>,
}

/// Stuck payment listing response.
#[derive(Debug, Serialize)]
pub struct StuckPaymentsResponse {
    /// Pending payments past the stuck timeout, oldest first.
    pub payments: Vec<TransactionView>,
}

/// Initiate a token purchase: create a gateway invoice, then record the
/// pending transaction under its id.
pub async fn initiate(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, ApiError> {
    let Some(gateway) = &state.gateway else {
        return Err(ApiError::ExternalService(
            "payment gateway not configured".to_string(),
        ));
    };

    if request.tokens <= 0 {
        return Err(ApiError::BadRequest(
            "token quantity must be positive".to_string(),
        ));
    }

    // Fail on a missing account before an invoice exists for it.
    state
        .store
        .get_account(&request.account_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account: {}", request.account_id)))?;

    let label = request.label.unwrap_or_else(|| "Token purchase".to_string());

    #[allow(clippy::cast_precision_loss)]
    let amount_usd = request.tokens as f64 * state.config.token_price_usd;

    let invoice = gateway
        .create_invoice(amount_usd, format!("{} tokens - {label}", request.tokens))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Invoice creation failed");
            ApiError::ExternalService(format!("invoice creation failed: {e}"))
        })?;

    let transaction = state.reconcile.initiate_purchase(
        request.account_id,
        request.tokens,
        invoice.id.clone(),
        &label,
    )?;

    Ok(Json(InitiatePaymentResponse {
        external_id: invoice.id,
        payment_link: invoice.invoice_url,
        transaction: transaction.into(),
    }))
}

/// Manually approve a stuck payment. Idempotent against the webhook path.
pub async fn approve(
    auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApprovePaymentRequest>,
) -> Result<Json<ApprovePaymentResponse>, ApiError> {
    let note = match &request.note {
        Some(note) => format!("{note} (by {})", auth.admin_id),
        None => format!("approved by {}", auth.admin_id),
    };

    let outcome = state
        .reconcile
        .manually_approve(&request.external_id, Some(&note))?;

    let response = match outcome {
        CreditOutcome::Applied(transaction) => ApprovePaymentResponse {
            outcome: "applied",
            payment_status: transaction.payment_status,
            transaction: Some(transaction.into()),
        },
        CreditOutcome::AlreadyApplied(status) => ApprovePaymentResponse {
            outcome: "already_settled",
            payment_status: status,
            transaction: None,
        },
    };
    Ok(Json(response))
}

/// List pending payments older than the stuck timeout.
pub async fn list_stuck(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<StuckPaymentsResponse>, ApiError> {
    let timeout = Duration::minutes(state.config.stuck_timeout_minutes);
    let payments = state.reconcile.stuck_payments(timeout)?;
    Ok(Json(StuckPaymentsResponse {
        payments: payments.into_iter().map(Into::into).collect(),
    }))
}
