//! Fallback payment poller.
//!
//! Webhooks can be lost. On an interval, the poller lists pending payments
//! past the stuck timeout and surfaces them for operator review. It never
//! credits on its own: settlement happens through the webhook endpoint or
//! through manual approval, both funneling into the same idempotent path.
//! When a gateway client is configured, the poller also fetches each stuck
//! invoice's current status so the operator log shows what the gateway
//! thinks happened.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::ApiError;
use crate::state::AppState;

/// Spawn the poller task.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: AppState) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(
        state.config.poller_interval_seconds,
    ));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_seconds = state.config.poller_interval_seconds,
        stuck_timeout_minutes = state.config.stuck_timeout_minutes,
        "Payment poller started"
    );

    loop {
        interval.tick().await;
        if let Err(err) = poll_once(&state).await {
            tracing::error!(error = %err, "Payment poll failed");
        }
    }
}

/// One poll pass. Public so tests can drive it without the timer.
///
/// # Errors
///
/// Returns an error if the stuck-payment listing fails. Per-payment gateway
/// failures are logged and skipped.
pub async fn poll_once(state: &AppState) -> Result<(), ApiError> {
    let timeout = chrono::Duration::minutes(state.config.stuck_timeout_minutes);
    let stuck = state.reconcile.stuck_payments(timeout)?;
    if stuck.is_empty() {
        return Ok(());
    }

    tracing::warn!(count = stuck.len(), "Pending payments past stuck timeout");

    for transaction in stuck {
        let Some(external_id) = transaction.external_payment_id.clone() else {
            continue;
        };

        let gateway_status = match &state.gateway {
            None => None,
            Some(gateway) => match gateway.get_invoice(&external_id).await {
                Ok(invoice) => Some(invoice.status),
                Err(err) => {
                    tracing::warn!(
                        external_payment_id = external_id,
                        error = %err,
                        "Invoice status fetch failed"
                    );
                    None
                }
            },
        };

        tracing::warn!(
            external_payment_id = external_id,
            account_id = %transaction.account_id,
            amount_tokens = transaction.amount_tokens,
            created_at = %transaction.created_at,
            gateway_status = gateway_status.as_deref(),
            "Stuck payment awaiting review"
        );
    }

    Ok(())
}
