//! Payment reconciliation.
//!
//! The gateway delivers webhooks at least once, in any order, and sometimes
//! not at all. Reconciliation therefore rests on one primitive: the
//! idempotent credit keyed by the gateway's external payment id. The webhook
//! handler, the fallback poller's operator listing, and manual approval all
//! funnel through it, so whichever path runs first wins and the rest become
//! no-ops.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use tokdesk_core::{AccountId, PaymentStatus, TokenTransaction};
use tokdesk_store::{SettleOutcome, Store};

use crate::error::{EngineError, Result};
use crate::ledger::{CreditOutcome, Ledger};
use crate::notify::{NotificationEvent, Notifier};

/// Payment statuses reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventStatus {
    /// Payment confirmed; credit the tokens.
    Paid,
    /// The invoice expired unpaid.
    Expired,
    /// The payment failed.
    Failed,
    /// Awaiting payment.
    Waiting,
    /// Payment seen on the network, not yet confirmed.
    Confirming,
    /// A status this build does not know. Logged and ignored.
    #[serde(untagged)]
    Unknown(String),
}

/// One payment event, normalized from the gateway's webhook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// The gateway's payment id.
    pub external_payment_id: String,
    /// Reported status.
    pub status: PaymentEventStatus,
    /// Invoice description carrying the token quantity
    /// (`"<N> tokens - <label>"`).
    pub description: String,
}

/// What a webhook event did.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// The payment settled and tokens were credited. When `reported_tokens`
    /// disagrees with the credited transaction, the gateway and the ledger
    /// are out of sync and the caller should surface it.
    Credited {
        /// The finalized purchase transaction.
        transaction: TokenTransaction,
        /// Token quantity parsed from the event's description.
        reported_tokens: i64,
    },

    /// The payment had already been settled or failed; nothing changed.
    AlreadySettled(PaymentStatus),

    /// The payment was marked failed. No balance change.
    MarkedFailed,

    /// The status does not call for any action.
    Ignored,
}

/// Reconciles gateway payment events against the pending-payment ledger.
pub struct ReconcileEngine {
    store: Arc<dyn Store>,
    ledger: Ledger,
    notifier: Arc<dyn Notifier>,
}

impl ReconcileEngine {
    /// Create a reconciliation engine.
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        let ledger = Ledger::new(store.clone());
        Self {
            store,
            ledger,
            notifier,
        }
    }

    /// Record a pending purchase under the gateway's external id.
    ///
    /// Must run before the gateway can deliver a webhook for the id, so a
    /// confirmation always finds its pending transaction.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidRequest` if `tokens` is not positive.
    /// - `StoreError::NotFound` for a missing account.
    /// - `StoreError::DuplicatePayment` if the external id was already used.
    pub fn initiate_purchase(
        &self,
        account_id: AccountId,
        tokens: i64,
        external_payment_id: String,
        label: &str,
    ) -> Result<TokenTransaction> {
        if tokens <= 0 {
            return Err(EngineError::InvalidRequest(
                "token quantity must be positive",
            ));
        }

        let account = self
            .store
            .get_account(&account_id)?
            .ok_or_else(|| tokdesk_store::StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })?;

        let transaction = TokenTransaction::purchase_pending(
            account_id,
            tokens,
            account.balance_tokens,
            external_payment_id.clone(),
            format!("{tokens} tokens - {label}"),
        );
        self.store.record_pending_payment(&transaction)?;

        tracing::info!(
            %account_id,
            external_payment_id,
            tokens,
            "purchase initiated"
        );
        Ok(transaction)
    }

    /// Process one gateway event. Safe under duplicate delivery.
    ///
    /// # Errors
    ///
    /// - `EngineError::MalformedEvent` if a Paid event's description carries
    ///   no token quantity; nothing is mutated.
    /// - `EngineError::UnmatchedPayment` if no pending transaction was ever
    ///   recorded for the external id; nothing is mutated.
    pub fn handle_webhook_event(&self, event: &PaymentEvent) -> Result<WebhookOutcome> {
        match &event.status {
            PaymentEventStatus::Paid => self.handle_paid(event),
            PaymentEventStatus::Expired | PaymentEventStatus::Failed => {
                let recorded = self.require_payment(&event.external_payment_id)?;
                match self.store.fail_payment(&event.external_payment_id)? {
                    SettleOutcome::Applied(_) => {
                        tracing::info!(
                            external_payment_id = event.external_payment_id,
                            status = ?event.status,
                            "payment marked failed"
                        );
                        self.notify_failed(&recorded);
                        Ok(WebhookOutcome::MarkedFailed)
                    }
                    SettleOutcome::AlreadySettled(status) => {
                        Ok(WebhookOutcome::AlreadySettled(status))
                    }
                }
            }
            PaymentEventStatus::Waiting | PaymentEventStatus::Confirming => {
                Ok(WebhookOutcome::Ignored)
            }
            PaymentEventStatus::Unknown(status) => {
                tracing::warn!(
                    external_payment_id = event.external_payment_id,
                    status,
                    "unknown payment status ignored"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    fn handle_paid(&self, event: &PaymentEvent) -> Result<WebhookOutcome> {
        let reported = parse_token_amount(&event.description)?;
        let recorded = self.require_payment(&event.external_payment_id)?;

        // The recorded pending amount is authoritative; a description
        // mismatch is suspicious but the money already moved.
        if recorded.amount_tokens != reported {
            tracing::warn!(
                external_payment_id = event.external_payment_id,
                recorded = recorded.amount_tokens,
                reported,
                "token amount mismatch, crediting recorded amount"
            );
        }

        match self.ledger.credit_idempotent(&event.external_payment_id)? {
            CreditOutcome::Applied(transaction) => {
                self.notify_credited(&transaction);
                Ok(WebhookOutcome::Credited {
                    transaction,
                    reported_tokens: reported,
                })
            }
            CreditOutcome::AlreadyApplied(status) => Ok(WebhookOutcome::AlreadySettled(status)),
        }
    }

    /// Pending payments older than `timeout`, oldest first, for operator
    /// review. Listing never mutates anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn stuck_payments(&self, timeout: Duration) -> Result<Vec<TokenTransaction>> {
        Ok(self.store.list_pending_payments_before(Utc::now() - timeout)?)
    }

    /// Operator override: settle a pending payment by hand.
    ///
    /// Funnels through the same idempotent credit as the webhook path, so a
    /// late webhook after approval (or a concurrent one) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnmatchedPayment` if no payment was recorded
    /// for this external id.
    pub fn manually_approve(
        &self,
        external_payment_id: &str,
        note: Option<&str>,
    ) -> Result<CreditOutcome> {
        self.require_payment(external_payment_id)?;

        let outcome = self.ledger.credit_idempotent(external_payment_id)?;
        match &outcome {
            CreditOutcome::Applied(transaction) => {
                tracing::info!(external_payment_id, note, "payment manually approved");
                self.notify_credited(transaction);
            }
            CreditOutcome::AlreadyApplied(status) => {
                tracing::info!(external_payment_id, ?status, "manual approval was a no-op");
            }
        }
        Ok(outcome)
    }

    fn require_payment(&self, external_payment_id: &str) -> Result<TokenTransaction> {
        self.store
            .get_payment(external_payment_id)?
            .ok_or_else(|| EngineError::UnmatchedPayment {
                external_payment_id: external_payment_id.to_string(),
            })
    }

    fn notify_credited(&self, transaction: &TokenTransaction) {
        let Some(external_payment_id) = transaction.external_payment_id.clone() else {
            return;
        };
        if let Some(chat_id) = self.chat_id_for(&transaction.account_id) {
            self.notifier.notify(&NotificationEvent::PaymentCredited {
                account_id: transaction.account_id,
                chat_id,
                external_payment_id,
                amount_tokens: transaction.amount_tokens,
                balance_after_tokens: transaction.balance_after_tokens,
            });
        }
    }

    fn notify_failed(&self, transaction: &TokenTransaction) {
        let Some(external_payment_id) = transaction.external_payment_id.clone() else {
            return;
        };
        if let Some(chat_id) = self.chat_id_for(&transaction.account_id) {
            self.notifier.notify(&NotificationEvent::PaymentFailed {
                account_id: transaction.account_id,
                chat_id,
                external_payment_id,
            });
        }
    }

    fn chat_id_for(&self, account_id: &AccountId) -> Option<i64> {
        match self.store.get_account(account_id) {
            Ok(Some(account)) => Some(account.chat_id),
            Ok(None) => {
                tracing::warn!(%account_id, "payment owner missing, notification skipped");
                None
            }
            Err(err) => {
                tracing::warn!(%account_id, error = %err, "notification lookup failed");
                None
            }
        }
    }
}

/// Extract the token quantity from an invoice description: the integer
/// immediately preceding the `tokens` unit marker.
///
/// # Errors
///
/// Returns `EngineError::MalformedEvent` when no such quantity exists.
pub fn parse_token_amount(description: &str) -> Result<i64> {
    let mut previous: Option<&str> = None;
    for word in description.split_whitespace() {
        if word == "tokens" {
            if let Some(quantity) = previous.and_then(|p| p.parse::<i64>().ok()) {
                if quantity > 0 {
                    return Ok(quantity);
                }
            }
        }
        previous = Some(word);
    }
    Err(EngineError::MalformedEvent(format!(
        "no token quantity in description: {description:?}"
    )))
}
