//! Notification events emitted by the engines.
//!
//! The engines never address a chat surface directly. They hand a
//! [`NotificationEvent`] to whatever [`Notifier`] the host wired in; the chat
//! adapter owns the rendering and delivery.

use serde::{Deserialize, Serialize};

use tokdesk_core::{AccountId, OrderId, OrderStatus};

/// An outbound event a front end may want to surface to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// An order moved to a new status.
    OrderStatusChanged {
        /// The order that changed.
        order_id: OrderId,
        /// The account that owns the order.
        account_id: AccountId,
        /// Chat identity of the owner.
        chat_id: i64,
        /// Previous status.
        from: OrderStatus,
        /// New status.
        to: OrderStatus,
        /// Operator notes attached to the transition, if any.
        notes: Option<String>,
    },

    /// A pending payment settled and tokens were credited.
    PaymentCredited {
        /// The credited account.
        account_id: AccountId,
        /// Chat identity of the owner.
        chat_id: i64,
        /// The gateway's payment id.
        external_payment_id: String,
        /// Tokens credited.
        amount_tokens: i64,
        /// Balance after the credit.
        balance_after_tokens: i64,
    },

    /// A pending payment failed or expired; nothing was credited.
    PaymentFailed {
        /// The affected account.
        account_id: AccountId,
        /// Chat identity of the owner.
        chat_id: i64,
        /// The gateway's payment id.
        external_payment_id: String,
    },
}

/// Sink for notification events.
pub trait Notifier: Send + Sync {
    /// Deliver one event. Delivery is best-effort; failures must not affect
    /// the state change that produced the event.
    fn notify(&self, event: &NotificationEvent);
}

/// A [`Notifier`] that logs events through `tracing`.
///
/// The default sink when no chat adapter is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &NotificationEvent) {
        match event {
            NotificationEvent::OrderStatusChanged {
                order_id,
                chat_id,
                from,
                to,
                ..
            } => {
                tracing::info!(%order_id, chat_id, ?from, ?to, "order status changed");
            }
            NotificationEvent::PaymentCredited {
                account_id,
                external_payment_id,
                amount_tokens,
                ..
            } => {
                tracing::info!(
                    %account_id,
                    external_payment_id,
                    amount_tokens,
                    "payment credited"
                );
            }
            NotificationEvent::PaymentFailed {
                account_id,
                external_payment_id,
                ..
            } => {
                tracing::info!(%account_id, external_payment_id, "payment failed");
            }
        }
    }
}
