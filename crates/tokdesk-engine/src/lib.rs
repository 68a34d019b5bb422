//! Domain engines for tokdesk.
//!
//! Each engine wraps the [`Store`](tokdesk_store::Store) trait and enforces
//! one slice of the business rules:
//!
//! - [`ledger`] — balance reads and ledger mutations.
//! - [`intake`] — the intake dialogue state machine and its session store.
//! - [`orders`] — order creation, the order state graph, reruns, refunds.
//! - [`reconcile`] — payment reconciliation: webhook events, stuck-payment
//!   listing, manual approval. All credit paths funnel through one
//!   idempotent primitive.
//! - [`notify`] — outbound notification events behind the [`Notifier`] trait;
//!   engines never talk to a chat surface directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod intake;
pub mod ledger;
pub mod notify;
pub mod orders;
pub mod reconcile;

pub use error::{EngineError, Result};
pub use intake::{IntakeEngine, IntakeEvent, IntakeReply};
pub use ledger::{CreditOutcome, Ledger};
pub use notify::{NotificationEvent, Notifier, TracingNotifier};
pub use orders::{OrderEngine, OrderRequest};
pub use reconcile::{PaymentEvent, PaymentEventStatus, ReconcileEngine, WebhookOutcome};
