//! Error types for the domain engines.

use tokdesk_core::{CoreError, OrderStatus, PackageKey, ValidationError};
use tokdesk_store::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the domain engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A storage operation failed or a record was missing.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Dialogue input was rejected; the machine stays in the same state.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A core-type construction failed (incomplete draft commit and the
    /// like). Indicates a driver bug, not user error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The requested order status change is not an edge of the state graph.
    #[error("illegal transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// A webhook event that cannot be interpreted. Nothing was mutated.
    #[error("malformed payment event: {0}")]
    MalformedEvent(String),

    /// A payment event referencing an external id no pending transaction was
    /// ever recorded for. Nothing was mutated.
    #[error("unmatched payment: {external_payment_id}")]
    UnmatchedPayment {
        /// The unrecognized external payment id.
        external_payment_id: String,
    },

    /// The requested package key is not in the price table.
    #[error("unknown package: {0}")]
    UnknownPackage(PackageKey),

    /// The caller does not own the referenced record.
    #[error("{0}")]
    Forbidden(&'static str),

    /// A request whose parameters are invalid before any store access.
    #[error("{0}")]
    InvalidRequest(&'static str),
}
