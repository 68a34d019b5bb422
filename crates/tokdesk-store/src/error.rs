//! Error types for tokdesk storage.

use tokdesk_core::OrderStatus;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind that was looked up.
        entity: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// Insufficient tokens for a debit. Nothing was written.
    #[error("insufficient tokens: balance={balance}, required={required}")]
    InsufficientTokens {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// A payment with this external id was already recorded.
    #[error("duplicate payment: {external_payment_id}")]
    DuplicatePayment {
        /// The external payment id that was duplicated.
        external_payment_id: String,
    },

    /// The transaction handed to a compound operation violates its
    /// precondition (wrong status, missing external id, wrong sign).
    #[error("invalid transaction: {0}")]
    InvalidTransaction(&'static str),

    /// The order's stored status moved between the caller's read and this
    /// write. Nothing was written.
    #[error("order {id} status changed: expected {expected:?}, found {actual:?}")]
    OrderStatusConflict {
        /// The order id.
        id: String,
        /// The status the caller read.
        expected: OrderStatus,
        /// The status found under the lock.
        actual: OrderStatus,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
