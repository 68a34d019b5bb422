//! Error types for tokdesk core.

use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A mandatory field was missing when committing a draft.
    #[error("missing field: {field}")]
    MissingField {
        /// The field that was missing.
        field: &'static str,
    },

    /// An amount was zero or had the wrong sign.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
