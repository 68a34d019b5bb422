//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tokdesk_engine::EngineError;
use tokdesk_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - duplicate payment or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient tokens.
    #[error("insufficient tokens: balance={balance}, required={required}")]
    InsufficientTokens {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientTokens { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_tokens",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity}: {id}")),
            StoreError::InsufficientTokens { balance, required } => {
                Self::InsufficientTokens { balance, required }
            }
            StoreError::DuplicatePayment {
                external_payment_id,
            } => Self::Conflict(format!("duplicate payment: {external_payment_id}")),
            StoreError::InvalidTransaction(msg) => Self::BadRequest(msg.to_string()),
            StoreError::OrderStatusConflict { .. } => Self::Conflict(err.to_string()),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(store) => store.into(),
            EngineError::Validation(v) => Self::BadRequest(v.message),
            EngineError::Core(core) => Self::Internal(core.to_string()),
            EngineError::IllegalTransition { .. } => Self::Conflict(err.to_string()),
            EngineError::MalformedEvent(msg) => Self::BadRequest(msg),
            EngineError::UnmatchedPayment {
                external_payment_id,
            } => Self::NotFound(format!("payment: {external_payment_id}")),
            EngineError::UnknownPackage(key) => Self::BadRequest(format!("unknown package: {key}")),
            EngineError::Forbidden(_) => Self::Forbidden,
            EngineError::InvalidRequest(msg) => Self::BadRequest(msg.to_string()),
        }
    }
}
