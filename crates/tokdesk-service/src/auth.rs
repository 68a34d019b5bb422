//! Authentication extractors.
//!
//! The API has one caller class: trusted operator tooling and the chat
//! adapter, both holding the admin API key. End users never reach this
//! service directly.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Admin authentication via the `x-admin-key` header.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging), from `x-admin-id` if provided.
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        Ok(AdminAuth { admin_id })
    }
}
