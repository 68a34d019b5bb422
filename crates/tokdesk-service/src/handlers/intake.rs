//! Intake dialogue handlers.
//!
//! The chat adapter relays each user message here keyed by chat id; the
//! reply tells it what to render next.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use tokdesk_engine::{IntakeEvent, IntakeReply};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::accounts::get_or_create_account;
use crate::state::AppState;

/// One step of the intake dialogue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Chat id of the end user.
    pub chat_id: i64,
    /// The intake event to process.
    pub event: IntakeEvent,
}

/// Request to cancel an intake dialogue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// Chat id of the end user.
    pub chat_id: i64,
}

/// Advance the intake dialogue for a chat. A first input with no live
/// dialogue starts one.
pub async fn submit(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<IntakeReply>, ApiError> {
    let account = get_or_create_account(&state, request.chat_id)?;
    let reply = state.intake.handle(account.id, request.event)?;
    Ok(Json(reply))
}

/// Cancel any live intake dialogue for a chat, discarding the draft.
pub async fn cancel(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<IntakeReply>, ApiError> {
    let account = get_or_create_account(&state, request.chat_id)?;
    let reply = state.intake.handle(account.id, IntakeEvent::Cancel)?;
    Ok(Json(reply))
}
