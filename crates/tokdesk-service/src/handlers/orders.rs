//! Order handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokdesk_core::{AccountId, Order, OrderId, OrderStatus, PackageKey, ProfileId};
use tokdesk_engine::OrderRequest;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Request to create an order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// The paying account.
    pub account_id: AccountId,
    /// The customer profile the order is for.
    pub profile_id: ProfileId,
    /// The package to purchase.
    pub package: PackageKey,
    /// Priority handling.
    #[serde(default)]
    pub priority: bool,
    /// Include the verification add-on.
    #[serde(default)]
    pub verification: bool,
}

/// Order representation returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    /// Order id.
    pub id: String,
    /// Paying account.
    pub account_id: AccountId,
    /// Customer profile the order is for.
    pub profile_id: String,
    /// Package key.
    pub package: PackageKey,
    /// Cost charged at creation, in tokens.
    pub cost_tokens: i64,
    /// Current status.
    pub status: OrderStatus,
    /// Position in the work queue.
    pub queue_position: u64,
    /// Priority handling.
    pub priority: bool,
    /// Original order id, for reruns.
    pub rerun_of: Option<String>,
    /// Operator notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When an operator took the order.
    pub assigned_at: Option<DateTime<Utc>>,
    /// When the order finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            account_id: order.account_id,
            profile_id: order.profile_id.to_string(),
            package: order.package,
            cost_tokens: order.cost_tokens,
            status: order.status,
            queue_position: order.queue_position,
            priority: order.priority,
            rerun_of: order.rerun_of.map(|id| id.to_string()),
            notes: order.notes,
            created_at: order.created_at,
            assigned_at: order.assigned_at,
            completed_at: order.completed_at,
        }
    }
}

/// Request to move an order to a new status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    /// The status to move to.
    pub new_status: OrderStatus,
    /// Operator notes to record on the order.
    pub notes: Option<String>,
}

/// Status update response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    /// The updated order.
    pub order: OrderView,
    /// Whether the owner was notified of the change.
    pub notification_emitted: bool,
}

/// Request to rerun a completed order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerunRequest {
    /// Priority handling for the rerun.
    #[serde(default)]
    pub priority: bool,
}

/// Queue listing response.
#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    /// Open orders in working order.
    pub orders: Vec<OrderView>,
}

/// Create an order, debiting its cost atomically.
pub async fn create_order(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let order = state.orders.create_order(&OrderRequest {
        account_id: request.account_id,
        profile_id: request.profile_id,
        package: request.package,
        priority: request.priority,
        verification: request.verification,
    })?;
    Ok(Json(order.into()))
}

/// Move an order to a new status.
pub async fn update_status(
    auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
    let (order, notification_emitted) =
        state
            .orders
            .transition(&order_id, request.new_status, request.notes)?;

    tracing::info!(
        order_id = %order.id,
        status = ?order.status,
        admin_id = auth.admin_id,
        "Order status updated"
    );
    Ok(Json(UpdateStatusResponse {
        order: order.into(),
        notification_emitted,
    }))
}

/// Rerun a completed order at the rerun price.
pub async fn rerun(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<RerunRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let order = state.orders.rerun(&order_id, request.priority)?;
    Ok(Json(order.into()))
}

/// List open orders: priority first, then queue position.
pub async fn list_queue(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = state.orders.queue()?;
    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(Into::into).collect(),
    }))
}
