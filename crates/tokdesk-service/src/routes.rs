//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, health, intake, orders, payments, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for admin API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts (admin key)
/// - `POST /v1/accounts` - Create/look up account by chat id
/// - `GET /v1/accounts/:id` - Get account
/// - `POST /v1/accounts/:id/adjust` - Operator balance adjustment
/// - `GET /v1/accounts/:id/transactions` - Transaction history
/// - `GET /v1/accounts/:id/profiles` - Customer profiles
/// - `GET /v1/accounts/:id/orders` - Order history
///
/// ## Payments (admin key)
/// - `POST /v1/payments/initiate` - Create gateway invoice, record pending tx
/// - `POST /v1/payments/approve` - Manually settle a stuck payment
/// - `GET /v1/payments/stuck` - List pending payments past the timeout
///
/// ## Orders (admin key)
/// - `POST /v1/orders` - Create order (atomic debit)
/// - `GET /v1/orders` - Work queue, priority first
/// - `POST /v1/orders/:id/status` - Move order through the state machine
/// - `POST /v1/orders/:id/rerun` - Rerun a completed order
///
/// ## Intake (admin key, called by the chat adapter)
/// - `POST /v1/intake/submit` - Advance the intake dialogue
/// - `POST /v1/intake/cancel` - Cancel the dialogue, discarding the draft
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/payment` - Payment gateway events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Accounts
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/:id", get(accounts::get_account))
        .route("/accounts/:id/adjust", post(accounts::adjust_balance))
        .route("/accounts/:id/transactions", get(accounts::list_transactions))
        .route("/accounts/:id/profiles", get(accounts::list_profiles))
        .route("/accounts/:id/orders", get(accounts::list_orders))
        // Payments
        .route("/payments/initiate", post(payments::initiate))
        .route("/payments/approve", post(payments::approve))
        .route("/payments/stuck", get(payments::list_stuck))
        // Orders
        .route("/orders", post(orders::create_order).get(orders::list_queue))
        .route("/orders/:id/status", post(orders::update_status))
        .route("/orders/:id/rerun", post(orders::rerun))
        // Intake
        .route("/intake/submit", post(intake::submit))
        .route("/intake/cancel", post(intake::cancel))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by the gateway)
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
