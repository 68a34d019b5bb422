//! Tokdesk HTTP API service.
//!
//! This crate exposes the domain engines over HTTP:
//!
//! - Payment-gateway webhook ingestion (signed, safe under duplicates)
//! - Purchase initiation and payment administration (manual approval,
//!   stuck-payment listing)
//! - Order creation, queue listing, and status transitions
//! - The intake dialogue endpoint driven by the chat adapter
//! - Account administration (creation, ledger adjustments, history)
//!
//! plus the fallback poller that flags payments whose webhooks never
//! arrived for operator review.
//!
//! # Authentication
//!
//! Everything under `/v1` requires the `x-admin-key` header: the callers are
//! the chat adapter and operator tooling, never end users directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod poller;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use gateway::{GatewayClient, GatewayError};
pub use routes::create_router;
pub use state::AppState;
