//! Outbound payment-gateway client.

mod client;
mod types;

pub use client::{GatewayClient, GatewayError};
pub use types::{CreateInvoiceRequest, Invoice};
