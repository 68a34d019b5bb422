//! Payment gateway wire types.

use serde::{Deserialize, Serialize};

/// Request body for creating an invoice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    /// Amount to charge.
    pub price_amount: f64,
    /// Currency of `price_amount`.
    pub price_currency: String,
    /// Description shown to the payer. Carries the token quantity
    /// (`"<N> tokens - <label>"`); reconciliation parses it back out of
    /// webhook events.
    pub order_description: String,
}

/// An invoice as returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// The gateway's invoice id. Used as the external payment id.
    pub id: String,
    /// Where to send the payer.
    pub invoice_url: String,
    /// Current status string (`waiting`, `confirming`, `paid`, `expired`,
    /// `failed`).
    pub status: String,
    /// Invoice description as stored by the gateway.
    #[serde(default)]
    pub order_description: Option<String>,
}

/// Gateway error response body.
#[derive(Debug, Deserialize)]
pub struct GatewayErrorResponse {
    /// Error message.
    pub message: String,
}
