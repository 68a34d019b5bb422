//! Payment gateway API client.

use std::time::Duration;

use reqwest::Client;

use super::types::{CreateInvoiceRequest, GatewayErrorResponse, Invoice};

/// Error type for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway returned an error.
    #[error("gateway error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error message from the gateway.
        message: String,
    },
}

/// Payment gateway API client.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Create an invoice for a token purchase.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the gateway rejects it.
    pub async fn create_invoice(
        &self,
        amount_usd: f64,
        description: String,
    ) -> Result<Invoice, GatewayError> {
        let request = CreateInvoiceRequest {
            price_amount: amount_usd,
            price_currency: "usd".to_string(),
            order_description: description,
        };

        let response = self
            .client
            .post(format!("{}/v1/invoices", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Fetch the current status of an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the gateway rejects it.
    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/invoices/{invoice_id}", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response(response: reqwest::Response) -> Result<Invoice, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .json::<GatewayErrorResponse>()
            .await
            .map_or_else(|_| "unknown gateway error".to_string(), |e| e.message);

        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
