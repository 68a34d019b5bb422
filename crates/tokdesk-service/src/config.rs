//! Service configuration.

use std::path::Path;

use tokdesk_core::PriceTable;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/tokdesk").
    pub data_dir: String,

    /// Admin API key protecting everything under `/v1`.
    pub admin_api_key: Option<String>,

    /// Payment gateway base URL (optional).
    pub gateway_api_url: Option<String>,

    /// Payment gateway API key (optional).
    pub gateway_api_key: Option<String>,

    /// Payment gateway webhook signing secret (optional).
    pub gateway_webhook_secret: Option<String>,

    /// Price of one token in USD, used when creating gateway invoices.
    pub token_price_usd: f64,

    /// Fallback poller interval in seconds.
    pub poller_interval_seconds: u64,

    /// Minutes before a pending payment counts as stuck.
    pub stuck_timeout_minutes: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Package price table.
    pub prices: PriceTable,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/tokdesk".into()),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            gateway_api_url: std::env::var("GATEWAY_API_URL").ok(),
            gateway_api_key: std::env::var("GATEWAY_API_KEY").ok(),
            gateway_webhook_secret: std::env::var("GATEWAY_WEBHOOK_SECRET").ok(),
            token_price_usd: std::env::var("TOKEN_PRICE_USD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.10),
            poller_interval_seconds: std::env::var("POLLER_INTERVAL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            stuck_timeout_minutes: std::env::var("STUCK_TIMEOUT_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            prices: load_price_table(),
        }
    }
}

/// Load the price table from `PRICE_TABLE_FILE` (JSON) or fall back to the
/// built-in defaults.
fn load_price_table() -> PriceTable {
    let Ok(path) = std::env::var("PRICE_TABLE_FILE") else {
        return PriceTable::default();
    };

    match read_price_table(Path::new(&path)) {
        Ok(table) => {
            tracing::info!(path = %path, "Loaded price table from file");
            table
        }
        Err(err) => {
            tracing::error!(path = %path, error = %err, "Failed to load price table, using defaults");
            PriceTable::default()
        }
    }
}

fn read_price_table(path: &Path) -> Result<PriceTable, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/tokdesk".into(),
            admin_api_key: None,
            gateway_api_url: None,
            gateway_api_key: None,
            gateway_webhook_secret: None,
            token_price_usd: 0.10,
            poller_interval_seconds: 60,
            stuck_timeout_minutes: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            prices: PriceTable::default(),
        }
    }
}
