//! Application state.

use std::sync::Arc;

use tokdesk_engine::{
    IntakeEngine, Ledger, Notifier, OrderEngine, ReconcileEngine, TracingNotifier,
};
use tokdesk_store::{RocksStore, Store};

use crate::config::ServiceConfig;
use crate::gateway::GatewayClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Token ledger.
    pub ledger: Ledger,

    /// Intake dialogue engine.
    pub intake: Arc<IntakeEngine>,

    /// Order engine.
    pub orders: Arc<OrderEngine>,

    /// Payment reconciliation engine.
    pub reconcile: Arc<ReconcileEngine>,

    /// Payment gateway client (optional).
    pub gateway: Option<Arc<GatewayClient>>,
}

impl AppState {
    /// Create a new application state wiring the engines over the store.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        Self::with_notifier(store, config, Arc::new(TracingNotifier))
    }

    /// Create application state with a custom notification sink.
    #[must_use]
    pub fn with_notifier(
        store: Arc<RocksStore>,
        config: ServiceConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dyn_store: Arc<dyn Store> = store.clone();

        let gateway = config
            .gateway_api_url
            .as_ref()
            .zip(config.gateway_api_key.as_ref())
            .and_then(|(url, key)| match GatewayClient::new(url, key) {
                Ok(client) => {
                    tracing::info!(gateway_url = %url, "Payment gateway enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create gateway client");
                    None
                }
            });

        if gateway.is_none() {
            tracing::warn!("Payment gateway not configured - purchases cannot be initiated");
        }

        Self {
            store,
            ledger: Ledger::new(dyn_store.clone()),
            intake: Arc::new(IntakeEngine::new(dyn_store.clone())),
            orders: Arc::new(OrderEngine::new(
                dyn_store.clone(),
                config.prices.clone(),
                notifier.clone(),
            )),
            reconcile: Arc::new(ReconcileEngine::new(dyn_store, notifier)),
            gateway,
            config,
        }
    }

    /// Check if the payment gateway is configured.
    #[must_use]
    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }
}
