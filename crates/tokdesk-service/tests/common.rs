//! Common test utilities for tokdesk integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use tokdesk_service::{create_router, AppState, ServiceConfig};
use tokdesk_store::RocksStore;

/// The admin key configured into every test harness.
pub const ADMIN_KEY: &str = "test-admin-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The state behind the server, for driving the poller directly.
    pub state: AppState,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and default config.
    pub fn new() -> Self {
        Self::build(|_| {})
    }

    /// Create a harness with config overrides applied before startup.
    pub fn build(configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            ..ServiceConfig::default()
        };
        configure(&mut config);

        let state = AppState::new(Arc::new(store), config);
        let router: Router = create_router(state.clone());

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Create an account for a chat id and return its id.
    pub async fn create_account(&self, chat_id: i64) -> String {
        let response = self
            .server
            .post("/v1/accounts")
            .add_header("x-admin-key", ADMIN_KEY)
            .json(&json!({ "chatId": chat_id }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["id"].as_str().expect("account id").to_string()
    }

    /// Credit tokens onto an account via an operator adjustment.
    pub async fn fund(&self, account_id: &str, tokens: i64) {
        self.server
            .post(&format!("/v1/accounts/{account_id}/adjust"))
            .add_header("x-admin-key", ADMIN_KEY)
            .json(&json!({ "amountTokens": tokens, "reason": "test funding" }))
            .await
            .assert_status_ok();
    }

    /// Current balance of an account.
    pub async fn balance(&self, account_id: &str) -> i64 {
        let response = self
            .server
            .get(&format!("/v1/accounts/{account_id}"))
            .add_header("x-admin-key", ADMIN_KEY)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["balanceTokens"].as_i64().expect("balance")
    }

    /// Send one intake input for a chat and return the reply body.
    pub async fn intake_input(&self, chat_id: i64, text: &str) -> serde_json::Value {
        let response = self
            .server
            .post("/v1/intake/submit")
            .add_header("x-admin-key", ADMIN_KEY)
            .json(&json!({
                "chatId": chat_id,
                "event": { "kind": "input", "text": text }
            }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Run a full intake dialogue for a chat (no password) and return the
    /// committed profile id.
    pub async fn complete_intake(&self, chat_id: i64) -> String {
        // The first input only starts the dialogue.
        let reply = self.intake_input(chat_id, "hi").await;
        assert_eq!(reply["kind"], "prompt");
        assert_eq!(reply["state"], "name");

        let answers = [
            "Ada",
            "-",
            "Lovelace",
            "(555) 123-4567",
            "ada@example.com",
            "female",
            "1990-12-10",
            "12 Analytical Way",
            "-",
            "London",
            "Greater London",
            "12345",
        ];
        for answer in answers {
            let reply = self.intake_input(chat_id, answer).await;
            assert_eq!(reply["kind"], "prompt", "unexpected reply to {answer:?}");
        }

        let reply = self.intake_input(chat_id, "no").await;
        assert_eq!(reply["kind"], "completed");
        reply["profile"]["id"].as_str().expect("profile id").to_string()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
