//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{TestLedger, TestLedgerState};
use crate::ledger::{LedgerOptions, Workbook};
use crate::{utils, Config};
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

/// Test environment that sets up a halogen home directory with a config file. Each environment
/// gets its own spreadsheet ID, so its in-memory ledger is not shared with other tests.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment with a loaded Config.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("halogen");
        std::fs::create_dir_all(&root).unwrap();

        // Create minimal client_secret.json
        let secret_content = r#"{
            "installed": {
                "client_id": "test-client-id",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"],
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;
        std::fs::write(root.join("client_secret.json"), secret_content).unwrap();

        let rand = Uuid::new_v4().to_string().replace('-', "");
        let config_content = serde_json::json!({
            "gsheets": {
                "cred": "client_secret.json",
                "spreadsheet": format!("https://docs.google.com/spreadsheets/d/{rand}/edit")
            },
            "discord": {
                "token": "test-token",
                "role": "811001122334455667",
                "modRole": "811001122334455668",
                "everyone": "@everyone",
                "allRole": "811001122334455669",
                "channel": "811001122334455670",
                "webhook": "http://127.0.0.1:9/api/webhooks/1/abc"
            },
            "paypal": {
                "pool": "https://paypal.me/pools/c/halogen",
                "thumbnail": "https://example.com/pp.png"
            },
            "games": [
                { "name": "Minecraft", "whitelist": true, "path": "whitelist.json" },
                { "name": "Valheim", "whitelist": true, "path": "permittedlist.txt" },
                { "name": "Terraria", "whitelist": false, "path": "terraria.txt" }
            ],
            "tasks": [["rotate_month", "update", "rotate"], ["pool_open", "open"]]
        });
        utils::write(root.join("config.json"), config_content.to_string())
            .await
            .unwrap();
        let config = Config::load(&root).await.unwrap();

        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// The halogen home directory.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// A workbook over this environment's in-memory ledger.
    pub fn workbook(&self) -> Workbook {
        Workbook::new(
            Box::new(self.ledger()),
            LedgerOptions::from(self.config.gsheets()),
        )
    }

    /// Gets the current state of the in-memory ledger associated with this environment.
    pub fn get_state(&self) -> TestLedgerState {
        self.ledger().snapshot()
    }

    /// Sets the state of the in-memory ledger associated with this environment.
    pub fn set_state(&self, state: TestLedgerState) {
        self.ledger().set_state(state)
    }

    fn ledger(&self) -> TestLedger {
        TestLedger::for_spreadsheet(self.config.spreadsheet().as_str())
    }
}
