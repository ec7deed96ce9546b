//! Command handlers shared by the CLI and the chat bot.
//!
//! Each handler takes the loaded `Config` and the ledger `Mode`, does its work and returns an
//! `Out` describing what happened.

mod auth;
mod bot;
mod payees;
mod run;
mod whitelist;

use crate::api::{self, Mode};
use crate::ledger::{LedgerOptions, Workbook};
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use auth::{auth, auth_verify};
pub use bot::bot;
pub use payees::{join, leave, WhitelistNotUpdated};
pub use run::run;
pub use whitelist::whitelist;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to both the command line and the chat bot.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Opens the ledger for `mode` and wraps it in a `Workbook`.
pub(crate) async fn workbook(config: &Config, mode: Mode) -> Result<Workbook> {
    let ledger = api::ledger(config, mode).await?;
    Ok(Workbook::new(ledger, LedgerOptions::from(config.gsheets())))
}
