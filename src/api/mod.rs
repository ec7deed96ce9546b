//! Clients for the remote services halogen talks to: Google Sheets (the ledger), Google Drive,
//! Discord, the Mojang profile API and the Steam Web API.

mod credentials;
mod discord;
mod drive;
mod files;
mod mojang;
mod oauth;
mod sheet;
mod sheet_test_client;
mod steam;

use crate::config::Spreadsheet;
use crate::model::CellRef;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};

pub use credentials::{Credentials, ServiceAccount};
pub use discord::{
    Author, ChatClient, ChatMessage, DiscordClient, Embed, EmbedField, Thumbnail, Webhook,
    WebhookMessage, BLUE, GREEN, RED,
};
pub use drive::{find_spreadsheet, DRIVE_API};
pub use mojang::{MojangResolver, ProfileResolver, MOJANG_API};
pub use oauth::TokenProvider;
pub use sheet_test_client::{TestLedger, TestLedgerState};
pub use steam::SteamProfiles;

// OAuth scopes required for Sheets API access.
pub(crate) const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// The environment variable which, when set to a non-empty value, makes halogen use an in-memory
/// ledger instead of Google Sheets.
pub const TEST_MODE_ENV: &str = "HALOGEN_IN_TEST_MODE";

/// Whether the ledger is backed by Google Sheets or held in memory.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    /// `Mode::Test` when `HALOGEN_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// A tab of the spreadsheet. `id` is the numeric sheet ID and `index` its position, where `0` is
/// the left-most tab.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: i64,
    pub title: String,
    pub index: usize,
}

/// The operations needed from the spreadsheet that holds the ledger. Rows and columns are
/// 1-based. Implementations do not retry; remote failures are returned to the caller.
#[async_trait::async_trait]
pub trait Ledger: Send {
    /// Lists the worksheets sorted by `index`.
    async fn worksheets(&mut self) -> Result<Vec<Worksheet>>;

    /// Gets the formatted values of every cell in `worksheet`, row by row. Trailing empty cells and
    /// rows may be omitted.
    async fn get(&mut self, worksheet: &str) -> Result<Vec<Vec<String>>>;

    /// Like `get`, but formula cells hold their formula instead of the computed value.
    async fn get_formulas(&mut self, worksheet: &str) -> Result<Vec<Vec<String>>>;

    /// Writes `rows` into `worksheet` with the top-left value at `start`. Values are entered as a
    /// user would type them, so strings beginning with `=` become formulas.
    async fn write_range(
        &mut self,
        worksheet: &str,
        start: CellRef,
        rows: Vec<Vec<String>>,
    ) -> Result<()>;

    /// Inserts a row so that it becomes row `index`, then writes `values` into it starting at
    /// column A. Rows at and below `index` move down by one.
    ///
    /// Values are written raw, so long IDs keep every digit and a leading `=` is text. Formulas
    /// must be written afterwards with `write_range`.
    async fn insert_row(&mut self, worksheet: &Worksheet, index: usize, values: Vec<String>)
        -> Result<()>;

    /// Deletes row `index`. Rows below it move up by one.
    async fn delete_row(&mut self, worksheet: &Worksheet, index: usize) -> Result<()>;

    /// Copies `source` to a new worksheet titled `title`, inserted as the left-most tab.
    async fn duplicate_worksheet(&mut self, source: &Worksheet, title: &str) -> Result<Worksheet>;

    /// Deletes `worksheet` from the spreadsheet.
    async fn delete_worksheet(&mut self, worksheet: &Worksheet) -> Result<()>;
}

/// Creates the `Ledger` for `mode`. In `Mode::Google` the credentials named by `gsheets.cred` are
/// loaded, and a spreadsheet given by title is looked up in Google Drive. In `Mode::Test` the
/// in-memory ledger for the configured spreadsheet is returned.
pub async fn ledger(config: &Config, mode: Mode) -> Result<Box<dyn Ledger>> {
    match mode {
        Mode::Google => {
            let mut credentials = Credentials::load(config).await?;
            let spreadsheet_id = match config.spreadsheet() {
                Spreadsheet::Id(id) => id.clone(),
                Spreadsheet::Title(title) => {
                    let token = credentials.access_token().await?;
                    find_spreadsheet(DRIVE_API, &token, title).await?
                }
            };
            Ok(Box::new(sheet::GoogleLedger::new(
                spreadsheet_id,
                credentials,
            )))
        }
        Mode::Test => Ok(Box::new(TestLedger::for_spreadsheet(
            config.spreadsheet().as_str(),
        ))),
    }
}
