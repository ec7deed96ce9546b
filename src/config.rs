//! Configuration file handling for halogen.
//!
//! The configuration file is stored at `$HALOGEN_HOME/config.json`. It holds the Google Sheets
//! credentials and spreadsheet identity, the Discord bot and webhook settings, the pool links, the
//! per-game whitelist settings and the task alias table.

use crate::error::{ErrorType, IntoResult};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

const SECRETS: &str = ".secrets";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const DEFAULT_GAME: &str = "Steam";
const DEFAULT_COST_FORMULA: &str = "=G3";
const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";
const DEFAULT_PREFIX: &str = "-";
const MIN_ID_LEN: usize = 30;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$HALOGEN_HOME` and from there it loads `$HALOGEN_HOME/config.json`. It is loaded
/// once at startup and handed to each component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet: Spreadsheet,
}

impl Config {
    /// This will
    /// - validate that `halogen_home` and its config file exist
    /// - load and validate the config file
    /// - create the secrets directory if it is missing
    /// - return the loaded configuration object
    pub async fn load(halogen_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = halogen_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Halogen home is missing")
            .pub_result(ErrorType::Config)?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            return Err(anyhow::anyhow!(
                "The config file is missing '{}'",
                config_path.display()
            ))
            .pub_result(ErrorType::Config);
        }
        let config_file = ConfigFile::load(&config_path)
            .await
            .pub_result(ErrorType::Config)?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        Self::new(root, config_file)
    }

    /// Builds a `Config` from an already parsed `ConfigFile`.
    pub(crate) fn new(root: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let spreadsheet = Spreadsheet::parse(&config_file.gsheets.spreadsheet)
            .context("Failed to read gsheets.spreadsheet")
            .pub_result(ErrorType::Config)?;

        Ok(Self {
            secrets: root.join(SECRETS),
            config_path: root.join(CONFIG_JSON),
            root,
            config_file,
            spreadsheet,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn spreadsheet(&self) -> &Spreadsheet {
        &self.spreadsheet
    }

    pub fn gsheets(&self) -> &GsheetsConfig {
        &self.config_file.gsheets
    }

    pub fn discord(&self) -> &DiscordConfig {
        &self.config_file.discord
    }

    pub fn paypal(&self) -> &PaypalConfig {
        &self.config_file.paypal
    }

    pub fn steam(&self) -> &SteamConfig {
        &self.config_file.steam
    }

    pub fn games(&self) -> &[GameConfig] {
        &self.config_file.games
    }

    /// The task alias lists. The first entry of each list is the canonical task name.
    pub fn tasks(&self) -> &[Vec<String>] {
        &self.config_file.tasks
    }

    /// Finds the game named `name`, ignoring case.
    pub fn game(&self, name: &str) -> Option<&GameConfig> {
        self.games()
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
    }

    /// The credentials file, an OAuth client secret or a service account key. Relative paths are resolved against `$HALOGEN_HOME`.
    pub fn client_secret_path(&self) -> PathBuf {
        utils::resolve(&self.root, &self.config_file.gsheets.cred)
    }

    /// Where the OAuth token is kept, `$HALOGEN_HOME/.secrets/token.json`.
    pub fn token_path(&self) -> PathBuf {
        self.secrets.join(TOKEN_JSON)
    }

    /// The path of a game's whitelist file, resolved against `$HALOGEN_HOME`.
    pub fn whitelist_path(&self, game: &GameConfig) -> PathBuf {
        utils::resolve(&self.root, &game.path)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "gsheets": {
///     "cred": ".secrets/client_secret.json",
///     "scope": ["https://www.googleapis.com/auth/spreadsheets"],
///     "spreadsheet": "https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX"
///   },
///   "discord": {
///     "token": "bot-token",
///     "role": "811001122334455667",
///     "modRole": "811001122334455668",
///     "everyone": "@everyone",
///     "allRole": "811001122334455669",
///     "channel": "811001122334455670",
///     "webhook": "https://discord.com/api/webhooks/1/abc"
///   },
///   "paypal": { "pool": "https://paypal.me/pools/c/halogen", "thumbnail": "https://example.com/pp.png" },
///   "steam": { "key": "", "url": "https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v2/" },
///   "games": [
///     { "name": "Minecraft", "whitelist": true, "path": "/srv/minecraft/whitelist.json" },
///     { "name": "Valheim", "whitelist": true, "path": "/srv/valheim/permittedlist.txt" }
///   ],
///   "tasks": [["rotate_month", "update", "rotate"], ["pool_open", "open"]]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigFile {
    pub(crate) gsheets: GsheetsConfig,
    pub(crate) discord: DiscordConfig,
    pub(crate) paypal: PaypalConfig,
    #[serde(default)]
    pub(crate) steam: SteamConfig,
    #[serde(default)]
    pub(crate) games: Vec<GameConfig>,
    #[serde(default)]
    pub(crate) tasks: Vec<Vec<String>>,
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if a task alias list is empty.
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        if config.tasks.iter().any(|aliases| aliases.is_empty()) {
            bail!("Every entry in 'tasks' needs at least one alias");
        }

        Ok(config)
    }
}

/// The `gsheets` section.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GsheetsConfig {
    /// Path to the OAuth 2.0 client credentials file or service account key (relative to
    /// `$HALOGEN_HOME` or absolute).
    pub cred: PathBuf,

    /// The OAuth scopes to request.
    #[serde(default = "default_scope")]
    pub scope: Vec<String>,

    /// The URL, ID or title of the ledger spreadsheet.
    pub spreadsheet: String,

    /// The game whose ID column is written for each payee, i.e. the `<Game> ID` header.
    #[serde(default = "default_game")]
    pub game: String,

    /// The formula written into each payee row's cost cell.
    #[serde(default = "default_cost_formula")]
    pub cost_formula: String,

    /// The `chrono` format of the `Payment date` cell.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

/// The `discord` section. IDs may be given as JSON numbers or strings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    pub token: String,
    /// Members with this role may `join` and `leave`.
    #[serde(deserialize_with = "string_or_number")]
    pub role: String,
    /// Members with this role may use every command.
    #[serde(deserialize_with = "string_or_number")]
    pub mod_role: String,
    /// The mention used when `all_role` is empty, e.g. `@everyone`.
    #[serde(default)]
    pub everyone: String,
    /// The role mentioned by pool announcements.
    #[serde(default, deserialize_with = "string_or_number")]
    pub all_role: String,
    /// The channel the bot listens to for commands.
    #[serde(deserialize_with = "string_or_number")]
    pub channel: String,
    /// The webhook URL that pool announcements are posted to.
    pub webhook: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl DiscordConfig {
    /// The mention placed in the content of pool announcements.
    pub fn mention(&self) -> String {
        if self.all_role.is_empty() {
            self.everyone.clone()
        } else {
            format!("<@&{}>", self.all_role)
        }
    }
}

/// The `paypal` section.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PaypalConfig {
    /// The URL of the payment pool.
    pub pool: String,
    /// The image shown on pool announcements.
    #[serde(default)]
    pub thumbnail: String,
}

/// The `steam` section. Steam ID verification is skipped when `key` is empty.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SteamConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub url: String,
}

/// An entry in the `games` list.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct GameConfig {
    pub name: String,
    /// Whether the whitelist of this game is managed at all.
    pub whitelist: bool,
    /// The whitelist file.
    pub path: PathBuf,
    /// The file format. Defaults by game name when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<WhitelistFormat>,
}

impl GameConfig {
    /// The configured format, or the known format for the game's name.
    pub fn whitelist_format(&self) -> Option<WhitelistFormat> {
        self.format.or_else(|| match self.name.to_lowercase().as_str() {
            "minecraft" => Some(WhitelistFormat::Json),
            "valheim" => Some(WhitelistFormat::Text),
            _ => None,
        })
    }
}

/// How a whitelist file is laid out.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitelistFormat {
    /// A JSON array of `{"name": ..., "uuid": ...}` records.
    Json,
    /// One identifier per line.
    Text,
}

serde_plain::derive_display_from_serialize!(WhitelistFormat);
serde_plain::derive_fromstr_from_deserialize!(WhitelistFormat);

fn default_scope() -> Vec<String> {
    crate::api::OAUTH_SCOPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_game() -> String {
    DEFAULT_GAME.to_string()
}

fn default_cost_formula() -> String {
    DEFAULT_COST_FORMULA.to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Discord snowflakes are often pasted into config files as bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// How `gsheets.spreadsheet` names the ledger.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Spreadsheet {
    Id(String),
    /// Looked up through Google Drive when the ledger is opened.
    Title(String),
}

impl Spreadsheet {
    /// Reads a Google Sheets URL, a bare spreadsheet ID or a spreadsheet title.
    ///
    /// Values of at least 30 letters, digits, `-` and `_` are IDs, since Google spreadsheet IDs
    /// are 44 such characters long. Anything else without a URL scheme is a title.
    ///
    /// # Arguments
    /// * `value` - e.g. "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit",
    ///   "SPREADSHEET_ID" or "Halogen Payments"
    fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            bail!("The spreadsheet cannot be empty");
        }
        if value.contains("://") {
            return extract_spreadsheet_id(value).map(|id| Spreadsheet::Id(id.to_string()));
        }
        let id_like = value.len() >= MIN_ID_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        Ok(if id_like {
            Spreadsheet::Id(value.to_string())
        } else {
            Spreadsheet::Title(value.to_string())
        })
    }

    /// The ID or title as written.
    pub fn as_str(&self) -> &str {
        match self {
            Spreadsheet::Id(s) | Spreadsheet::Title(s) => s,
        }
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL.
fn extract_spreadsheet_id(value: &str) -> Result<&str> {
    let url = url::Url::parse(value).with_context(|| format!("Invalid URL '{value}'"))?;
    let mut segments = url
        .path_segments()
        .with_context(|| format!("URL has no path '{value}'"))?;
    while let Some(segment) = segments.next() {
        if segment == "d" {
            if let Some(id) = segments.next().filter(|id| !id.is_empty()) {
                // The ID is a slice of the path, which is a slice of `value`.
                let start = value
                    .find(id)
                    .with_context(|| format!("Unable to locate ID in '{value}'"))?;
                return Ok(&value[start..start + id.len()]);
            }
        }
    }
    bail!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_type;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{
        "gsheets": {
            "cred": ".secrets/client_secret.json",
            "spreadsheet": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit"
        },
        "discord": {
            "token": "t",
            "role": 811001122334455667,
            "modRole": "811001122334455668",
            "channel": 811001122334455670,
            "webhook": "https://discord.com/api/webhooks/1/abc"
        },
        "paypal": { "pool": "https://paypal.me/pools/c/halogen" }
    }"#;

    #[tokio::test]
    async fn test_config_load() {
        let dir = TempDir::new().unwrap();
        utils::write(dir.path().join(CONFIG_JSON), MINIMAL)
            .await
            .unwrap();

        let config = Config::load(dir.path()).await.unwrap();

        assert_eq!(
            &Spreadsheet::Id("7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL".to_string()),
            config.spreadsheet()
        );
        assert!(config.secrets().is_dir());
        assert_eq!(
            config.root().join(".secrets/client_secret.json"),
            config.client_secret_path()
        );
        assert_eq!(config.root().join(".secrets/token.json"), config.token_path());
    }

    #[tokio::test]
    async fn test_config_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        utils::write(&path, MINIMAL).await.unwrap();
        let file = ConfigFile::load(&path).await.unwrap();

        assert_eq!("Steam", file.gsheets.game);
        assert_eq!("=G3", file.gsheets.cost_formula);
        assert_eq!("%d/%m/%Y", file.gsheets.date_format);
        assert_eq!("811001122334455667", file.discord.role);
        assert_eq!("811001122334455670", file.discord.channel);
        assert_eq!("-", file.discord.prefix);
        assert!(file.games.is_empty());
        assert!(file.tasks.is_empty());
        assert!(file.steam.key.is_empty());
    }

    #[tokio::test]
    async fn test_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let e = Config::load(dir.path()).await.unwrap_err();
        assert_eq!(Some(ErrorType::Config), error_type(&e));
        assert!(e.to_string().contains("config file is missing"));
    }

    #[tokio::test]
    async fn test_config_rejects_empty_alias_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let mut json: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        json["tasks"] = serde_json::json!([["pool_open", "open"], []]);
        utils::write(&path, json.to_string()).await.unwrap();

        assert!(ConfigFile::load(&path).await.is_err());
    }

    #[test]
    fn test_mention() {
        let mut file: ConfigFile = serde_json::from_str(MINIMAL).unwrap();
        file.discord.everyone = "@everyone".to_string();
        assert_eq!("@everyone", file.discord.mention());
        file.discord.all_role = "42".to_string();
        assert_eq!("<@&42>", file.discord.mention());
    }

    #[test]
    fn test_game_lookup_and_format() {
        let mut file: ConfigFile = serde_json::from_str(MINIMAL).unwrap();
        file.games = serde_json::from_str(
            r#"[
                { "name": "Minecraft", "whitelist": true, "path": "whitelist.json" },
                { "name": "Valheim", "whitelist": false, "path": "/srv/valheim/permittedlist.txt" },
                { "name": "Terraria", "whitelist": true, "path": "t.txt", "format": "text" },
                { "name": "Rust", "whitelist": true, "path": "r.txt" }
            ]"#,
        )
        .unwrap();
        let config = Config::new(PathBuf::from("/srv/halogen"), file).unwrap();

        let minecraft = config.game("minecraft").unwrap();
        assert_eq!(Some(WhitelistFormat::Json), minecraft.whitelist_format());
        assert_eq!(
            PathBuf::from("/srv/halogen/whitelist.json"),
            config.whitelist_path(minecraft)
        );
        let valheim = config.game("VALHEIM").unwrap();
        assert_eq!(Some(WhitelistFormat::Text), valheim.whitelist_format());
        assert_eq!(
            Some(WhitelistFormat::Text),
            config.game("Terraria").unwrap().whitelist_format()
        );
        assert_eq!(None, config.game("Rust").unwrap().whitelist_format());
        assert!(config.game("Factorio").is_none());
    }

    #[test]
    fn test_spreadsheet_urls_and_ids() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        assert_eq!(
            Spreadsheet::Id("7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL".to_string()),
            Spreadsheet::parse(url).unwrap()
        );

        let url2 = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar#gid=0";
        assert_eq!(Spreadsheet::Id("ABC123".to_string()), Spreadsheet::parse(url2).unwrap());

        let id = "1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX";
        assert_eq!(Spreadsheet::Id(id.to_string()), Spreadsheet::parse(id).unwrap());

        assert!(Spreadsheet::parse("https://example.com/invalid").is_err());
        assert!(Spreadsheet::parse("  ").is_err());
    }

    #[test]
    fn test_spreadsheet_titles() {
        for title in ["Halogen Payments", "Payments", "halogen/2026"] {
            assert_eq!(
                Spreadsheet::Title(title.to_string()),
                Spreadsheet::parse(title).unwrap()
            );
        }
        assert_eq!("Payments", Spreadsheet::parse(" Payments ").unwrap().as_str());
    }
}
