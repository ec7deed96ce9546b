//! These structs provide the CLI interface for the halogen CLI.

use crate::whitelist::Instruction;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// halogen: keeps the Halogen game-server payee ledger in order.
///
/// The ledger is a Google Sheet with one worksheet per month. This program adds and removes
/// payees while keeping the sheet sorted, rolls the ledger over each month, posts payment pool
/// announcements to Discord and keeps the game servers' whitelists in step. It can be driven from
/// a cron job (`halogen run <task>`), from the command line or from Discord (`halogen bot`).
///
/// Before anything else, create `$HALOGEN_HOME/config.json` and run `halogen auth` once to
/// authorize access to the spreadsheet.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a scheduled task by name or alias, e.g. `rotate_month` or `pool_open`.
    ///
    /// The built-in tasks are rotate_month, reset_status, pool_open, pool_reminder and
    /// pool_closed. More aliases can be added in the `tasks` list of the config file. The exit
    /// code is non-zero if the task fails or cannot be found.
    Run(RunArgs),
    /// Add a payee to this month's ledger.
    Join(JoinArgs),
    /// Remove a payee from this month's ledger.
    Leave(LeaveArgs),
    /// Change a game's whitelist without touching the ledger.
    Whitelist(WhitelistArgs),
    /// Listen for commands in the configured Discord channel.
    Bot,
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the halogen configuration and secrets are held. Defaults to ~/halogen
    #[arg(long, env = "HALOGEN_HOME", default_value_t = default_halogen_home())]
    halogen_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, halogen_home: PathBuf) -> Self {
        Self {
            log_level,
            halogen_home: halogen_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn halogen_home(&self) -> &DisplayPath {
        &self.halogen_home
    }
}

/// (Not shown): Args for the `halogen run` command.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// The task name or alias.
    task: String,
}

impl RunArgs {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }

    pub fn task(&self) -> &str {
        &self.task
    }
}

/// (Not shown): Args for the `halogen join` command.
#[derive(Debug, Parser, Clone)]
pub struct JoinArgs {
    /// The payee's name. Hyphens and underscores separate words, e.g. `mary-jane`.
    name: String,

    /// The payee's game ID, written to the ID column of the ledger.
    id: String,

    /// Also add the ID to this game's whitelist.
    #[arg(long)]
    game: Option<String>,
}

impl JoinArgs {
    pub fn new(name: impl Into<String>, id: impl Into<String>, game: Option<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            game,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn game(&self) -> Option<&str> {
        self.game.as_deref()
    }
}

/// (Not shown): Args for the `halogen leave` command.
#[derive(Debug, Parser, Clone)]
pub struct LeaveArgs {
    /// The payee's name.
    name: String,

    /// Also remove the payee's ID from this game's whitelist.
    #[arg(long)]
    game: Option<String>,
}

impl LeaveArgs {
    pub fn new(name: impl Into<String>, game: Option<String>) -> Self {
        Self {
            name: name.into(),
            game,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn game(&self) -> Option<&str> {
        self.game.as_deref()
    }
}

/// (Not shown): Args for the `halogen whitelist` command.
#[derive(Debug, Parser, Clone)]
pub struct WhitelistArgs {
    /// The game, as named in the `games` list of the config file.
    game: String,

    /// One of add, remove or update.
    instruction: Instruction,

    /// The ID to remove, used by remove and update.
    #[arg(long, default_value = "")]
    old_id: String,

    /// The ID to add, used by add and update.
    #[arg(long, default_value = "")]
    new_id: String,
}

impl WhitelistArgs {
    pub fn new(
        game: impl Into<String>,
        instruction: Instruction,
        old_id: impl Into<String>,
        new_id: impl Into<String>,
    ) -> Self {
        Self {
            game: game.into(),
            instruction,
            old_id: old_id.into(),
            new_id: new_id.into(),
        }
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn old_id(&self) -> &str {
        &self.old_id
    }

    pub fn new_id(&self) -> &str {
        &self.new_id
    }
}

/// (Not shown): Args for the `halogen auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

fn default_halogen_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("halogen"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --halogen-home or HALOGEN_HOME instead of relying on the default \
                halogen home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("halogen")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whitelist() {
        let args = Args::try_parse_from([
            "halogen",
            "--halogen-home",
            "/srv/halogen",
            "whitelist",
            "minecraft",
            "update",
            "--old-id",
            "steve",
            "--new-id",
            "alex",
        ])
        .unwrap();
        assert_eq!(Path::new("/srv/halogen"), args.common().halogen_home().path());
        let Command::Whitelist(whitelist) = args.command() else {
            panic!("expected the whitelist command");
        };
        assert_eq!(Instruction::Update, whitelist.instruction());
        assert_eq!("steve", whitelist.old_id());
        assert_eq!("alex", whitelist.new_id());
    }

    #[test]
    fn test_parse_join() {
        let args = Args::try_parse_from([
            "halogen",
            "--log-level",
            "debug",
            "join",
            "mary-jane",
            "76561198000000001",
            "--game",
            "Valheim",
        ])
        .unwrap();
        assert_eq!(LevelFilter::DEBUG, args.common().log_level());
        let Command::Join(join) = args.command() else {
            panic!("expected the join command");
        };
        assert_eq!("mary-jane", join.name());
        assert_eq!(Some("Valheim"), join.game());
    }

    #[test]
    fn test_reject_unknown_instruction() {
        assert!(Args::try_parse_from(["halogen", "whitelist", "minecraft", "swap"]).is_err());
    }
}
