use clap::Parser;
use halogen_pay::args::{Args, Command};
use halogen_pay::whitelist::Ids;
use halogen_pay::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<ExitCode> {
    trace!("{args:?}");
    let config = Config::load(args.common().halogen_home().path()).await?;

    // This allows for testing the program without hitting the Google APIs. When
    // HALOGEN_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Google.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Run(run_args) => {
            let out = commands::run(&config, mode, run_args.task()).await?;
            out.print();
            // The exit code tells cron whether the task worked
            if !out.structure().is_some_and(|o| o.success) {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Join(join_args) => commands::join(
            &config,
            mode,
            join_args.name(),
            join_args.id(),
            join_args.game(),
        )
        .await?
        .print(),

        Command::Leave(leave_args) => {
            commands::leave(&config, mode, leave_args.name(), leave_args.game())
                .await?
                .print()
        }

        Command::Whitelist(whitelist_args) => {
            let ids = Ids {
                old: whitelist_args.old_id().to_string(),
                new: whitelist_args.new_id().to_string(),
            };
            commands::whitelist(
                &config,
                whitelist_args.game(),
                whitelist_args.instruction(),
                ids,
            )
            .await?
            .print()
        }

        Command::Bot => commands::bot(config, mode).await?.print(),

        Command::Auth(auth_args) => {
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config).await?.print()
            }
        }
    };
    Ok(ExitCode::SUCCESS)
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
