use clap::Parser;
use passive_bloom::args::{Args, Command, PassiveCommand, TimeCommand};
use passive_bloom::{commands, Config, Mode, Result};
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
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            debug!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().bloom_home().path();

    // This allows for testing the program without the hosted services. When BLOOM_IN_TEST_MODE is
    // set and non-zero in length, then the mode will be Mode::Testing, otherwise Mode::Hosted.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.credentials(), init_args.store_url())
                .await?
                .print()
        }

        Command::Login(login_args) => {
            let config = Config::load(home).await?;
            commands::login(&config, mode, login_args.email(), login_args.password())
                .await?
                .print()
        }

        Command::Logout => commands::logout(&Config::load(home).await?).await?.print(),

        Command::Whoami => commands::whoami(&Config::load(home).await?).await?.print(),

        Command::Utilities(report) => {
            let config = Config::load(home).await?;
            commands::utilities(&config, mode, report).await?.print()
        }

        Command::Dividends(report) => {
            let config = Config::load(home).await?;
            commands::dividends(&config, mode, report).await?.print()
        }

        Command::Coverage(report) => {
            let config = Config::load(home).await?;
            commands::coverage(&config, mode, report).await?.print()
        }

        Command::Passive(passive) => {
            let config = Config::load(home).await?;
            match passive {
                PassiveCommand::List(list) => commands::passive_list(&config, mode, list.format())
                    .await?
                    .print(),
                PassiveCommand::Get(get) => {
                    commands::passive_get(&config, mode, get.id(), get.format())
                        .await?
                        .print()
                }
            }
        }

        Command::Time(time) => {
            let config = Config::load(home).await?;
            match time {
                TimeCommand::List(list) => commands::time_list(&config, mode, list.format())
                    .await?
                    .print(),
                TimeCommand::Add(add) => commands::time_add(&config, mode, add.start(), add.end())
                    .await?
                    .print(),
                TimeCommand::Pay(pay) => commands::time_pay(&config, mode, pay.id()).await?.print(),
                TimeCommand::Summary(summary) => {
                    commands::time_summary(&config, mode, summary.format())
                        .await?
                        .print()
                }
            }
        }

        Command::Import(import_args) => {
            let config = Config::load(home).await?;
            commands::import(
                &config,
                mode,
                import_args.table().into(),
                import_args.file(),
            )
            .await?
            .print()
        }

        Command::Watch => commands::watch(&Config::load(home).await?).await?.print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
