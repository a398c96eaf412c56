use clap::Parser;
use pnl_rollup::args::{Args, Command};
use pnl_rollup::{commands, Config, Result};
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
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().pnl_home().path();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Import(import_args) => {
            let config = Config::load(home).await?;
            commands::import(config, import_args.clone()).await?.print()
        }

        Command::Aggregate(aggregate_args) => {
            let config = Config::load(home).await?;
            commands::aggregate(config, aggregate_args.clone())
                .await?
                .print()
        }

        Command::Reconcile(reconcile_args) => {
            let config = Config::load(home).await?;
            commands::reconcile(config, reconcile_args.clone())
                .await?
                .print()
        }

        Command::Serve(serve_args) => {
            let config = Config::load(home).await?;
            commands::serve(config, serve_args.clone()).await?.print()
        }
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
