//! Recallbench CLI entry point.
//!
//! Binary name: `rbench`
//!
//! Parses CLI arguments, loads configuration from the data directory, then
//! dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,recallbench=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "rbench", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await;

    match cli.command {
        Commands::Match { file, concurrency } => {
            cli::run::run_match(&state, file, concurrency, cli.json, cli.quiet).await?;
        }

        Commands::Score { file } => {
            cli::score::run_score(&state, file, cli.json, cli.quiet).await?;
        }

        Commands::Report { file } => {
            cli::report::run_report(&state, file, cli.json).await?;
        }

        Commands::Verify { file } => {
            cli::verify::run_verify(&state, file, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
