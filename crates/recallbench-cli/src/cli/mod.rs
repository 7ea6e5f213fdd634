//! CLI command definitions and dispatch for the `rbench` binary.
//!
//! Uses clap derive macros for argument parsing. Commands mirror the
//! pipeline stages: `match` reconciles memories with ground truth, `score`
//! runs the retrieval quiz, `report` summarizes a completed quiz, `verify`
//! checks dataset integrity.

pub mod report;
pub mod run;
pub mod score;
pub mod verify;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Match extracted memories against ground-truth facts and score recall.
#[derive(Parser)]
#[command(name = "rbench", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the two-pass matching pipeline over a memories file.
    #[command(name = "match")]
    Match {
        /// Memories file to match (picks interactively from the extracted
        /// memories directory if omitted).
        file: Option<PathBuf>,

        /// Persons classified concurrently in pass 1 (overrides config).
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Run the memory quiz over a fully matched memories file.
    Score {
        /// Matched memories file to score (picks interactively if omitted).
        file: Option<PathBuf>,
    },

    /// Summarize a completed quiz: metrics by difficulty, worst questions.
    Report {
        /// Completed quiz file (defaults to the most recent one).
        file: Option<PathBuf>,
    },

    /// Check ground truth and a memories file for integrity problems.
    Verify {
        /// Memories file to check (picks interactively if omitted).
        file: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Resolve the memories file to operate on: the explicit argument, or an
/// interactive pick over the candidates, newest first.
pub(crate) async fn resolve_memories_file(
    state: &crate::state::AppState,
    file: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    use anyhow::Context;
    use recallbench_core::store::DatasetStore;

    if let Some(file) = file {
        return Ok(file);
    }

    let candidates = state
        .store
        .list_memories_files()
        .await
        .context("No memories files to choose from")?;

    if candidates.len() == 1 {
        return Ok(candidates[0].clone());
    }

    let names: Vec<String> = candidates
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();

    let selection = dialoguer::Select::new()
        .with_prompt("Select a memories file")
        .items(&names)
        .default(0)
        .interact()?;

    Ok(candidates[selection].clone())
}
