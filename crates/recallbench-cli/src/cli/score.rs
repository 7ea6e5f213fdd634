//! The `score` command: run the memory quiz over a matched memories file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use recallbench_core::convert::to_flat;
use recallbench_core::facts::FactStore;
use recallbench_core::quiz::{aggregate_reports, QuizEvaluator};
use recallbench_core::store::DatasetStore;
use recallbench_infra::embedding::FastEmbedder;
use recallbench_types::memory::{MemoryDataset, PersonMemories};
use recallbench_types::quiz::CompletedPersonQuiz;

use crate::state::AppState;

/// Run the quiz and persist the completed results.
///
/// # Examples
///
/// ```bash
/// rbench score
/// rbench score extracted_memories/run_42.json --json
/// ```
pub async fn run_score(
    state: &AppState,
    file: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let path = super::resolve_memories_file(state, file).await?;

    let facts = FactStore::new(state.store.load_people().await?)?;
    let quiz = state.store.load_quiz().await?;
    let dataset = state.store.load_dataset(&path).await?;

    let memories: Vec<PersonMemories> = match dataset {
        MemoryDataset::Flat(persons) => persons,
        MemoryDataset::Structured(persons) => to_flat(&persons)?,
    };

    let spinner = start_spinner(quiet || json, "Loading embedding model...");
    let embedder =
        tokio::task::spawn_blocking(FastEmbedder::new)
            .await
            .context("Embedder initialization panicked")??;

    let evaluator = QuizEvaluator::new(&embedder, &facts);
    evaluator
        .validate(&memories, &quiz)
        .context("Dataset is not ready to score")?;

    let mut completed: Vec<CompletedPersonQuiz> = Vec::new();
    for person_quiz in &quiz {
        let Some(person_memories) = memories
            .iter()
            .find(|m| m.person_id == person_quiz.person_id)
        else {
            tracing::warn!(
                person_id = person_quiz.person_id,
                "person has quiz questions but no memories; skipping"
            );
            continue;
        };
        spinner.set_message(format!("Scoring person {}...", person_quiz.person_id));
        completed.push(evaluator.evaluate_person(person_memories, person_quiz).await?);
    }
    spinner.finish_and_clear();

    if completed.is_empty() {
        bail!("No quiz persons overlap with the memories file");
    }

    let saved_to = state.store.save_completed_quiz(&completed).await?;
    let report = aggregate_reports(&completed);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "saved_to": saved_to,
                "report": report,
            }))?
        );
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} Scored {} persons, results saved to '{}'",
        style("✓").green().bold(),
        style(completed.len()).bold(),
        style(saved_to.display()).cyan()
    );
    println!();
    println!("{}", super::report::metrics_table(&report));
    println!();

    Ok(())
}

fn start_spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
