//! The `match` command: run the two-pass pipeline over a memories file.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use recallbench_core::pipeline::{run_matching, MatchSummary};
use recallbench_core::progress::ProgressSink;
use recallbench_infra::llm::OpenAiClassifier;

use crate::state::AppState;

/// Drives one indicatif bar per pass.
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn start(&self, total: usize, message: &'static str) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(template) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:30.cyan/dim}] {pos}/{len}")
        {
            bar.set_style(template.progress_chars("=> "));
        }
        bar.set_message(message);
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.take() {
                previous.finish_and_clear();
            }
            *guard = Some(bar);
        }
    }

    fn tick(&self) {
        if let Ok(guard) = self.bar.lock()
            && let Some(bar) = guard.as_ref()
        {
            bar.inc(1);
        }
    }

    fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for CliProgress {
    fn pass_one_started(&self, total_memories: usize) {
        self.start(total_memories, "pass 1: matching memories to facts");
    }

    fn memory_processed(&self) {
        self.tick();
    }

    fn pass_two_started(&self, residual_facts: usize) {
        self.start(residual_facts, "pass 2: absorbing residual facts");
    }

    fn fact_processed(&self) {
        self.tick();
    }
}

/// Run the matching pipeline.
///
/// # Examples
///
/// ```bash
/// rbench match
/// rbench match extracted_memories/run_42.json --concurrency 8
/// ```
pub async fn run_match(
    state: &AppState,
    file: Option<PathBuf>,
    concurrency: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let path = super::resolve_memories_file(state, file).await?;
    let concurrency = concurrency.unwrap_or(state.config.matching.concurrency);

    let classifier = OpenAiClassifier::from_env(&state.config.llm)
        .context("Classifier API key is not configured")?;

    let progress = CliProgress::new(quiet || json);
    let summary = run_matching(&state.store, &classifier, &path, concurrency, &progress)
        .await
        .with_context(|| format!("Matching failed for {}", path.display()))?;
    progress.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} Matched '{}' ({} format)",
        style("✓").green().bold(),
        style(path.display()).cyan(),
        summary.format
    );
    println!();
    println!(
        "  {} memories across {} persons",
        style(summary.memories).bold(),
        style(summary.persons).bold()
    );
    println!(
        "  {} already matched, {} matched in pass 1",
        summary.passed_through, summary.matched_first_pass
    );
    println!(
        "  {} residual facts, {} absorbed in pass 2",
        summary.residual_facts, summary.absorbed_second_pass
    );
    println!("  {} memories given fresh IDs", summary.allocated);
    if summary.skipped > 0 {
        println!(
            "  {} {} items skipped after classifier protocol violations",
            style("!").yellow().bold(),
            summary.skipped
        );
    }
    println!();

    Ok(())
}

fn summary_json(summary: &MatchSummary) -> serde_json::Value {
    serde_json::json!({
        "format": summary.format.to_string(),
        "persons": summary.persons,
        "memories": summary.memories,
        "passed_through": summary.passed_through,
        "matched_first_pass": summary.matched_first_pass,
        "residual_facts": summary.residual_facts,
        "absorbed_second_pass": summary.absorbed_second_pass,
        "allocated": summary.allocated,
        "skipped": summary.skipped,
    })
}
