//! The `report` command: summarize a completed quiz.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use recallbench_core::quiz::{
    aggregate_reports, person_report, worst_questions, WorstBy, WorstQuestion, WORST_COUNT,
};
use recallbench_core::store::DatasetStore;
use recallbench_types::quiz::MetricsReport;

use crate::state::AppState;

/// Print metrics by difficulty and the worst-performing questions.
///
/// # Examples
///
/// ```bash
/// rbench report
/// rbench report tests/completed_memory_quiz_2026-08-26.json
/// ```
pub async fn run_report(state: &AppState, file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => latest_completed_quiz(state).await?,
    };

    let completed = state
        .store
        .load_completed_quiz(&path)
        .await
        .with_context(|| format!("Failed to load completed quiz {}", path.display()))?;

    let report = aggregate_reports(&completed);
    let worst_recall = worst_questions(&completed, WorstBy::Recall, WORST_COUNT);
    let worst_precision = worst_questions(&completed, WorstBy::Precision, WORST_COUNT);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": path,
                "report": report,
                "worst_by_recall": worst_json(&worst_recall),
                "worst_by_precision": worst_json(&worst_precision),
            }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  Quiz report for '{}'",
        style(path.display()).cyan().bold()
    );
    println!();
    println!("{}", metrics_table(&report));
    println!();
    for person in &completed {
        println!(
            "  {}",
            style(format!("Person {}", person.person_id)).bold()
        );
        println!("{}", metrics_table(&person_report(person)));
        println!();
    }
    println!("  {}", style("Worst questions by recall").bold());
    println!("{}", worst_table(&worst_recall));
    println!();
    println!("  {}", style("Worst questions by precision").bold());
    println!("{}", worst_table(&worst_precision));
    println!();

    Ok(())
}

/// Most recent completed quiz file in the results directory.
async fn latest_completed_quiz(state: &AppState) -> Result<PathBuf> {
    let dir = state.data_dir.join("tests");
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .with_context(|| format!("No quiz results directory at {}", dir.display()))?;

    let mut newest: Option<(PathBuf, std::time::SystemTime)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "json") {
            continue;
        }
        let modified = entry.metadata().await?.modified()?;
        if newest.as_ref().is_none_or(|(_, best)| modified > *best) {
            newest = Some((path, modified));
        }
    }

    match newest {
        Some((path, _)) => Ok(path),
        None => bail!("No completed quiz files in {}", dir.display()),
    }
}

/// Metrics table shared with the `score` command.
pub fn metrics_table(report: &MetricsReport) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Bucket").fg(Color::White),
        Cell::new("Precision").fg(Color::White),
        Cell::new("Recall").fg(Color::White),
        Cell::new("F1").fg(Color::White),
    ]);

    for (difficulty, metrics) in &report.by_difficulty {
        table.add_row(vec![
            Cell::new(difficulty.to_string()).fg(Color::Cyan),
            Cell::new(format!("{:.3}", metrics.precision)),
            Cell::new(format!("{:.3}", metrics.recall)),
            Cell::new(format!("{:.3}", metrics.f1)),
        ]);
    }
    table.add_row(vec![
        Cell::new("overall").fg(Color::Yellow),
        Cell::new(format!("{:.3}", report.overall.precision)),
        Cell::new(format!("{:.3}", report.overall.recall)),
        Cell::new(format!("{:.3}", report.overall.f1)),
    ]);
    table
}

fn worst_table(rows: &[WorstQuestion]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Person").fg(Color::White),
        Cell::new("Question").fg(Color::White),
        Cell::new("Difficulty").fg(Color::White),
        Cell::new("Predicted / actual IDs").fg(Color::White),
        Cell::new("Precision").fg(Color::White),
        Cell::new("Recall").fg(Color::White),
    ]);

    for row in rows {
        let ids = format!(
            "{:?} / {:?}",
            row.result.predicted_memory_ids, row.result.actual_memory_ids
        );
        table.add_row(vec![
            Cell::new(row.person_id).fg(Color::DarkGrey),
            Cell::new(truncate(&row.result.question, 60)),
            Cell::new(row.result.difficulty.to_string()).fg(Color::Cyan),
            Cell::new(ids).fg(Color::DarkGrey),
            Cell::new(format!("{:.3}", row.metrics.precision)),
            Cell::new(format!("{:.3}", row.metrics.recall)),
        ]);
    }
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        let cut = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= max - 3)
            .last()
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}

fn worst_json(rows: &[WorstQuestion]) -> Vec<serde_json::Value> {
    rows.iter()
        .map(|row| {
            serde_json::json!({
                "person_id": row.person_id,
                "question_id": row.result.question_id,
                "question": row.result.question,
                "difficulty": row.result.difficulty.to_string(),
                "predicted_memory_ids": row.result.predicted_memory_ids,
                "actual_memory_ids": row.result.actual_memory_ids,
                "predicted_texts": row.result.predicted_texts,
                "precision": row.metrics.precision,
                "recall": row.metrics.recall,
                "f1": row.metrics.f1,
            })
        })
        .collect()
}
