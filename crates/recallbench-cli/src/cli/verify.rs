//! The `verify` command: dataset integrity diagnostics.

use std::path::PathBuf;

use anyhow::Result;
use console::style;

use recallbench_core::check::{check_consistency, ConsistencyReport};
use recallbench_core::convert::to_flat;
use recallbench_core::store::DatasetStore;
use recallbench_types::memory::{MemoryDataset, PersonMemories};

use crate::state::AppState;

/// Check ground truth and a memories file for integrity problems.
///
/// # Examples
///
/// ```bash
/// rbench verify
/// rbench verify extracted_memories/run_42.json --json
/// ```
pub async fn run_verify(state: &AppState, file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = super::resolve_memories_file(state, file).await?;

    let people = state.store.load_people().await?;
    let dataset = state.store.load_dataset(&path).await?;
    let memories: Vec<PersonMemories> = match dataset {
        MemoryDataset::Flat(persons) => persons,
        MemoryDataset::Structured(persons) => to_flat(&persons)?,
    };

    let report = check_consistency(&people, &memories);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.is_clean() {
            std::process::exit(1);
        }
        return Ok(());
    }

    print_report(&path, &report);

    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(path: &std::path::Path, report: &ConsistencyReport) {
    println!();
    println!(
        "  Consistency check for '{}'",
        style(path.display()).cyan().bold()
    );
    println!();

    let check_mark = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!(
        "  {} {} duplicate fact IDs",
        check_mark(report.duplicate_fact_ids.is_empty()),
        report.duplicate_fact_ids.len()
    );
    for dupe in &report.duplicate_fact_ids {
        println!(
            "      person {}: fact {} appears {} times",
            dupe.person_id, dupe.id, dupe.occurrences
        );
    }

    println!(
        "  {} {} duplicate memory contents",
        check_mark(report.duplicate_contents.is_empty()),
        report.duplicate_contents.len()
    );
    for dupe in &report.duplicate_contents {
        println!(
            "      person {}: '{}' appears {} times",
            dupe.person_id, dupe.content, dupe.occurrences
        );
    }

    println!(
        "  {} {} memories with repeated IDs",
        check_mark(report.repeated_memory_ids.is_empty()),
        report.repeated_memory_ids.len()
    );
    for repeat in &report.repeated_memory_ids {
        println!(
            "      person {}: '{}' repeats ID {}",
            repeat.person_id, repeat.content, repeat.id
        );
    }

    println!();
    if report.uncovered_facts.is_empty() {
        println!("  {} every fact is covered by a memory", style("✓").green());
    } else {
        println!(
            "  {} {} facts not yet covered by any memory",
            style("i").blue().bold(),
            report.uncovered_facts.len()
        );
        for fact in &report.uncovered_facts {
            println!(
                "      person {}: {} '{}'",
                fact.person_id, fact.id, fact.content
            );
        }
    }
    println!();
}
