//! Dataset consistency diagnostics.
//!
//! Read-only scan over ground truth and a (flattened) memories dataset,
//! reporting the integrity problems that break matching or quietly skew quiz
//! scores. Never mutates anything; operators run it before and after a
//! matching run.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use recallbench_types::fact::PersonFacts;
use recallbench_types::memory::PersonMemories;

/// A fact ID appearing more than once within one person's ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateFactId {
    pub person_id: i64,
    pub id: i64,
    pub occurrences: usize,
}

/// A memory content string appearing more than once for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateContent {
    pub person_id: i64,
    pub content: String,
    pub occurrences: usize,
}

/// A memory whose own ID list repeats an ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatedMemoryId {
    pub person_id: i64,
    pub content: String,
    pub id: i64,
}

/// A ground-truth fact no memory claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UncoveredFact {
    pub person_id: i64,
    pub id: i64,
    pub content: String,
}

/// Everything the consistency scan found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub duplicate_fact_ids: Vec<DuplicateFactId>,
    pub duplicate_contents: Vec<DuplicateContent>,
    pub repeated_memory_ids: Vec<RepeatedMemoryId>,
    pub uncovered_facts: Vec<UncoveredFact>,
}

impl ConsistencyReport {
    /// True when the scan found nothing wrong.
    ///
    /// Uncovered facts are expected before matching has run, so they do not
    /// count against cleanliness.
    pub fn is_clean(&self) -> bool {
        self.duplicate_fact_ids.is_empty()
            && self.duplicate_contents.is_empty()
            && self.repeated_memory_ids.is_empty()
    }
}

/// Scan ground truth and a flat memories dataset for integrity problems.
pub fn check_consistency(
    people: &[PersonFacts],
    memories: &[PersonMemories],
) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();

    for person in people {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for fact in &person.facts {
            *counts.entry(fact.id).or_default() += 1;
        }
        let mut dupes: Vec<(i64, usize)> = counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .collect();
        dupes.sort_unstable();
        for (id, occurrences) in dupes {
            report.duplicate_fact_ids.push(DuplicateFactId {
                person_id: person.person_id,
                id,
                occurrences,
            });
        }
    }

    let mut claimed: HashMap<i64, HashSet<i64>> = HashMap::new();
    for person in memories {
        let claimed = claimed.entry(person.person_id).or_default();
        let mut content_counts: HashMap<&str, usize> = HashMap::new();
        for memory in &person.extracted_memories {
            *content_counts.entry(memory.content.as_str()).or_default() += 1;
            claimed.extend(memory.id.iter().copied());

            let mut seen = HashSet::with_capacity(memory.id.len());
            for &id in &memory.id {
                if !seen.insert(id) {
                    report.repeated_memory_ids.push(RepeatedMemoryId {
                        person_id: person.person_id,
                        content: memory.content.clone(),
                        id,
                    });
                }
            }
        }
        let mut dupes: Vec<(&str, usize)> = content_counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .collect();
        dupes.sort_unstable();
        for (content, occurrences) in dupes {
            report.duplicate_contents.push(DuplicateContent {
                person_id: person.person_id,
                content: content.to_string(),
                occurrences,
            });
        }
    }

    // Coverage only makes sense for persons the memories file contains.
    for person in people {
        let Some(claimed) = claimed.get(&person.person_id) else {
            continue;
        };
        for fact in &person.facts {
            if !claimed.contains(&fact.id) {
                report.uncovered_facts.push(UncoveredFact {
                    person_id: person.person_id,
                    id: fact.id,
                    content: fact.content.clone(),
                });
            }
        }
    }

    report
}
