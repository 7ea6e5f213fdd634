//! The two-pass memory-to-fact reconciliation engine.
//!
//! Pass 1 (memory seeks fact) classifies each unmatched memory against the
//! owning person's fact list; it is precise but one-directional, so facts
//! whose phrasing diverged too far from any single memory slip through.
//! Pass 2 (fact seeks memory) runs only over that residual, asking the
//! classifier which already-produced memories should additionally absorb
//! each missed fact. Restricting pass 2 to the residual keeps classifier
//! calls linear in the number of originally-missed facts.
//!
//! Memories that already carry IDs pass through pass 1 untouched, which
//! makes re-running the engine on matched data a no-op and lets an
//! interrupted run resume from persisted pass-1 state without repeating
//! classifier calls.

use std::collections::HashSet;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;

use recallbench_types::error::{ClassifierError, StoreError};
use recallbench_types::fact::{is_valid_id, Fact};
use recallbench_types::memory::{FlatMemory, PersonMemories};

use crate::classifier::{FactVerdict, MatchClassifier};
use crate::facts::FactStore;
use crate::progress::ProgressSink;

/// Errors that abort a matching pass.
///
/// Protocol violations never appear here: they are logged, counted, and the
/// offending item skipped. Only transport failures and dataset lookup
/// failures stop the run.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for one pass-1 run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstPassStats {
    /// Memories that already carried IDs and were passed through unchanged.
    pub passed_through: usize,
    /// Memories the classifier matched to a fact.
    pub matched: usize,
    /// Memories the classifier answered NO_MATCH for.
    pub unmatched: usize,
    /// Memories skipped after a protocol violation.
    pub skipped: usize,
}

/// Counters for one pass-2 run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondPassStats {
    /// Residual facts examined.
    pub residual_facts: usize,
    /// Fact-ID appends performed (dedup-on-insert already applied).
    pub absorbed: usize,
    /// Facts skipped after a protocol violation.
    pub skipped: usize,
}

/// Pass-1 output: the updated memories plus the bookkeeping pass 2 needs.
#[derive(Debug)]
pub struct FirstPassOutcome {
    pub memories: Vec<PersonMemories>,
    /// Fact IDs claimed by any memory so far, across all persons.
    pub matched_fact_ids: HashSet<i64>,
    pub stats: FirstPassStats,
}

/// The reconciliation engine. Holds the classifier boundary and the
/// ground-truth fact store; carries no global state of its own.
pub struct MatchingEngine<'a, C> {
    classifier: &'a C,
    facts: &'a FactStore,
    concurrency: usize,
}

impl<'a, C: MatchClassifier> MatchingEngine<'a, C> {
    /// `concurrency` bounds the per-person fan-out of pass 1; persons are
    /// fully independent there, so any value >= 1 is sound.
    pub fn new(classifier: &'a C, facts: &'a FactStore, concurrency: usize) -> Self {
        Self {
            classifier,
            facts,
            concurrency: concurrency.max(1),
        }
    }

    /// Pass 1: classify every unmatched memory against its person's facts.
    ///
    /// Persons run concurrently (bounded); memories within one person run
    /// sequentially. Output preserves person and memory order.
    #[tracing::instrument(name = "first_pass", skip(self, persons, progress), fields(persons = persons.len()))]
    pub async fn first_pass<P: ProgressSink>(
        &self,
        persons: Vec<PersonMemories>,
        progress: &P,
    ) -> Result<FirstPassOutcome, MatchError> {
        let total: usize = persons.iter().map(|p| p.extracted_memories.len()).sum();
        progress.pass_one_started(total);

        let per_person: Vec<PersonOutcome> = stream::iter(
            persons
                .into_iter()
                .map(|person| self.match_person(person, progress)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;

        let mut outcome = FirstPassOutcome {
            memories: Vec::with_capacity(per_person.len()),
            matched_fact_ids: HashSet::new(),
            stats: FirstPassStats::default(),
        };
        for person in per_person {
            outcome.matched_fact_ids.extend(person.matched_fact_ids);
            outcome.stats.passed_through += person.stats.passed_through;
            outcome.stats.matched += person.stats.matched;
            outcome.stats.unmatched += person.stats.unmatched;
            outcome.stats.skipped += person.stats.skipped;
            outcome.memories.push(person.memories);
        }
        Ok(outcome)
    }

    async fn match_person<P: ProgressSink>(
        &self,
        person: PersonMemories,
        progress: &P,
    ) -> Result<PersonOutcome, MatchError> {
        let facts = self.facts.facts_for(person.person_id)?;

        let mut outcome = PersonOutcome {
            memories: PersonMemories {
                person_id: person.person_id,
                extracted_memories: Vec::with_capacity(person.extracted_memories.len()),
            },
            matched_fact_ids: HashSet::new(),
            stats: FirstPassStats::default(),
        };

        for memory in person.extracted_memories {
            let processed = self.match_one(memory, facts, &mut outcome).await?;
            outcome.memories.extracted_memories.push(processed);
            progress.memory_processed();
        }
        Ok(outcome)
    }

    async fn match_one(
        &self,
        mut memory: FlatMemory,
        facts: &[Fact],
        outcome: &mut PersonOutcome,
    ) -> Result<FlatMemory, MatchError> {
        // Already matched: record the claim and pass through unchanged.
        // Re-running matching on matched data is a no-op for these records.
        if memory.is_matched() {
            dedup_in_place(&mut memory.id);
            outcome.matched_fact_ids.extend(memory.id.iter().copied());
            outcome.stats.passed_through += 1;
            return Ok(memory);
        }

        match self.classifier.match_memory(&memory.content, facts).await {
            Ok(FactVerdict::Matched(id)) => {
                if !is_valid_id(id) || !facts.iter().any(|f| f.id == id) {
                    tracing::warn!(
                        fact_id = id,
                        memory = %memory.content,
                        "classifier named a fact id outside the candidate set; skipping memory"
                    );
                    outcome.stats.skipped += 1;
                } else {
                    memory.push_unique(id);
                    outcome.matched_fact_ids.insert(id);
                    outcome.stats.matched += 1;
                }
            }
            Ok(FactVerdict::NoMatch) => {
                outcome.stats.unmatched += 1;
            }
            Err(ClassifierError::Protocol(reason)) => {
                tracing::warn!(
                    memory = %memory.content,
                    %reason,
                    "classifier protocol violation; skipping memory"
                );
                outcome.stats.skipped += 1;
            }
            Err(err @ ClassifierError::Transient(_)) => return Err(err.into()),
        }
        Ok(memory)
    }

    /// Pass 2: offer each residual unmatched fact to the full memory list.
    ///
    /// The residual is computed globally over every person present in the
    /// dataset, so this must only run after all of pass 1 has finished.
    /// Appends are serialized; the same fact is never appended twice to one
    /// memory even if the classifier proposes it redundantly.
    #[tracing::instrument(name = "second_pass", skip(self, first, progress))]
    pub async fn second_pass<P: ProgressSink>(
        &self,
        first: &mut FirstPassOutcome,
        progress: &P,
    ) -> Result<SecondPassStats, MatchError> {
        let present: HashSet<i64> = first.memories.iter().map(|p| p.person_id).collect();
        let residual: Vec<Fact> = self
            .facts
            .persons()
            .iter()
            .filter(|p| present.contains(&p.person_id))
            .flat_map(|p| p.facts.iter())
            .filter(|f| !first.matched_fact_ids.contains(&f.id))
            .cloned()
            .collect();

        let mut stats = SecondPassStats {
            residual_facts: residual.len(),
            ..SecondPassStats::default()
        };
        progress.pass_two_started(residual.len());

        for fact in &residual {
            // Candidates reflect appends from earlier residual facts.
            let candidates: Vec<FlatMemory> = first
                .memories
                .iter()
                .flat_map(|p| p.extracted_memories.iter().cloned())
                .collect();

            match self.classifier.absorb_fact(fact, &candidates).await {
                Ok(memory_ids) if !memory_ids.is_empty() => {
                    let mut appended = false;
                    for person in &mut first.memories {
                        for memory in &mut person.extracted_memories {
                            let hit = memory.id.iter().any(|id| memory_ids.contains(id));
                            if hit && memory.push_unique(fact.id) {
                                stats.absorbed += 1;
                                appended = true;
                            }
                        }
                    }
                    if appended {
                        first.matched_fact_ids.insert(fact.id);
                    }
                }
                Ok(_) => {}
                Err(ClassifierError::Protocol(reason)) => {
                    tracing::warn!(
                        fact_id = fact.id,
                        %reason,
                        "classifier protocol violation; skipping fact"
                    );
                    stats.skipped += 1;
                }
                Err(err @ ClassifierError::Transient(_)) => return Err(err.into()),
            }
            progress.fact_processed();
        }
        Ok(stats)
    }
}

struct PersonOutcome {
    memories: PersonMemories,
    matched_fact_ids: HashSet<i64>,
    stats: FirstPassStats,
}

/// Drop repeated IDs while keeping first-seen order.
fn dedup_in_place(ids: &mut Vec<i64>) {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.retain(|id| seen.insert(*id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use recallbench_types::fact::PersonFacts;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Classifier driven by lookup tables; counts calls so tests can assert
    /// short-circuiting behavior.
    #[derive(Default)]
    struct ScriptedClassifier {
        memory_verdicts: HashMap<String, Result<FactVerdict, String>>,
        fact_absorptions: HashMap<i64, Vec<i64>>,
        memory_calls: AtomicUsize,
        fact_calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        fn verdict(mut self, memory: &str, verdict: FactVerdict) -> Self {
            self.memory_verdicts
                .insert(memory.to_string(), Ok(verdict));
            self
        }

        fn protocol_violation(mut self, memory: &str, reason: &str) -> Self {
            self.memory_verdicts
                .insert(memory.to_string(), Err(reason.to_string()));
            self
        }

        fn absorption(mut self, fact_id: i64, memory_ids: Vec<i64>) -> Self {
            self.fact_absorptions.insert(fact_id, memory_ids);
            self
        }
    }

    impl MatchClassifier for ScriptedClassifier {
        async fn match_memory(
            &self,
            memory: &str,
            _facts: &[Fact],
        ) -> Result<FactVerdict, ClassifierError> {
            self.memory_calls.fetch_add(1, Ordering::SeqCst);
            match self.memory_verdicts.get(memory) {
                Some(Ok(verdict)) => Ok(*verdict),
                Some(Err(reason)) => Err(ClassifierError::Protocol(reason.clone())),
                None => Ok(FactVerdict::NoMatch),
            }
        }

        async fn absorb_fact(
            &self,
            fact: &Fact,
            _memories: &[FlatMemory],
        ) -> Result<Vec<i64>, ClassifierError> {
            self.fact_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.fact_absorptions.get(&fact.id).cloned().unwrap_or_default())
        }
    }

    fn store(facts: Vec<(i64, Vec<(i64, &str)>)>) -> FactStore {
        FactStore::new(
            facts
                .into_iter()
                .map(|(person_id, facts)| PersonFacts {
                    person_id,
                    facts: facts
                        .into_iter()
                        .map(|(id, content)| Fact {
                            id,
                            content: content.to_string(),
                        })
                        .collect(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn flat(person_id: i64, memories: Vec<(&str, Vec<i64>)>) -> PersonMemories {
        PersonMemories {
            person_id,
            extracted_memories: memories
                .into_iter()
                .map(|(content, id)| FlatMemory {
                    id,
                    content: content.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_direct_match_claims_fact() {
        let facts = store(vec![(1, vec![(1, "Lives in Seattle")])]);
        let classifier = ScriptedClassifier::default()
            .verdict("Bob<user> lives in Seattle<city>", FactVerdict::Matched(1));
        let engine = MatchingEngine::new(&classifier, &facts, 2);

        let mut outcome = engine
            .first_pass(
                vec![flat(1, vec![("Bob<user> lives in Seattle<city>", vec![])])],
                &NoProgress,
            )
            .await
            .unwrap();

        assert_eq!(outcome.memories[0].extracted_memories[0].id, vec![1]);
        assert!(outcome.matched_fact_ids.contains(&1));
        assert_eq!(outcome.stats.matched, 1);

        // Second pass finds zero residual facts.
        let stats = engine.second_pass(&mut outcome, &NoProgress).await.unwrap();
        assert_eq!(stats.residual_facts, 0);
        assert_eq!(classifier.fact_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_match_leaves_memory_unmatched() {
        let facts = store(vec![(1, vec![(1, "Lives in Seattle")])]);
        let classifier = ScriptedClassifier::default();
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let outcome = engine
            .first_pass(vec![flat(1, vec![("enjoys hiking", vec![])])], &NoProgress)
            .await
            .unwrap();

        assert!(outcome.memories[0].extracted_memories[0].id.is_empty());
        assert_eq!(outcome.stats.unmatched, 1);
    }

    #[tokio::test]
    async fn test_matched_memories_pass_through_without_classifier_calls() {
        let facts = store(vec![(1, vec![(1, "a"), (2, "b")])]);
        let classifier = ScriptedClassifier::default();
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let persons = vec![flat(1, vec![("m1", vec![1]), ("m2", vec![2])])];
        let mut outcome = engine.first_pass(persons.clone(), &NoProgress).await.unwrap();
        assert_eq!(classifier.memory_calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.stats.passed_through, 2);
        assert_eq!(outcome.memories, persons);

        // Fully matched dataset: pass 2 is a no-op too.
        let stats = engine.second_pass(&mut outcome, &NoProgress).await.unwrap();
        assert_eq!(stats.residual_facts, 0);

        // Idempotence: a second full run produces identical ID lists.
        let rerun = engine.first_pass(persons.clone(), &NoProgress).await.unwrap();
        assert_eq!(rerun.memories, persons);
    }

    #[tokio::test]
    async fn test_pass_through_dedups_preexisting_ids() {
        let facts = store(vec![(1, vec![(1, "a")])]);
        let classifier = ScriptedClassifier::default();
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let outcome = engine
            .first_pass(vec![flat(1, vec![("m", vec![1, 1, 2])])], &NoProgress)
            .await
            .unwrap();
        assert_eq!(outcome.memories[0].extracted_memories[0].id, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_id_outside_candidate_set_is_skipped() {
        let facts = store(vec![(1, vec![(1, "a")])]);
        let classifier =
            ScriptedClassifier::default().verdict("m", FactVerdict::Matched(99));
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let outcome = engine
            .first_pass(vec![flat(1, vec![("m", vec![])])], &NoProgress)
            .await
            .unwrap();
        assert!(outcome.memories[0].extracted_memories[0].id.is_empty());
        assert_eq!(outcome.stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_protocol_violation_skips_item_and_continues() {
        let facts = store(vec![(1, vec![(1, "a"), (2, "b")])]);
        let classifier = ScriptedClassifier::default()
            .protocol_violation("bad", "returned prose")
            .verdict("good", FactVerdict::Matched(2));
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let outcome = engine
            .first_pass(
                vec![flat(1, vec![("bad", vec![]), ("good", vec![])])],
                &NoProgress,
            )
            .await
            .unwrap();
        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.memories[0].extracted_memories[1].id, vec![2]);
    }

    #[tokio::test]
    async fn test_transient_error_propagates() {
        struct FailingClassifier;
        impl MatchClassifier for FailingClassifier {
            async fn match_memory(
                &self,
                _memory: &str,
                _facts: &[Fact],
            ) -> Result<FactVerdict, ClassifierError> {
                Err(ClassifierError::Transient("connection reset".to_string()))
            }
            async fn absorb_fact(
                &self,
                _fact: &Fact,
                _memories: &[FlatMemory],
            ) -> Result<Vec<i64>, ClassifierError> {
                unreachable!()
            }
        }

        let facts = store(vec![(1, vec![(1, "a")])]);
        let engine = MatchingEngine::new(&FailingClassifier, &facts, 1);
        let err = engine
            .first_pass(vec![flat(1, vec![("m", vec![])])], &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::Classifier(ClassifierError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_second_pass_absorbs_residual_fact_once() {
        // Fact 2 unmatched after pass 1; classifier says memories holding
        // IDs 7 or 9 should absorb it.
        let facts = store(vec![(1, vec![(7, "a"), (9, "b"), (2, "Has a dog named Max")])]);
        let classifier = ScriptedClassifier::default().absorption(2, vec![7, 9]);
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let persons = vec![flat(
            1,
            vec![("m7", vec![7]), ("m9", vec![9]), ("other", vec![2040])],
        )];
        let mut outcome = engine.first_pass(persons, &NoProgress).await.unwrap();
        let stats = engine.second_pass(&mut outcome, &NoProgress).await.unwrap();

        assert_eq!(stats.residual_facts, 1);
        assert_eq!(stats.absorbed, 2);
        assert_eq!(outcome.memories[0].extracted_memories[0].id, vec![7, 2]);
        assert_eq!(outcome.memories[0].extracted_memories[1].id, vec![9, 2]);
        assert_eq!(outcome.memories[0].extracted_memories[2].id, vec![2040]);

        // Redundant proposal cannot double-append: rerunning pass 2 on the
        // now-covered fact set is a no-op.
        let again = engine.second_pass(&mut outcome, &NoProgress).await.unwrap();
        assert_eq!(again.residual_facts, 0);
        assert_eq!(outcome.memories[0].extracted_memories[0].id, vec![7, 2]);
    }

    #[tokio::test]
    async fn test_second_pass_only_covers_persons_present() {
        // Person 2 exists in ground truth but not in the memories file; its
        // facts must not enter the residual.
        let facts = store(vec![(1, vec![(1, "a")]), (2, vec![(5, "x")])]);
        let classifier = ScriptedClassifier::default();
        let engine = MatchingEngine::new(&classifier, &facts, 1);

        let mut outcome = engine
            .first_pass(vec![flat(1, vec![("m", vec![1])])], &NoProgress)
            .await
            .unwrap();
        let stats = engine.second_pass(&mut outcome, &NoProgress).await.unwrap();
        assert_eq!(stats.residual_facts, 0);
    }
}
