//! End-to-end matching pipeline.
//!
//! Wires the pieces into the full run: load ground truth and memories,
//! normalize structured input to the flat working form, run both matching
//! passes, allocate IDs for whatever stayed unmatched, and write the result
//! back in the input's own wire shape. Pass-1 state is persisted before pass
//! 2 starts so an interrupted run can resume without repeating classifier
//! calls; rerunning on the persisted file passes matched memories through
//! untouched.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use recallbench_types::error::{AllocError, FormatError, StoreError};
use recallbench_types::memory::{MemoryDataset, MemoryFormat, PersonEntities, PersonMemories};

use crate::alloc::IdAllocator;
use crate::classifier::MatchClassifier;
use crate::convert;
use crate::facts::FactStore;
use crate::matcher::{MatchError, MatchingEngine};
use crate::progress::ProgressSink;
use crate::store::DatasetStore;

/// Any failure that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a completed run did, for operator-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub format: MemoryFormat,
    pub persons: usize,
    pub memories: usize,
    /// Memories that already carried IDs when the run started.
    pub passed_through: usize,
    pub matched_first_pass: usize,
    pub residual_facts: usize,
    pub absorbed_second_pass: usize,
    /// Memories that left both passes unmatched and received a fresh ID.
    pub allocated: usize,
    /// Items dropped after classifier protocol violations, both passes.
    pub skipped: usize,
}

/// Run the full matching pipeline over the memories file at `path`,
/// persisting results back to the same path.
#[tracing::instrument(skip(store, classifier, progress), fields(path = %path.display()))]
pub async fn run_matching<S, C, P>(
    store: &S,
    classifier: &C,
    path: &Path,
    concurrency: usize,
    progress: &P,
) -> Result<MatchSummary, PipelineError>
where
    S: DatasetStore,
    C: MatchClassifier,
    P: ProgressSink,
{
    let facts = FactStore::new(store.load_people().await?)?;
    let dataset = store.load_dataset(path).await?;
    let format = dataset.format();
    tracing::info!(%format, persons = dataset.person_ids().len(), "loaded memories dataset");

    // Structured input keeps its skeleton around for the restore step.
    let (flat, skeleton): (Vec<PersonMemories>, Option<Vec<PersonEntities>>) = match dataset {
        MemoryDataset::Flat(persons) => (persons, None),
        MemoryDataset::Structured(persons) => (convert::to_flat(&persons)?, Some(persons)),
    };

    let engine = MatchingEngine::new(classifier, &facts, concurrency);
    let mut outcome = engine.first_pass(flat, progress).await?;
    tracing::info!(
        matched = outcome.stats.matched,
        unmatched = outcome.stats.unmatched,
        skipped = outcome.stats.skipped,
        "first pass complete"
    );

    // Checkpoint between passes. A rerun from this file skips straight to
    // the still-unmatched remainder.
    store
        .save_dataset(path, &restore(&outcome.memories, skeleton.as_deref())?)
        .await?;

    let second = engine.second_pass(&mut outcome, progress).await?;
    tracing::info!(
        residual = second.residual_facts,
        absorbed = second.absorbed,
        skipped = second.skipped,
        "second pass complete"
    );

    let allocated = allocate_unmatched(&facts, &mut outcome.memories)?;

    let final_dataset = restore(&outcome.memories, skeleton.as_deref())?;
    store.save_dataset(path, &final_dataset).await?;

    Ok(MatchSummary {
        format,
        persons: outcome.memories.len(),
        memories: outcome
            .memories
            .iter()
            .map(|p| p.extracted_memories.len())
            .sum(),
        passed_through: outcome.stats.passed_through,
        matched_first_pass: outcome.stats.matched,
        residual_facts: second.residual_facts,
        absorbed_second_pass: second.absorbed,
        allocated,
        skipped: outcome.stats.skipped + second.skipped,
    })
}

/// Give every still-unmatched memory a fresh ID from the reserved band.
///
/// The avoid-set seeds with every ground-truth fact ID and every ID already
/// sitting on a memory, so an allocated ID can collide with neither.
fn allocate_unmatched(
    facts: &FactStore,
    persons: &mut [PersonMemories],
) -> Result<usize, AllocError> {
    let allocator = IdAllocator::default();
    let mut existing: HashSet<i64> = facts.all_ids();
    existing.extend(
        persons
            .iter()
            .flat_map(|p| p.extracted_memories.iter())
            .flat_map(|m| m.id.iter().copied()),
    );

    let mut allocated = 0;
    for person in persons.iter_mut() {
        for memory in &mut person.extracted_memories {
            if !memory.is_matched() {
                memory.push_unique(allocator.allocate(&mut existing)?);
                allocated += 1;
            }
        }
    }
    Ok(allocated)
}

fn restore(
    flat: &[PersonMemories],
    skeleton: Option<&[PersonEntities]>,
) -> Result<MemoryDataset, FormatError> {
    match skeleton {
        Some(skeleton) => Ok(MemoryDataset::Structured(convert::to_structured(
            flat, skeleton,
        )?)),
        None => Ok(MemoryDataset::Flat(flat.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::MEMORY_ID_BAND;
    use crate::classifier::FactVerdict;
    use crate::progress::NoProgress;
    use indexmap::IndexMap;
    use recallbench_types::error::ClassifierError;
    use recallbench_types::fact::{Fact, PersonFacts};
    use recallbench_types::memory::{AttributeItem, Entity, FlatMemory};
    use recallbench_types::quiz::{CompletedPersonQuiz, PersonQuiz};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory store capturing every save for inspection.
    struct MemStore {
        people: Vec<PersonFacts>,
        dataset: Mutex<MemoryDataset>,
        saves: Mutex<Vec<MemoryDataset>>,
    }

    impl MemStore {
        fn new(people: Vec<PersonFacts>, dataset: MemoryDataset) -> Self {
            Self {
                people,
                dataset: Mutex::new(dataset),
                saves: Mutex::new(Vec::new()),
            }
        }
    }

    impl DatasetStore for MemStore {
        async fn load_people(&self) -> Result<Vec<PersonFacts>, StoreError> {
            Ok(self.people.clone())
        }

        async fn list_memories_files(&self) -> Result<Vec<PathBuf>, StoreError> {
            Ok(vec![PathBuf::from("memories.json")])
        }

        async fn load_dataset(&self, _path: &Path) -> Result<MemoryDataset, StoreError> {
            Ok(self.dataset.lock().unwrap().clone())
        }

        async fn save_dataset(
            &self,
            _path: &Path,
            dataset: &MemoryDataset,
        ) -> Result<(), StoreError> {
            *self.dataset.lock().unwrap() = dataset.clone();
            self.saves.lock().unwrap().push(dataset.clone());
            Ok(())
        }

        async fn load_quiz(&self) -> Result<Vec<PersonQuiz>, StoreError> {
            Ok(Vec::new())
        }

        async fn save_completed_quiz(
            &self,
            _completed: &[CompletedPersonQuiz],
        ) -> Result<PathBuf, StoreError> {
            Ok(PathBuf::from("completed.json"))
        }

        async fn load_completed_quiz(
            &self,
            _path: &Path,
        ) -> Result<Vec<CompletedPersonQuiz>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Classifier that matches on exact fact-content containment and never
    /// absorbs residual facts.
    struct ContainsClassifier;

    impl MatchClassifier for ContainsClassifier {
        async fn match_memory(
            &self,
            memory: &str,
            facts: &[Fact],
        ) -> Result<FactVerdict, ClassifierError> {
            Ok(facts
                .iter()
                .find(|f| memory.contains(&f.content))
                .map(|f| FactVerdict::Matched(f.id))
                .unwrap_or(FactVerdict::NoMatch))
        }

        async fn absorb_fact(
            &self,
            _fact: &Fact,
            _memories: &[FlatMemory],
        ) -> Result<Vec<i64>, ClassifierError> {
            Ok(Vec::new())
        }
    }

    fn people() -> Vec<PersonFacts> {
        vec![PersonFacts {
            person_id: 1,
            facts: vec![
                Fact {
                    id: 1,
                    content: "Lives in Seattle".to_string(),
                },
                Fact {
                    id: 2,
                    content: "Has a dog named Max".to_string(),
                },
            ],
        }]
    }

    #[tokio::test]
    async fn test_flat_run_matches_and_allocates() {
        let dataset = MemoryDataset::Flat(vec![PersonMemories {
            person_id: 1,
            extracted_memories: vec![
                FlatMemory::new("Bob Lives in Seattle with family"),
                FlatMemory::new("enjoys hiking"),
            ],
        }]);
        let store = MemStore::new(people(), dataset);

        let summary = run_matching(
            &store,
            &ContainsClassifier,
            Path::new("memories.json"),
            2,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.format, MemoryFormat::Flat);
        assert_eq!(summary.matched_first_pass, 1);
        assert_eq!(summary.allocated, 1);
        // Fact 2 was never matched or absorbed.
        assert_eq!(summary.residual_facts, 1);

        let MemoryDataset::Flat(persons) = store.dataset.lock().unwrap().clone() else {
            panic!("shape changed");
        };
        assert_eq!(persons[0].extracted_memories[0].id, vec![1]);
        let allocated_id = persons[0].extracted_memories[1].id[0];
        assert!(MEMORY_ID_BAND.contains(&allocated_id));

        // Intermediate checkpoint plus final write.
        assert_eq!(store.saves.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_structured_run_preserves_shape() {
        let mut profile = IndexMap::new();
        profile.insert(
            "location".to_string(),
            vec![AttributeItem {
                content: "Lives in Seattle".to_string(),
                mem_id: vec![],
            }],
        );
        let dataset = MemoryDataset::Structured(vec![PersonEntities {
            person_id: 1,
            extracted_memories: vec![Entity {
                id: 25432,
                description: "This is the user".to_string(),
                profile,
                connections: vec![],
            }],
        }]);
        let store = MemStore::new(people(), dataset);

        let summary = run_matching(
            &store,
            &ContainsClassifier,
            Path::new("memories.json"),
            1,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.format, MemoryFormat::Structured);
        assert_eq!(summary.matched_first_pass, 1);

        let MemoryDataset::Structured(persons) = store.dataset.lock().unwrap().clone() else {
            panic!("shape changed");
        };
        assert_eq!(persons[0].extracted_memories[0].description, "This is the user");
        assert_eq!(
            persons[0].extracted_memories[0].profile["location"][0].mem_id,
            vec![1]
        );
    }

    #[tokio::test]
    async fn test_rerun_on_matched_output_is_stable() {
        let dataset = MemoryDataset::Flat(vec![PersonMemories {
            person_id: 1,
            extracted_memories: vec![FlatMemory::new("Bob Lives in Seattle with family")],
        }]);
        let store = MemStore::new(people(), dataset);
        let path = Path::new("memories.json");

        run_matching(&store, &ContainsClassifier, path, 1, &NoProgress)
            .await
            .unwrap();
        let after_first = store.dataset.lock().unwrap().clone();

        let summary = run_matching(&store, &ContainsClassifier, path, 1, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.passed_through, 1);
        assert_eq!(summary.matched_first_pass, 0);
        assert_eq!(summary.allocated, 0);
        assert_eq!(*store.dataset.lock().unwrap(), after_first);
    }
}
