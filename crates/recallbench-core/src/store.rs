//! DatasetStore trait definition.
//!
//! The persistence boundary for ground truth, memories files, and quiz
//! artifacts. The core never touches the filesystem directly; the JSON
//! implementation lives in recallbench-infra.

use std::path::{Path, PathBuf};

use recallbench_types::error::StoreError;
use recallbench_types::fact::PersonFacts;
use recallbench_types::memory::MemoryDataset;
use recallbench_types::quiz::{CompletedPersonQuiz, PersonQuiz};

/// Trait for dataset persistence.
///
/// `load_dataset`/`save_dataset` are shape-preserving: a file loaded as
/// structured is written back structured, byte-layout aside. Implementations
/// decide where artifacts live; callers only hand around the paths these
/// methods return.
pub trait DatasetStore: Send + Sync {
    /// Load the ground-truth fact lists for every person.
    fn load_people(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<PersonFacts>, StoreError>> + Send;

    /// Candidate memories files, newest first.
    fn list_memories_files(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<PathBuf>, StoreError>> + Send;

    /// Load a memories file, detecting its wire shape once.
    fn load_dataset(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<MemoryDataset, StoreError>> + Send;

    /// Persist a dataset in its own wire shape.
    fn save_dataset(
        &self,
        path: &Path,
        dataset: &MemoryDataset,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load the ground-truth quiz.
    fn load_quiz(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<PersonQuiz>, StoreError>> + Send;

    /// Persist completed quiz results; returns the path written.
    fn save_completed_quiz(
        &self,
        completed: &[CompletedPersonQuiz],
    ) -> impl std::future::Future<Output = Result<PathBuf, StoreError>> + Send;

    /// Load a previously completed quiz for reporting.
    fn load_completed_quiz(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Vec<CompletedPersonQuiz>, StoreError>> + Send;
}
