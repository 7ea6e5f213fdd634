//! JSON-on-disk dataset store.
//!
//! Implements [`DatasetStore`] over the conventional data directory layout:
//!
//! ```text
//! {data_dir}/
//!   mock_people.json                      ground-truth facts
//!   memory_quiz.json                      quiz questions
//!   extracted_memories/*.json             memories files (flat or structured)
//!   tests/completed_memory_quiz_*.json    quiz results, one per run
//! ```
//!
//! Loads are shape-preserving: the wire format is detected once per file and
//! saves reproduce the same shape.

use std::path::{Path, PathBuf};

use recallbench_core::convert::detect_format;
use recallbench_core::store::DatasetStore;
use recallbench_types::error::StoreError;
use recallbench_types::fact::PersonFacts;
use recallbench_types::memory::{MemoryDataset, MemoryFormat};
use recallbench_types::quiz::{CompletedPersonQuiz, PersonQuiz};

const PEOPLE_FILE: &str = "mock_people.json";
const QUIZ_FILE: &str = "memory_quiz.json";
const MEMORIES_DIR: &str = "extracted_memories";
const RESULTS_DIR: &str = "tests";

/// Dataset store over a single data directory.
#[derive(Debug, Clone)]
pub struct JsonDatasetStore {
    data_dir: PathBuf,
}

impl JsonDatasetStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn memories_dir(&self) -> PathBuf {
        self.data_dir.join(MEMORIES_DIR)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

impl DatasetStore for JsonDatasetStore {
    async fn load_people(&self) -> Result<Vec<PersonFacts>, StoreError> {
        Self::read_json(&self.data_dir.join(PEOPLE_FILE)).await
    }

    async fn list_memories_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.memories_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoCandidates(dir.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let mut files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let modified = entry.metadata().await?.modified()?;
                files.push((path, modified));
            }
        }
        if files.is_empty() {
            return Err(StoreError::NoCandidates(dir.display().to_string()));
        }

        // Newest first; the most recent extraction is the usual pick.
        files.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }

    async fn load_dataset(&self, path: &Path) -> Result<MemoryDataset, StoreError> {
        let raw: serde_json::Value = Self::read_json(path).await?;
        let dataset = match detect_format(&raw) {
            MemoryFormat::Flat => MemoryDataset::Flat(serde_json::from_value(raw)?),
            MemoryFormat::Structured => MemoryDataset::Structured(serde_json::from_value(raw)?),
        };
        tracing::debug!(path = %path.display(), format = %dataset.format(), "loaded dataset");
        Ok(dataset)
    }

    async fn save_dataset(&self, path: &Path, dataset: &MemoryDataset) -> Result<(), StoreError> {
        match dataset {
            MemoryDataset::Flat(persons) => Self::write_json(path, persons).await,
            MemoryDataset::Structured(persons) => Self::write_json(path, persons).await,
        }
    }

    async fn load_quiz(&self) -> Result<Vec<PersonQuiz>, StoreError> {
        Self::read_json(&self.data_dir.join(QUIZ_FILE)).await
    }

    async fn save_completed_quiz(
        &self,
        completed: &[CompletedPersonQuiz],
    ) -> Result<PathBuf, StoreError> {
        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = self
            .data_dir
            .join(RESULTS_DIR)
            .join(format!("completed_memory_quiz_{date}.json"));
        Self::write_json(&path, &completed).await?;
        Ok(path)
    }

    async fn load_completed_quiz(
        &self,
        path: &Path,
    ) -> Result<Vec<CompletedPersonQuiz>, StoreError> {
        Self::read_json(path).await
    }
}
