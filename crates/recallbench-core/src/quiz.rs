//! Quiz scoring over matched memories.
//!
//! The quiz probes whether the matched memory set supports retrieval: each
//! question is embedded alongside every memory of the person, the most
//! similar memories are selected, and the fact IDs those memories carry are
//! scored against the question's required IDs.
//!
//! Scoring runs on fully matched datasets only. An unmatched memory has no
//! IDs to contribute, so it would silently depress recall; the evaluator
//! rejects such datasets up front instead.

use std::collections::BTreeMap;

use thiserror::Error;

use recallbench_types::error::{EmbedError, StoreError};
use recallbench_types::memory::PersonMemories;
use recallbench_types::quiz::{
    CompletedPersonQuiz, Difficulty, MetricsReport, PersonQuiz, QuestionMetrics, QuizResult,
};

use crate::embedder::Embedder;
use crate::facts::FactStore;

/// Memories kept per question when any clear the similarity floor.
pub const TOP_K: usize = 5;

/// Similarity floor for the primary selection.
pub const MIN_SIMILARITY: f32 = 0.2;

/// Memories kept when nothing clears the floor.
pub const FALLBACK_TOP_K: usize = 3;

/// How many questions the worst-performers listing shows.
pub const WORST_COUNT: usize = 10;

#[derive(Debug, Error)]
pub enum QuizError {
    /// The dataset still contains unmatched memories; run matching first.
    #[error("person {person_id} has {unmatched} unmatched memories; dataset is not fully matched")]
    UnmatchedMemories { person_id: i64, unmatched: usize },

    /// A question names an ID that exists neither in the person's ground
    /// truth nor on any of their memories, so recall against it could never
    /// reach 1.0.
    #[error("question {question_id} for person {person_id} references unknown fact id {id}")]
    UnknownFactId {
        person_id: i64,
        question_id: i64,
        id: i64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Scores quiz questions against one matched memories dataset.
pub struct QuizEvaluator<'a, E> {
    embedder: &'a E,
    facts: &'a FactStore,
}

impl<'a, E: Embedder> QuizEvaluator<'a, E> {
    pub fn new(embedder: &'a E, facts: &'a FactStore) -> Self {
        Self { embedder, facts }
    }

    /// Reject datasets that are not ready to score.
    pub fn validate(
        &self,
        memories: &[PersonMemories],
        quiz: &[PersonQuiz],
    ) -> Result<(), QuizError> {
        for person in memories {
            let unmatched = person
                .extracted_memories
                .iter()
                .filter(|m| !m.is_matched())
                .count();
            if unmatched > 0 {
                return Err(QuizError::UnmatchedMemories {
                    person_id: person.person_id,
                    unmatched,
                });
            }
        }

        for person in quiz {
            let facts = self.facts.facts_for(person.person_id)?;
            // Allocated IDs live only on the memories, not in ground truth.
            let claimed: std::collections::HashSet<i64> = memories
                .iter()
                .filter(|m| m.person_id == person.person_id)
                .flat_map(|m| m.extracted_memories.iter())
                .flat_map(|m| m.id.iter().copied())
                .collect();
            for question in &person.questions {
                for &id in &question.right_memory_ids {
                    if !facts.iter().any(|f| f.id == id) && !claimed.contains(&id) {
                        return Err(QuizError::UnknownFactId {
                            person_id: person.person_id,
                            question_id: question.id,
                            id,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Score every question of one person against their memories.
    ///
    /// Memories and questions are each embedded in a single batch call.
    #[tracing::instrument(skip(self, memories, quiz), fields(person_id = quiz.person_id))]
    pub async fn evaluate_person(
        &self,
        memories: &PersonMemories,
        quiz: &PersonQuiz,
    ) -> Result<CompletedPersonQuiz, QuizError> {
        let memory_texts: Vec<String> = memories
            .extracted_memories
            .iter()
            .map(|m| m.content.clone())
            .collect();
        let question_texts: Vec<String> =
            quiz.questions.iter().map(|q| q.question.clone()).collect();

        let memory_vectors = self.embedder.embed(&memory_texts).await?;
        let question_vectors = self.embedder.embed(&question_texts).await?;

        let mut results = Vec::with_capacity(quiz.questions.len());
        for (question, question_vector) in quiz.questions.iter().zip(&question_vectors) {
            let selected = select_memories(question_vector, &memory_vectors);

            let mut predicted_memory_ids = Vec::new();
            let mut predicted_texts = Vec::new();
            for &index in &selected {
                let memory = &memories.extracted_memories[index];
                for &id in &memory.id {
                    if !predicted_memory_ids.contains(&id) {
                        predicted_memory_ids.push(id);
                    }
                }
                predicted_texts.push(memory.content.clone());
            }

            let metrics =
                QuestionMetrics::from_ids(&predicted_memory_ids, &question.right_memory_ids);
            results.push(QuizResult {
                question_id: question.id,
                question: question.question.clone(),
                difficulty: question.difficulty,
                predicted_memory_ids,
                actual_memory_ids: question.right_memory_ids.clone(),
                predicted_texts,
                accuracy: metrics.recall,
            });
        }

        Ok(CompletedPersonQuiz {
            person_id: quiz.person_id,
            questions: results,
        })
    }
}

/// Indices of the memories a question retrieves, best first.
///
/// Primary selection: up to [`TOP_K`] memories at or above the similarity
/// floor. If none qualify the floor is waived and the best
/// [`FALLBACK_TOP_K`] are taken, so a question always retrieves something.
fn select_memories(question: &[f32], memories: &[Vec<f32>]) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = memories
        .iter()
        .enumerate()
        .map(|(i, m)| (i, cosine_similarity(question, m)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let above_floor: Vec<usize> = scored
        .iter()
        .filter(|(_, sim)| *sim >= MIN_SIMILARITY)
        .take(TOP_K)
        .map(|(i, _)| *i)
        .collect();
    if !above_floor.is_empty() {
        return above_floor;
    }
    scored.iter().take(FALLBACK_TOP_K).map(|(i, _)| *i).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Per-question metrics recomputed from a persisted result.
fn question_metrics(result: &QuizResult) -> QuestionMetrics {
    QuestionMetrics::from_ids(&result.predicted_memory_ids, &result.actual_memory_ids)
}

fn mean(metrics: &[QuestionMetrics]) -> QuestionMetrics {
    if metrics.is_empty() {
        return QuestionMetrics::default();
    }
    let n = metrics.len() as f64;
    QuestionMetrics {
        precision: metrics.iter().map(|m| m.precision).sum::<f64>() / n,
        recall: metrics.iter().map(|m| m.recall).sum::<f64>() / n,
        f1: metrics.iter().map(|m| m.f1).sum::<f64>() / n,
    }
}

/// Average metrics over one person's completed quiz.
pub fn person_report(completed: &CompletedPersonQuiz) -> MetricsReport {
    let all: Vec<QuestionMetrics> = completed.questions.iter().map(question_metrics).collect();

    let mut by_difficulty = BTreeMap::new();
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let bucket: Vec<QuestionMetrics> = completed
            .questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .map(question_metrics)
            .collect();
        if !bucket.is_empty() {
            by_difficulty.insert(difficulty, mean(&bucket));
        }
    }

    MetricsReport {
        overall: mean(&all),
        by_difficulty,
    }
}

/// Average per-person reports across persons.
///
/// Each difficulty bucket divides by the number of persons that actually
/// have questions at that difficulty, so a person without hard questions
/// does not drag the hard average down.
pub fn aggregate_reports(completed: &[CompletedPersonQuiz]) -> MetricsReport {
    let reports: Vec<MetricsReport> = completed.iter().map(person_report).collect();

    let overall: Vec<QuestionMetrics> = reports.iter().map(|r| r.overall).collect();

    let mut by_difficulty = BTreeMap::new();
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let bucket: Vec<QuestionMetrics> = reports
            .iter()
            .filter_map(|r| r.by_difficulty.get(&difficulty).copied())
            .collect();
        if !bucket.is_empty() {
            by_difficulty.insert(difficulty, mean(&bucket));
        }
    }

    MetricsReport {
        overall: mean(&overall),
        by_difficulty,
    }
}

/// One row of the worst-performers listing. Carries the full result so the
/// report can show predicted vs. actual answers.
#[derive(Debug, Clone)]
pub struct WorstQuestion {
    pub person_id: i64,
    pub result: QuizResult,
    pub metrics: QuestionMetrics,
}

/// Which metric the worst-performers listing orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorstBy {
    Recall,
    Precision,
}

/// The `count` lowest-scoring questions across all persons.
pub fn worst_questions(
    completed: &[CompletedPersonQuiz],
    by: WorstBy,
    count: usize,
) -> Vec<WorstQuestion> {
    let mut rows: Vec<WorstQuestion> = completed
        .iter()
        .flat_map(|person| {
            person.questions.iter().map(|q| WorstQuestion {
                person_id: person.person_id,
                result: q.clone(),
                metrics: question_metrics(q),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        let (x, y) = match by {
            WorstBy::Recall => (a.metrics.recall, b.metrics.recall),
            WorstBy::Precision => (a.metrics.precision, b.metrics.precision),
        };
        x.total_cmp(&y)
    });
    rows.truncate(count);
    rows
}
