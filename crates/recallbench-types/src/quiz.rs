//! Memory-quiz types.
//!
//! The quiz is the downstream consumer of the matching pipeline: each
//! question names the fact IDs a retrieval system should surface, and the
//! evaluator scores predicted IDs against them.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Question difficulty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("invalid difficulty: '{other}'")),
        }
    }
}

/// One ground-truth quiz question.
///
/// ID fields tolerate the zero-padded string shapes older quiz files used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(deserialize_with = "crate::memory::id_list::deserialize_scalar")]
    pub id: i64,
    pub question: String,
    #[serde(default, deserialize_with = "crate::memory::id_list::deserialize")]
    pub right_memory_ids: Vec<i64>,
    pub difficulty: Difficulty,
}

/// All quiz questions for one person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonQuiz {
    pub person_id: i64,
    pub questions: Vec<QuizQuestion>,
}

/// The evaluator's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub question_id: i64,
    pub question: String,
    pub difficulty: Difficulty,
    pub predicted_memory_ids: Vec<i64>,
    pub actual_memory_ids: Vec<i64>,
    pub predicted_texts: Vec<String>,
    /// Fraction of required IDs that were predicted.
    pub accuracy: f64,
}

/// A completed quiz for one person, as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedPersonQuiz {
    pub person_id: i64,
    pub questions: Vec<QuizResult>,
}

/// Precision/recall/F1 for one question, or an average over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl QuestionMetrics {
    /// Compute metrics from predicted vs. required ID sets.
    ///
    /// Empty predicted or actual sets yield zero for the affected metric
    /// rather than dividing by zero.
    pub fn from_ids(predicted: &[i64], actual: &[i64]) -> Self {
        use std::collections::HashSet;
        let predicted_set: HashSet<i64> = predicted.iter().copied().collect();
        let actual_set: HashSet<i64> = actual.iter().copied().collect();
        let true_positives = predicted_set.intersection(&actual_set).count() as f64;

        let precision = if predicted_set.is_empty() {
            0.0
        } else {
            true_positives / predicted_set.len() as f64
        };
        let recall = if actual_set.is_empty() {
            0.0
        } else {
            true_positives / actual_set.len() as f64
        };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self { precision, recall, f1 }
    }
}

/// Averaged metrics for one person (or aggregated across persons).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsReport {
    pub overall: QuestionMetrics,
    pub by_difficulty: BTreeMap<Difficulty, QuestionMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_roundtrip() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let s = d.to_string();
            let parsed: Difficulty = s.parse().unwrap();
            assert_eq!(d, parsed);
        }
    }

    #[test]
    fn test_difficulty_serde() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: Difficulty = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Difficulty::Medium);
    }

    #[test]
    fn test_metrics_exact_match() {
        let m = QuestionMetrics::from_ids(&[1, 2], &[1, 2]);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn test_metrics_partial_overlap() {
        // predicted {1,2,3,4}, actual {3,4,5}: tp=2
        let m = QuestionMetrics::from_ids(&[1, 2, 3, 4], &[3, 4, 5]);
        assert!((m.precision - 0.5).abs() < 1e-9);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-9);
        let expected_f1 = 2.0 * 0.5 * (2.0 / 3.0) / (0.5 + 2.0 / 3.0);
        assert!((m.f1 - expected_f1).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_no_predictions() {
        let m = QuestionMetrics::from_ids(&[], &[1]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_metrics_duplicate_predictions_count_once() {
        let m = QuestionMetrics::from_ids(&[1, 1, 1], &[1]);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
    }

    #[test]
    fn test_quiz_question_deserialize() {
        let json = r#"{
            "id": 1,
            "question": "Where does Bob live?",
            "right_memory_ids": [1, 2],
            "difficulty": "easy"
        }"#;
        let q: QuizQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(q.difficulty, Difficulty::Easy);
        assert_eq!(q.right_memory_ids, vec![1, 2]);
    }

    #[test]
    fn test_quiz_question_normalizes_string_ids() {
        let json = r#"{
            "id": "007",
            "question": "q",
            "right_memory_ids": ["01234", 5],
            "difficulty": "hard"
        }"#;
        let q: QuizQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(q.id, 7);
        assert_eq!(q.right_memory_ids, vec![1234, 5]);
    }
}
