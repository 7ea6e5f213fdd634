//! MatchClassifier trait definition.
//!
//! This is the boundary to the external LLM capability the matching engine
//! delegates semantic-equivalence judgments to. Uses RPITIT (native async fn
//! in traits, Rust 2024 edition). Implementations live in recallbench-infra.

use recallbench_types::error::ClassifierError;
use recallbench_types::fact::Fact;
use recallbench_types::memory::FlatMemory;

/// Outcome of a memory-seeks-fact classification.
///
/// A proper result variant rather than a parsed string sentinel: `NO_MATCH`
/// is a normal answer, not an error. Errors are reserved for true protocol
/// violations and transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactVerdict {
    /// The memory matches this fact ID from the candidate set.
    Matched(i64),
    /// No semantic correspondence found.
    NoMatch,
}

/// Trait for the external semantic-match classifier.
///
/// The two methods carry deliberately different thresholds: `match_memory`
/// asks for a near perfect match, `absorb_fact` for "very closely related"
/// near-duplicates. They are independent contracts and are tuned
/// independently.
pub trait MatchClassifier: Send + Sync {
    /// Pass 1: given a memory's text and the owning person's full fact
    /// list, name the single best-matching fact or report no match.
    fn match_memory(
        &self,
        memory: &str,
        facts: &[Fact],
    ) -> impl std::future::Future<Output = Result<FactVerdict, ClassifierError>> + Send;

    /// Pass 2: given a residual unmatched fact and every memory produced so
    /// far, name zero or more memory IDs that should additionally absorb
    /// this fact. One fact may attach to multiple memories.
    fn absorb_fact(
        &self,
        fact: &Fact,
        memories: &[FlatMemory],
    ) -> impl std::future::Future<Output = Result<Vec<i64>, ClassifierError>> + Send;
}
