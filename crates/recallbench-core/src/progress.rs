//! Progress observation for long classifier-bound passes.
//!
//! The engine reports per-item progress through this trait so the CLI can
//! drive progress bars without the core depending on any terminal crate.

/// Observer for matching-pass progress. All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    fn pass_one_started(&self, _total_memories: usize) {}
    fn memory_processed(&self) {}
    fn pass_two_started(&self, _residual_facts: usize) {}
    fn fact_processed(&self) {}
}

/// Sink that ignores all progress events.
pub struct NoProgress;

impl ProgressSink for NoProgress {}
