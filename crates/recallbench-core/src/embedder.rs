//! Embedder trait for text-to-vector conversion.
//!
//! Defines the interface the quiz evaluator uses to embed questions and
//! memory texts for the flat cosine scan. Implementations (local ONNX
//! models, remote embedding APIs) live in recallbench-infra.

use recallbench_types::error::EmbedError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Embed one or more texts into vectors, one vector per input text.
    /// Batch embedding is supported so a person's whole memory list can be
    /// embedded in one call.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbedError>> + Send;

    /// The model name used for embeddings.
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
