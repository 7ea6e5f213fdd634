//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `recallbench-core` using fastembed's
//! BGESmallENV15 model (384 dimensions) with ONNX runtime inference.
//! Inference is CPU-bound, so batches run on the blocking thread pool.

use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use recallbench_core::embedder::Embedder;
use recallbench_types::error::EmbedError;

/// BGESmallENV15 embedding dimension.
pub const EMBEDDING_DIM: usize = 384;

const MODEL_NAME: &str = "BGESmallENV15";

/// Local embedder backed by fastembed's ONNX runtime.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Initialize the model, downloading weights on first use.
    pub fn new() -> Result<Self, EmbedError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(false),
        )
        .map_err(|err| EmbedError::Backend(err.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbedError::Backend("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|err| EmbedError::Backend(err.to_string()))
        })
        .await
        .map_err(|err| EmbedError::Backend(format!("embedding task panicked: {err}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}
