//! Infrastructure implementations for Recallbench.
//!
//! Concrete backends for the port traits defined in `recallbench-core`:
//! an OpenAI-compatible chat classifier, a fastembed local embedder, and a
//! JSON-on-disk dataset store, plus the `config.toml` loader.

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod llm;
