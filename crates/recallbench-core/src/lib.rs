//! Matching logic and port trait definitions for Recallbench.
//!
//! This crate defines the "ports" (classifier, embedder, dataset store
//! traits) that the infrastructure layer implements, plus the pure logic of
//! the pipeline: format conversion, the two-pass matching engine, ID
//! allocation, quiz scoring, and dataset diagnostics. It depends only on
//! `recallbench-types` -- never on `recallbench-infra` or any IO crate.

pub mod alloc;
pub mod check;
pub mod classifier;
pub mod convert;
pub mod embedder;
pub mod facts;
pub mod matcher;
pub mod pipeline;
pub mod progress;
pub mod quiz;
pub mod store;
