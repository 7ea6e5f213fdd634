//! Shared domain types for Recallbench.
//!
//! This crate contains the core domain types used across the Recallbench
//! pipeline: ground-truth facts, extracted memories in both flat and
//! structured form, quiz types, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, indexmap,
//! thiserror.

pub mod config;
pub mod error;
pub mod fact;
pub mod memory;
pub mod quiz;
