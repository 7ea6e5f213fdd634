//! Configuration types for Recallbench.
//!
//! `AppConfig` represents the top-level `config.toml` in the data directory.
//! All fields have defaults, so a missing or partial file is never fatal.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Settings for the OpenAI-compatible classifier backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name sent with every chat completion request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key. The key itself never
    /// appears in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL; any OpenAI-compatible endpoint works.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
        }
    }
}

/// Settings for the matching passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// How many persons pass 1 classifies concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}
