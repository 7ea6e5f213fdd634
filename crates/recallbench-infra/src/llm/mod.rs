//! OpenAI-compatible match classifier.
//!
//! Implements [`MatchClassifier`] over any OpenAI-compatible chat endpoint
//! via [`async_openai`]. The two passes use different prompts with different
//! strictness: pass 1 demands a near perfect match, pass 2 accepts very
//! closely related near-duplicates.
//!
//! Responses are parsed against a strict grammar (an ID, a comma-separated
//! ID list, `NO_MATCH`, or empty). Anything else is a protocol violation,
//! surfaced as such rather than coerced.

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_openai::Client;
use thiserror::Error;

use recallbench_core::classifier::{FactVerdict, MatchClassifier};
use recallbench_types::config::LlmConfig;
use recallbench_types::error::ClassifierError;
use recallbench_types::fact::Fact;
use recallbench_types::memory::FlatMemory;

/// Errors constructing a classifier, before any request is made.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Chat-completion classifier for any OpenAI-compatible endpoint.
///
/// Does NOT derive Debug: the API key lives inside the `async_openai`
/// client and must not leak through debug formatting.
pub struct OpenAiClassifier {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClassifier {
    pub fn new(config: &LlmConfig, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
        }
    }

    /// Build a classifier reading the API key from the environment variable
    /// the config names.
    pub fn from_env(config: &LlmConfig) -> Result<Self, SetupError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| SetupError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(config, &api_key))
    }

    async fn complete(&self, prompt: String) -> Result<String, ClassifierError> {
        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(prompt),
                    name: None,
                },
            )],
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|err| ClassifierError::Transient(err.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ClassifierError::Protocol("completion contained no choices".to_string())
            })?;
        Ok(content.trim().to_string())
    }
}

impl MatchClassifier for OpenAiClassifier {
    #[tracing::instrument(skip(self, memory, facts), fields(model = %self.model))]
    async fn match_memory(
        &self,
        memory: &str,
        facts: &[Fact],
    ) -> Result<FactVerdict, ClassifierError> {
        let facts_json = serde_json::to_string_pretty(facts)
            .map_err(|err| ClassifierError::Protocol(err.to_string()))?;
        let prompt = format!(
            r#"Given this labeled memory: "{memory}"

And these facts (with IDs):
{facts_json}

Compare the semantic meaning, ignoring the label format differences. For example, "Bob<user> lives in Seattle<city>" matches "Lives in Seattle".
It should be a near perfect match however, if the memory doesn't match any fact, return "NO_MATCH".

If the memory matches one of the facts, return ONLY the ID number of the matching fact.
If the memory doesn't match any fact, return "NO_MATCH".

Return your answer in this exact format - just the ID number or "NO_MATCH". Nothing else.
"#
        );

        let answer = self.complete(prompt).await?;
        parse_verdict(&answer)
    }

    #[tracing::instrument(skip(self, fact, memories), fields(fact_id = fact.id))]
    async fn absorb_fact(
        &self,
        fact: &Fact,
        memories: &[FlatMemory],
    ) -> Result<Vec<i64>, ClassifierError> {
        let fact_json = serde_json::to_string_pretty(fact)
            .map_err(|err| ClassifierError::Protocol(err.to_string()))?;
        let memories_json = serde_json::to_string_pretty(memories)
            .map_err(|err| ClassifierError::Protocol(err.to_string()))?;
        let prompt = format!(
            r#"Given this unmatched fact:
{fact_json}

And these labeled memories:
{memories_json}

Compare the semantic meaning, ignoring the label format differences. For example, "Bob<user> lives in Seattle<city>" matches "Lives in Seattle".

Should this fact be matched with any of the memories? If yes, return the memory ID(s) as a comma-separated list.
Memories should be very closely related to match, don't match if they are not almost identical.
If no match, return nothing.

Return ONLY the ID(s) or "". Example: "1234,5678" or ""
"#
        );

        let answer = self.complete(prompt).await?;
        parse_id_list(&answer)
    }
}

/// Parse a pass-1 answer: a single ID or `NO_MATCH`.
fn parse_verdict(answer: &str) -> Result<FactVerdict, ClassifierError> {
    let trimmed = answer.trim().trim_matches('"');
    if trimmed == "NO_MATCH" {
        return Ok(FactVerdict::NoMatch);
    }
    trimmed
        .parse::<i64>()
        .map(FactVerdict::Matched)
        .map_err(|_| {
            ClassifierError::Protocol(format!("expected a fact ID or NO_MATCH, got '{answer}'"))
        })
}

/// Parse a pass-2 answer: a comma-separated ID list, empty, or `NO_MATCH`.
///
/// Models answer the no-match case inconsistently (empty string, `""`,
/// `NO_MATCH`); all of them mean an empty list.
fn parse_id_list(answer: &str) -> Result<Vec<i64>, ClassifierError> {
    let trimmed = answer.trim().trim_matches('"');
    if trimmed.is_empty() || trimmed == "NO_MATCH" {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|part| {
            part.trim().parse::<i64>().map_err(|_| {
                ClassifierError::Protocol(format!(
                    "expected a comma-separated ID list, got '{answer}'"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_id() {
        assert_eq!(parse_verdict("2040").unwrap(), FactVerdict::Matched(2040));
        // Zero padding is preserved semantics-wise: 01234 is 1234.
        assert_eq!(parse_verdict("01234").unwrap(), FactVerdict::Matched(1234));
    }

    #[test]
    fn test_parse_verdict_no_match() {
        assert_eq!(parse_verdict("NO_MATCH").unwrap(), FactVerdict::NoMatch);
        assert_eq!(parse_verdict("\"NO_MATCH\"").unwrap(), FactVerdict::NoMatch);
    }

    #[test]
    fn test_parse_verdict_rejects_prose() {
        assert!(matches!(
            parse_verdict("The answer is 2040"),
            Err(ClassifierError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_id_list_multiple() {
        assert_eq!(parse_id_list("1234,5678").unwrap(), vec![1234, 5678]);
        assert_eq!(parse_id_list("1234, 5678").unwrap(), vec![1234, 5678]);
    }

    #[test]
    fn test_parse_id_list_single() {
        assert_eq!(parse_id_list("42").unwrap(), vec![42]);
    }

    #[test]
    fn test_parse_id_list_empty_variants() {
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("\"\"").unwrap().is_empty());
        assert!(parse_id_list("NO_MATCH").unwrap().is_empty());
    }

    #[test]
    fn test_parse_id_list_rejects_garbage() {
        assert!(matches!(
            parse_id_list("1234 and 5678"),
            Err(ClassifierError::Protocol(_))
        ));
    }
}
