//! Text-to-ontology extraction.
//!
//! One non-streaming completion per call. OpenAI and Groq share the
//! chat-completions format with JSON mode; Anthropic uses the messages API.
//! Any transport, status, or parse failure fails the whole call.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use ontograph_core::{Error, OntologyData, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::config::LLMConfig;
use crate::types::{LLMProvider, LLMStatus, ResolvedProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOKENS: usize = 4096;
const TEMPERATURE: f64 = 0.2;

const SYSTEM_PROMPT: &str = "You extract ontology graphs from discussion text. \
Respond with a single JSON object and nothing else, shaped as \
{\"nodes\": [{\"id\": string, \"name\": string, \"type\": \"Concept\" | \"Entity\" | \"Action\" | \"Emotion\", \"description\"?: string}], \
\"links\": [{\"source\": node id, \"target\": node id, \"label\": string, \"description\"?: string}]}. \
Every link endpoint must be the id of a node in the same response.";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").expect("valid regex")
});

/// Turns free text into one ontology batch.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract a graph from `text`. `known_names` is `Some` when the caller
    /// wants existing names reused; the names themselves are listed in the
    /// request only when the slice is non-empty.
    async fn extract(&self, text: &str, known_names: Option<&[String]>) -> Result<OntologyData>;

    /// Provider status for health output.
    fn status(&self) -> LLMStatus;
}

/// Build the user prompt for one extraction.
pub fn build_prompt(text: &str, known_names: Option<&[String]>) -> String {
    let mut prompt = String::from(
        "Analyze the following discussion content and extract an ontology graph.\n\
         Identify key concepts, entities, actions, or emotions as nodes.\n\
         Identify relationships between them as links with descriptive labels.\n",
    );
    if known_names.is_some() {
        prompt.push_str(
            "\nReuse existing node names where appropriate. Only introduce new node names \
             if the concept is distinctly different from existing ones.\n",
        );
    }
    prompt.push_str(&format!("\nContent:\n\"{}\"", text));
    if let Some(names) = known_names.filter(|n| !n.is_empty()) {
        prompt.push_str(&format!(
            "\n\nExisting ontology nodes (reuse these names if applicable): {}",
            names.join(", ")
        ));
    }
    prompt
}

fn strip_code_fences(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Parse a model reply into a batch. Node types outside the closed set are
/// rejected.
pub fn parse_ontology(raw: &str) -> Result<OntologyData> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| Error::Extraction(format!("invalid ontology JSON: {}", e)))
}

/// [`Extractor`] backed by the configured LLM provider.
pub struct LlmExtractor {
    client: Client,
    config: LLMConfig,
}

impl LlmExtractor {
    pub fn new(config: LLMConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    async fn complete(&self, resolved: &ResolvedProvider, prompt: &str) -> Result<String> {
        let request = match resolved.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => self
                .client
                .post(resolved.provider.endpoint())
                .header("Authorization", format!("Bearer {}", resolved.api_key))
                .json(&json!({
                    "model": resolved.model,
                    "messages": [
                        {"role": "system", "content": SYSTEM_PROMPT},
                        {"role": "user", "content": prompt},
                    ],
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_TOKENS,
                    "response_format": {"type": "json_object"},
                })),
            LLMProvider::Anthropic => self
                .client
                .post(resolved.provider.endpoint())
                .header("x-api-key", &resolved.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&json!({
                    "model": resolved.model,
                    "system": SYSTEM_PROMPT,
                    "messages": [{"role": "user", "content": prompt}],
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_TOKENS,
                })),
        };

        debug!("Requesting extraction from {} with model {}", resolved.provider, resolved.model);

        let response = request
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!("API error {}: {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("Invalid response body: {}", e)))?;

        let content = match resolved.provider {
            LLMProvider::OpenAI | LLMProvider::Groq => body["choices"][0]["message"]["content"].as_str(),
            LLMProvider::Anthropic => body["content"][0]["text"].as_str(),
        };
        content
            .map(str::to_string)
            .ok_or_else(|| Error::Extraction("response carried no content".into()))
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, text: &str, known_names: Option<&[String]>) -> Result<OntologyData> {
        let Some(resolved) = self.config.resolve_provider() else {
            return Err(Error::Extraction("no LLM provider configured".into()));
        };
        let prompt = build_prompt(text, known_names);
        let result = self
            .complete(&resolved, &prompt)
            .await
            .and_then(|reply| parse_ontology(&reply));
        match &result {
            Ok(data) => info!(
                "Extracted {} nodes, {} links via {}",
                data.nodes.len(),
                data.links.len(),
                resolved.provider
            ),
            Err(e) => error!("Extraction via {} failed: {}", resolved.provider, e),
        }
        result
    }

    fn status(&self) -> LLMStatus {
        self.config.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::NodeType;

    #[test]
    fn test_prompt_with_hints() {
        let names = vec!["Trust".to_string(), "Market".to_string()];
        let prompt = build_prompt("markets run on trust", Some(names.as_slice()));
        assert!(prompt.contains("Reuse existing node names"));
        assert!(prompt.contains("\"markets run on trust\""));
        assert!(prompt.ends_with(
            "Existing ontology nodes (reuse these names if applicable): Trust, Market"
        ));
    }

    #[test]
    fn test_prompt_with_empty_hints() {
        let prompt = build_prompt("text", Some(&[][..]));
        assert!(prompt.contains("Reuse existing node names"));
        assert!(!prompt.contains("Existing ontology nodes"));
    }

    #[test]
    fn test_prompt_without_reuse() {
        let prompt = build_prompt("text", None);
        assert!(!prompt.contains("Reuse"));
        assert!(prompt.ends_with("Content:\n\"text\""));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let raw = "```json\n{\"nodes\":[{\"id\":\"n1\",\"name\":\"Trust\",\"type\":\"Concept\"}],\
                   \"links\":[]}\n```";
        let data = parse_ontology(raw).unwrap();
        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.nodes[0].node_type, NodeType::Concept);
    }

    #[test]
    fn test_parse_plain_reply_with_labels() {
        let raw = r#" {"nodes":[{"id":"a","name":"A","type":"Entity"},{"id":"b","name":"B","type":"Action"}],
                      "links":[{"source":"a","target":"b","label":"does"}]} "#;
        let data = parse_ontology(raw).unwrap();
        assert_eq!(data.links[0].label.as_deref(), Some("does"));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let raw = r#"{"nodes":[{"id":"a","name":"A","type":"Place"}],"links":[]}"#;
        assert!(matches!(parse_ontology(raw), Err(Error::Extraction(_))));
        assert!(matches!(parse_ontology("I could not do that"), Err(Error::Extraction(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_extractor_fails() {
        let extractor = LlmExtractor::new(LLMConfig::default());
        assert!(!extractor.status().available);
        let result = extractor.extract("text", None).await;
        assert!(matches!(result, Err(Error::Extraction(_))));
    }
}
