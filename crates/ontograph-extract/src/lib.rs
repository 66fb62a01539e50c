//! Ontology extraction through external LLM providers (OpenAI/Anthropic/Groq).
//!
//! Free text goes in, one [`OntologyData`](ontograph_core::OntologyData)
//! batch comes out. Requests are single non-streaming JSON completions.

pub mod config;
pub mod extractor;
pub mod types;

pub use config::LLMConfig;
pub use extractor::{build_prompt, parse_ontology, Extractor, LlmExtractor};
pub use types::*;
