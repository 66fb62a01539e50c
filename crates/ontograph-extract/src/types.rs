//! Provider types.

use serde::{Deserialize, Serialize};

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl LLMProvider {
    /// Providers tried, in order, when no preference is configured.
    pub const AUTO_ORDER: [LLMProvider; 3] = [Self::Anthropic, Self::Groq, Self::OpenAI];

    /// Chat endpoint for a non-streaming completion.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1/chat/completions",
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Groq => "llama-3.3-70b-versatile",
        }
    }

    /// Environment variable consulted when the config file has no key.
    pub fn key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Groq => "GROQ_API_KEY",
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Groq => write!(f, "groq"),
        }
    }
}

/// Which provider extraction should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    /// First provider in [`LLMProvider::AUTO_ORDER`] that has a key.
    #[default]
    Auto,
    OpenAI,
    Anthropic,
    Groq,
}

impl ProviderChoice {
    pub fn fixed(&self) -> Option<LLMProvider> {
        match self {
            Self::Auto => None,
            Self::OpenAI => Some(LLMProvider::OpenAI),
            Self::Anthropic => Some(LLMProvider::Anthropic),
            Self::Groq => Some(LLMProvider::Groq),
        }
    }
}

/// The provider and model an extraction would use right now.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
}

/// Extraction status for health output (no keys exposed).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LLMStatus {
    #[serde(rename = "llmAvailable")]
    pub available: bool,
    #[serde(rename = "llmProvider")]
    pub provider: Option<String>,
    #[serde(rename = "llmModel")]
    pub model: Option<String>,
}
