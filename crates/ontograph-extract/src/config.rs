//! Extraction provider settings and provider selection.
//!
//! The settings file is optional:
//!
//! ```json
//! { "provider": "auto", "anthropic": { "apiKey": "...", "model": "..." } }
//! ```
//!
//! A provider section without a key falls back to that provider's API key
//! environment variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{LLMProvider, LLMStatus, ProviderChoice, ResolvedProvider};

/// Key and model override for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// LLM configuration (read from llm-config.json).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default)]
    pub provider: ProviderChoice,
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub groq: ProviderSettings,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl LLMConfig {
    /// Read `path` if present, then fill missing keys from the environment.
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Like [`LLMConfig::load`], reading key fallbacks through `lookup`.
    pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<LLMConfig>(&raw) {
                Ok(mut config) => {
                    info!("Loaded LLM config from {}", path.display());
                    config.source = Some(path.to_path_buf());
                    config
                }
                Err(e) => {
                    warn!("Ignoring invalid LLM config {}: {}", path.display(), e);
                    LLMConfig::default()
                }
            },
            Err(_) => LLMConfig::default(),
        };

        for provider in LLMProvider::AUTO_ORDER {
            let settings = config.settings_mut(provider);
            settings.api_key = non_blank(settings.api_key.take()).or_else(|| non_blank(lookup(provider.key_var())));
        }
        config
    }

    pub fn settings(&self, provider: LLMProvider) -> &ProviderSettings {
        match provider {
            LLMProvider::OpenAI => &self.openai,
            LLMProvider::Anthropic => &self.anthropic,
            LLMProvider::Groq => &self.groq,
        }
    }

    fn settings_mut(&mut self, provider: LLMProvider) -> &mut ProviderSettings {
        match provider {
            LLMProvider::OpenAI => &mut self.openai,
            LLMProvider::Anthropic => &mut self.anthropic,
            LLMProvider::Groq => &mut self.groq,
        }
    }

    fn with_key(&self, provider: LLMProvider) -> Option<ResolvedProvider> {
        let settings = self.settings(provider);
        let api_key = settings.api_key.clone()?;
        Some(ResolvedProvider {
            provider,
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
        })
    }

    /// The provider an extraction would use. A fixed choice without a key
    /// resolves to nothing rather than falling through to another provider.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        match self.provider.fixed() {
            Some(provider) => self.with_key(provider),
            None => LLMProvider::AUTO_ORDER
                .iter()
                .find_map(|provider| self.with_key(*provider)),
        }
    }

    pub fn status(&self) -> LLMStatus {
        match self.resolve_provider() {
            Some(resolved) => LLMStatus {
                available: true,
                provider: Some(resolved.provider.to_string()),
                model: Some(resolved.model),
            },
            None => LLMStatus::default(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
