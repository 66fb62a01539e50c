//! Configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which fields identify a link as a duplicate during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkIdentity {
    /// Resolved (source, target) pair, direction-sensitive. Labels are ignored.
    #[default]
    Endpoints,
    /// Resolved (source, target, label).
    EndpointsAndLabel,
}

impl std::str::FromStr for LinkIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "endpoints" => Ok(Self::Endpoints),
            "endpoints+label" | "endpoints-and-label" => Ok(Self::EndpointsAndLabel),
            other => Err(Error::Config(format!("unknown link identity: {}", other))),
        }
    }
}

/// Top-level Ontograph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntographConfig {
    /// HTTP server port.
    pub port: u16,
    /// Key-value backend URL. `None` means no backend is configured.
    pub redis_url: Option<String>,
    /// Budget for a single backend command.
    pub op_timeout: Duration,
    /// How long a liveness probe result is trusted before re-probing.
    pub health_ttl: Duration,
    /// Optional LLM provider settings file.
    pub llm_config_file: PathBuf,
    /// Duplicate-link rule for the merge engine.
    pub link_identity: LinkIdentity,
}

impl Default for OntographConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            redis_url: None,
            op_timeout: Duration::from_millis(2000),
            health_ttl: Duration::from_millis(5000),
            llm_config_file: PathBuf::from("data/llm-config.json"),
            link_identity: LinkIdentity::Endpoints,
        }
    }
}

impl OntographConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {}", p)))?,
            None => defaults.port,
        };

        let redis_url = lookup("REDIS_URL").filter(|u| !u.trim().is_empty());

        let op_timeout = match lookup("ONTOGRAPH_OP_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(parse_millis("ONTOGRAPH_OP_TIMEOUT_MS", &ms)?),
            None => defaults.op_timeout,
        };

        let health_ttl = match lookup("ONTOGRAPH_HEALTH_TTL_MS") {
            Some(ms) => Duration::from_millis(parse_millis("ONTOGRAPH_HEALTH_TTL_MS", &ms)?),
            None => defaults.health_ttl,
        };

        let llm_config_file = lookup("ONTOGRAPH_LLM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or(defaults.llm_config_file);

        let link_identity = match lookup("ONTOGRAPH_LINK_IDENTITY") {
            Some(v) => v.parse()?,
            None => defaults.link_identity,
        };

        Ok(Self {
            port,
            redis_url,
            op_timeout,
            health_ttl,
            llm_config_file,
            link_identity,
        })
    }
}

fn parse_millis(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {}: {}", name, value)))
}
