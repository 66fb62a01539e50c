//! Shared application state.

use std::sync::Arc;

use dashmap::DashMap;
use ontograph_core::OntographConfig;
use ontograph_extract::{Extractor, LLMConfig, LlmExtractor};
use ontograph_merge::{MergeOptions, SessionViews};
use ontograph_store::{Backend, LayeredSessionStore, MemoryBackend, RedisBackend, SessionStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// URL scheme selecting the in-process backend.
pub const MEMORY_URL: &str = "memory://";

/// Build the backend handle described by `config.redis_url`.
pub fn open_backend(config: &OntographConfig) -> anyhow::Result<Backend> {
    let Some(url) = config.redis_url.as_deref() else {
        warn!("REDIS_URL not set; sessions will not be persisted");
        return Ok(Backend::unconfigured());
    };
    if url.starts_with(MEMORY_URL) {
        info!("Using in-memory backend");
        return Ok(Backend::new(
            Arc::new(MemoryBackend::new()),
            config.op_timeout,
            config.health_ttl,
        ));
    }
    let redis = RedisBackend::open(url)
        .map_err(|e| anyhow::anyhow!("Failed to open backend: {}", e))?;
    info!("Using Redis backend");
    Ok(Backend::new(Arc::new(redis), config.op_timeout, config.health_ttl))
}

/// One async lock per session. Holders may read storage, append to it and
/// fold into the session's view without another request interleaving.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(session_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    pub fn remove(&self, session_id: &str) {
        self.locks.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: OntographConfig,
    pub sessions: SessionStore,
    pub layered: LayeredSessionStore,
    pub extractor: Arc<dyn Extractor>,
    pub views: SessionViews,
    pub locks: SessionLocks,
}

impl AppState {
    pub fn new(config: OntographConfig, backend: Backend, extractor: Arc<dyn Extractor>) -> Self {
        let views = SessionViews::new(MergeOptions {
            link_identity: config.link_identity,
        });
        Self {
            sessions: SessionStore::new(backend.clone()),
            layered: LayeredSessionStore::new(backend),
            extractor,
            views,
            locks: SessionLocks::default(),
            config,
        }
    }

    /// State wired from configuration: backend from `REDIS_URL`, extractor
    /// from the LLM config file and key env vars.
    pub fn from_config(config: OntographConfig) -> anyhow::Result<Self> {
        let backend = open_backend(&config)?;
        let llm_config = LLMConfig::load(&config.llm_config_file);
        let extractor: Arc<dyn Extractor> = Arc::new(LlmExtractor::new(llm_config));
        Ok(Self::new(config, backend, extractor))
    }

    pub fn backend(&self) -> &Backend {
        self.sessions.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_store::Availability;

    #[tokio::test]
    async fn test_session_locks_exclusive_per_session() {
        let locks = SessionLocks::default();
        let held = locks.lock("a").await;
        assert!(locks.locks.get("a").unwrap().try_lock().is_err());
        // Other sessions are independent.
        drop(locks.lock("b").await);
        drop(held);
        assert!(locks.locks.get("a").unwrap().try_lock().is_ok());
        locks.remove("a");
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_open_backend_variants() {
        let config = OntographConfig::default();
        assert!(!open_backend(&config).unwrap().is_configured());

        let config = OntographConfig {
            redis_url: Some(MEMORY_URL.into()),
            ..Default::default()
        };
        let backend = open_backend(&config).unwrap();
        assert_eq!(backend.kind(), Some("memory"));
        assert_eq!(backend.availability().await, Availability::Available);

        let config = OntographConfig {
            redis_url: Some("redis://127.0.0.1:6379".into()),
            ..Default::default()
        };
        assert_eq!(open_backend(&config).unwrap().kind(), Some("redis"));

        let config = OntographConfig {
            redis_url: Some("::bogus".into()),
            ..Default::default()
        };
        assert!(open_backend(&config).is_err());
    }
}
