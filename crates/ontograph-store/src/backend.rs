//! Key-value backend abstraction and the connection capability.
//!
//! Store code never talks to a [`KvBackend`] directly. It asks [`Backend`]
//! for a [`Connected`] handle, which exists only when a backend is configured
//! and its liveness probe passed, and every primitive on it runs under the
//! per-command timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ontograph_core::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Direction of a sorted-set range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOrder {
    /// Lowest score first.
    Ascending,
    /// Highest score first.
    Descending,
}

/// The primitives the stores need from a hash/set/list key-value store.
///
/// Ranges use inclusive `start..=stop` indices; negative indices count from
/// the end (`-1` is the last element).
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn kind(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// All fields of a hash; empty if the key does not exist.
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>>;

    async fn del(&self, keys: &[String]) -> Result<()>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    async fn zrem(&self, key: &str, member: &str) -> Result<()>;

    async fn zrange(&self, key: &str, start: isize, stop: isize, order: RangeOrder) -> Result<Vec<String>>;

    async fn zcard(&self, key: &str) -> Result<usize>;

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()>;

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// Delete the list at `key` and recreate it holding exactly `values`.
    async fn replace_list(&self, key: &str, values: &[String]) -> Result<()>;
}

/// Why no connection could be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// No backend URL was configured.
    NotConfigured,
    /// A backend is configured but failed its liveness probe.
    Unreachable,
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "backend not configured"),
            Self::Unreachable => write!(f, "backend unreachable"),
        }
    }
}

/// Backend availability as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    Available,
    NotConfigured,
    Unreachable,
}

struct HealthProbe {
    ttl: Duration,
    last: Mutex<Option<(Instant, bool)>>,
}

impl HealthProbe {
    fn cached(&self) -> Option<bool> {
        let last = self.last.lock();
        match *last {
            Some((at, alive)) if at.elapsed() < self.ttl => Some(alive),
            _ => None,
        }
    }

    fn record(&self, alive: bool) {
        *self.last.lock() = Some((Instant::now(), alive));
    }

    fn invalidate(&self) {
        *self.last.lock() = None;
    }
}

/// Shared handle to an optional key-value backend.
#[derive(Clone)]
pub struct Backend {
    kv: Option<Arc<dyn KvBackend>>,
    probe: Arc<HealthProbe>,
    op_timeout: Duration,
}

impl Backend {
    /// Wrap a backend. `health_ttl` bounds how long a probe result is reused.
    pub fn new(kv: Arc<dyn KvBackend>, op_timeout: Duration, health_ttl: Duration) -> Self {
        Self {
            kv: Some(kv),
            probe: Arc::new(HealthProbe {
                ttl: health_ttl,
                last: Mutex::new(None),
            }),
            op_timeout,
        }
    }

    /// A handle with no backend; every connection attempt reports
    /// [`Unavailable::NotConfigured`].
    pub fn unconfigured() -> Self {
        Self {
            kv: None,
            probe: Arc::new(HealthProbe {
                ttl: Duration::ZERO,
                last: Mutex::new(None),
            }),
            op_timeout: Duration::from_secs(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.kv.is_some()
    }

    pub fn kind(&self) -> Option<&'static str> {
        self.kv.as_ref().map(|kv| kv.kind())
    }

    /// Obtain a connection, probing liveness unless a recent probe result
    /// is still cached.
    pub async fn connect(&self) -> std::result::Result<Connected<'_>, Unavailable> {
        let Some(kv) = self.kv.as_deref() else {
            return Err(Unavailable::NotConfigured);
        };

        let alive = match self.probe.cached() {
            Some(alive) => alive,
            None => {
                let alive = match tokio::time::timeout(self.op_timeout, kv.ping()).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!("{} ping failed: {}", kv.kind(), e);
                        false
                    }
                    Err(_) => {
                        warn!("{} ping timed out after {:?}", kv.kind(), self.op_timeout);
                        false
                    }
                };
                self.probe.record(alive);
                alive
            }
        };

        if alive {
            Ok(Connected {
                kv,
                timeout: self.op_timeout,
            })
        } else {
            Err(Unavailable::Unreachable)
        }
    }

    pub async fn availability(&self) -> Availability {
        match self.connect().await {
            Ok(_) => Availability::Available,
            Err(Unavailable::NotConfigured) => Availability::NotConfigured,
            Err(Unavailable::Unreachable) => Availability::Unreachable,
        }
    }

    /// Log a failed operation and return `fallback`. Errors that suggest the
    /// backend went away drop the cached probe so the next call re-probes.
    pub(crate) fn recover<T>(&self, op: &str, result: Result<T>, fallback: T) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to {}: {}", op, e);
                if matches!(e, Error::Backend(_) | Error::Timeout(_)) {
                    self.probe.invalidate();
                }
                fallback
            }
        }
    }
}

/// A live backend connection. All primitives are bounded by the
/// per-command timeout.
pub struct Connected<'a> {
    kv: &'a dyn KvBackend,
    timeout: Duration,
}

impl Connected<'_> {
    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        debug!("{} {}", self.kv.kind(), op);
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    pub async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.bounded("HSET", self.kv.hset(key, fields)).await
    }

    pub async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        self.bounded("HGETALL", self.kv.hgetall(key)).await
    }

    pub async fn del(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.bounded("DEL", self.kv.del(keys)).await
    }

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.bounded("ZADD", self.kv.zadd(key, member, score)).await
    }

    pub async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        self.bounded("ZREM", self.kv.zrem(key, member)).await
    }

    pub async fn zrange(&self, key: &str, start: isize, stop: isize, order: RangeOrder) -> Result<Vec<String>> {
        self.bounded("ZRANGE", self.kv.zrange(key, start, stop, order)).await
    }

    pub async fn zcard(&self, key: &str) -> Result<usize> {
        self.bounded("ZCARD", self.kv.zcard(key)).await
    }

    pub async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.bounded("SADD", self.kv.sadd(key, members)).await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.bounded("SMEMBERS", self.kv.smembers(key)).await
    }

    pub async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.bounded("RPUSH", self.kv.rpush(key, values)).await
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.bounded("LRANGE", self.kv.lrange(key, start, stop)).await
    }

    pub async fn replace_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.bounded("DEL+RPUSH", self.kv.replace_list(key, values)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_unconfigured_never_connects() {
        let backend = Backend::unconfigured();
        assert_eq!(backend.connect().await.err(), Some(Unavailable::NotConfigured));
        assert_eq!(backend.availability().await, Availability::NotConfigured);
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let mem = Arc::new(MemoryBackend::new());
        mem.set_available(false);
        let backend = Backend::new(mem, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(backend.connect().await.err(), Some(Unavailable::Unreachable));
    }

    #[tokio::test]
    async fn test_probe_result_is_cached() {
        let mem = Arc::new(MemoryBackend::new());
        let backend = Backend::new(mem.clone(), Duration::from_secs(1), Duration::from_secs(60));
        assert!(backend.connect().await.is_ok());

        // Still inside the TTL: the cached "alive" answer is reused.
        mem.set_available(false);
        assert!(backend.connect().await.is_ok());
        assert_eq!(mem.ping_count(), 1);
    }

    #[tokio::test]
    async fn test_recover_invalidates_probe() {
        let mem = Arc::new(MemoryBackend::new());
        let backend = Backend::new(mem.clone(), Duration::from_secs(1), Duration::from_secs(60));
        assert!(backend.connect().await.is_ok());

        mem.set_available(false);
        let value = backend.recover("read", Err::<u32, _>(Error::Backend("refused".into())), 7);
        assert_eq!(value, 7);
        assert_eq!(backend.connect().await.err(), Some(Unavailable::Unreachable));
    }

    #[tokio::test]
    async fn test_empty_writes_skip_backend() {
        let mem = Arc::new(MemoryBackend::new());
        let backend = Backend::new(mem.clone(), Duration::from_secs(1), Duration::ZERO);
        let kv = backend.connect().await.unwrap();
        kv.rpush("k", &[]).await.unwrap();
        kv.del(&[]).await.unwrap();
        assert!(kv.lrange("k", 0, -1).await.unwrap().is_empty());
    }
}
