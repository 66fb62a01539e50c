//! Redis implementation of [`KvBackend`].

use std::collections::HashMap;

use async_trait::async_trait;
use ontograph_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::Mutex;
use tracing::info;

use crate::backend::{KvBackend, RangeOrder};

fn backend_err(e: RedisError) -> Error {
    Error::Backend(e.to_string())
}

/// Redis backend over a lazily established, auto-reconnecting connection.
pub struct RedisBackend {
    client: Client,
    manager: Mutex<Option<ConnectionManager>>,
}

impl RedisBackend {
    /// Parse the URL. No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| Error::Config(format!("invalid redis url: {}", e)))?;
        Ok(Self {
            client,
            manager: Mutex::new(None),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager> {
        let mut guard = self.manager.lock().await;
        if let Some(manager) = guard.as_ref() {
            return Ok(manager.clone());
        }
        let manager = self
            .client
            .get_connection_manager()
            .await
            .map_err(backend_err)?;
        info!("Connected to Redis");
        *guard = Some(manager.clone());
        Ok(manager)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset_multiple(key, fields).await.map_err(backend_err)?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn().await?;
        let map: HashMap<String, String> = conn.hgetall(key).await.map_err(backend_err)?;
        Ok(map.into_iter().collect())
    }

    async fn del(&self, keys: &[String]) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(keys).await.map_err(backend_err)?;
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(key, member, score).await.map_err(backend_err)?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zrem(key, member).await.map_err(backend_err)?;
        Ok(())
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize, order: RangeOrder) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = match order {
            RangeOrder::Ascending => conn.zrange(key, start, stop).await,
            RangeOrder::Descending => conn.zrevrange(key, start, stop).await,
        }
        .map_err(backend_err)?;
        Ok(members)
    }

    async fn zcard(&self, key: &str) -> Result<usize> {
        let mut conn = self.conn().await?;
        conn.zcard(key).await.map_err(backend_err)
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.sadd(key, members).await.map_err(backend_err)?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.smembers(key).await.map_err(backend_err)
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.rpush(key, values).await.map_err(backend_err)?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.lrange(key, start, stop).await.map_err(backend_err)
    }

    async fn replace_list(&self, key: &str, values: &[String]) -> Result<()> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !values.is_empty() {
            pipe.rpush(key, values).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(backend_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(matches!(RedisBackend::open("not a url"), Err(Error::Config(_))));
    }

    #[test]
    fn test_open_is_lazy() {
        // Nothing listens here; opening must still succeed.
        let backend = RedisBackend::open("redis://127.0.0.1:1/").unwrap();
        assert_eq!(backend.kind(), "redis");
    }
}
