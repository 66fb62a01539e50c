//! In-process key-value backend.
//!
//! Mirrors the Redis semantics the stores rely on (sorted-set ordering by
//! score then member, inclusive ranges with negative indices, type errors
//! on mismatched keys). Availability can be switched off to exercise the
//! degraded paths.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ontograph_core::{Error, Result};
use parking_lot::Mutex;

use crate::backend::{KvBackend, RangeOrder};

enum Value {
    /// Fields in insertion order.
    Hash(Vec<(String, String)>),
    /// (score, member), kept sorted.
    SortedSet(Vec<(f64, String)>),
    Set(BTreeSet<String>),
    List(Vec<String>),
}

/// Thread-safe in-memory backend.
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Value>>,
    available: AtomicBool,
    pings: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            pings: AtomicUsize::new(0),
        }
    }

    /// Simulate the backend going down (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Whether `key` currently holds any value.
    pub fn exists(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Number of keys held.
    pub fn key_count(&self) -> usize {
        self.data.lock().len()
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Backend("connection refused".into()))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str) -> Error {
    Error::Backend(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// Resolve an inclusive, possibly negative index range against `len`.
fn slice_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(Vec::new()));
        let Value::Hash(hash) = entry else {
            return Err(wrong_type(key));
        };
        for (field, value) in fields {
            match hash.iter_mut().find(|(f, _)| f == field) {
                Some(slot) => slot.1 = value.clone(),
                None => hash.push((field.clone(), value.clone())),
            }
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        self.check()?;
        match self.data.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn del(&self, keys: &[String]) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(Vec::new()));
        let Value::SortedSet(zset) = entry else {
            return Err(wrong_type(key));
        };
        zset.retain(|(_, m)| m != member);
        zset.push((score, member.to_string()));
        zset.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        let emptied = match data.get_mut(key) {
            None => return Ok(()),
            Some(Value::SortedSet(zset)) => {
                zset.retain(|(_, m)| m != member);
                zset.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if emptied {
            data.remove(key);
        }
        Ok(())
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize, order: RangeOrder) -> Result<Vec<String>> {
        self.check()?;
        let data = self.data.lock();
        let members: Vec<&String> = match data.get(key) {
            None => return Ok(Vec::new()),
            Some(Value::SortedSet(zset)) => match order {
                RangeOrder::Ascending => zset.iter().map(|(_, m)| m).collect(),
                RangeOrder::Descending => zset.iter().rev().map(|(_, m)| m).collect(),
            },
            Some(_) => return Err(wrong_type(key)),
        };
        Ok(match slice_bounds(members.len(), start, stop) {
            Some((from, to)) => members[from..=to].iter().map(|m| m.to_string()).collect(),
            None => Vec::new(),
        })
    }

    async fn zcard(&self, key: &str) -> Result<usize> {
        self.check()?;
        match self.data.lock().get(key) {
            None => Ok(0),
            Some(Value::SortedSet(zset)) => Ok(zset.len()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        let Value::Set(set) = entry else {
            return Err(wrong_type(key));
        };
        set.extend(members.iter().cloned());
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.check()?;
        match self.data.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        let Value::List(list) = entry else {
            return Err(wrong_type(key));
        };
        list.extend(values.iter().cloned());
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.check()?;
        match self.data.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(match slice_bounds(list.len(), start, stop) {
                Some((from, to)) => list[from..=to].to_vec(),
                None => Vec::new(),
            }),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn replace_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.check()?;
        let mut data = self.data.lock();
        if values.is_empty() {
            data.remove(key);
        } else {
            data.insert(key.to_string(), Value::List(values.to_vec()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(5, 0, -1), Some((0, 4)));
        assert_eq!(slice_bounds(5, 0, 1), Some((0, 1)));
        assert_eq!(slice_bounds(5, -2, -1), Some((3, 4)));
        assert_eq!(slice_bounds(5, 0, 99), Some((0, 4)));
        assert_eq!(slice_bounds(5, 6, 9), None);
        assert_eq!(slice_bounds(0, 0, -1), None);
    }

    #[tokio::test]
    async fn test_zset_order_and_update() {
        let kv = MemoryBackend::new();
        kv.zadd("z", "b", 2.0).await.unwrap();
        kv.zadd("z", "a", 3.0).await.unwrap();
        kv.zadd("z", "c", 1.0).await.unwrap();
        kv.zadd("z", "c", 4.0).await.unwrap();

        assert_eq!(kv.zrange("z", 0, -1, RangeOrder::Ascending).await.unwrap(), strings(&["b", "a", "c"]));
        assert_eq!(kv.zrange("z", 0, 1, RangeOrder::Descending).await.unwrap(), strings(&["c", "a"]));
        assert_eq!(kv.zcard("z").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_hash_upsert_keeps_order() {
        let kv = MemoryBackend::new();
        kv.hset("h", &[("x".into(), "1".into()), ("y".into(), "2".into())]).await.unwrap();
        kv.hset("h", &[("x".into(), "3".into())]).await.unwrap();
        let all = kv.hgetall("h").await.unwrap();
        assert_eq!(all, vec![("x".to_string(), "3".to_string()), ("y".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let kv = MemoryBackend::new();
        kv.rpush("k", &strings(&["a"])).await.unwrap();
        assert!(kv.hgetall("k").await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_rejects_everything() {
        let kv = MemoryBackend::new();
        kv.set_available(false);
        assert!(kv.ping().await.is_err());
        assert!(kv.smembers("s").await.is_err());
    }
}
