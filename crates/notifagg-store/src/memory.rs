//! In-process bucket store.
//!
//! Mirrors the Redis semantics the engine expects, including lazy key expiry.
//! Sets keep insertion order. Time comes from `tokio::time::Instant`, so tests
//! running on a paused runtime can advance past TTLs without sleeping.

use anyhow::anyhow;
use async_trait::async_trait;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::{BucketStore, Result, StoreError};

#[derive(Debug)]
enum Value {
    Str(String),
    Set(IndexSet<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory [`BucketStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of `key`, or None when the key is missing or has no TTL.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let guard = self.inner.lock();
        let entry = guard.get(key).filter(|e| !e.is_expired(now))?;
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// Value of a plain string key such as the flush lock.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.with_live(key, |entry| match entry {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        })
    }

    /// Drop every expired key eagerly. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let before = guard.len();
        guard.retain(|_, e| !e.is_expired(now));
        let removed = before - guard.len();
        if removed > 0 {
            trace!(removed, "purged expired keys");
        }
        removed
    }

    /// Run `f` against the live entry for `key`, removing it first if expired.
    fn with_live<T>(&self, key: &str, f: impl FnOnce(Option<&mut Entry>) -> T) -> T {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        if guard.get(key).is_some_and(|e| e.is_expired(now)) {
            guard.remove(key);
        }
        f(guard.get_mut(key))
    }

    fn with_set_mut<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut IndexSet<String>) -> T,
    ) -> Result<T> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        if guard.get(key).is_some_and(|e| e.is_expired(now)) {
            guard.remove(key);
        }
        let entry = guard
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Set(IndexSet::new())));
        match &mut entry.value {
            Value::Set(set) => {
                let out = f(set);
                if set.is_empty() {
                    guard.remove(key);
                }
                Ok(out)
            }
            _ => Err(wrong_type(key)),
        }
    }

    fn with_hash_mut<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, String>) -> Result<T>,
    ) -> Result<T> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        if guard.get(key).is_some_and(|e| e.is_expired(now)) {
            guard.remove(key);
        }
        let entry = guard
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        match &mut entry.value {
            Value::Hash(hash) => f(hash),
            _ => Err(wrong_type(key)),
        }
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.with_set_mut(key, |set| set.insert(member.to_string()))
    }

    async fn set_card(&self, key: &str) -> Result<usize> {
        self.with_live(key, |entry| match entry {
            None => Ok(0),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.len()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.with_live(key, |entry| match entry {
            None => Ok(false),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.with_live(key, |entry| match entry {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.with_set_mut(key, |set| set.shift_remove(member))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.with_hash_mut(key, |hash| {
            hash.insert(field.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.with_hash_mut(key, |hash| {
            let current = match hash.get(field) {
                Some(raw) => raw.parse::<i64>().map_err(|_| {
                    StoreError::Backend(anyhow!(
                        "hash field {}.{} is not an integer: {}",
                        key,
                        field,
                        raw
                    ))
                })?,
                None => 0,
            };
            let next = current + delta;
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        Ok(self.with_live(key, |entry| match entry {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                true
            }
            None => false,
        }))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.inner.lock().remove(key);
        Ok(removed.is_some_and(|e| !e.is_expired(now)))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        if let Some(existing) = guard.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_operations() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "a").await.unwrap());
        assert!(!store.set_add("s", "a").await.unwrap());
        assert!(store.set_add("s", "b").await.unwrap());
        assert_eq!(store.set_card("s").await.unwrap(), 2);
        assert!(store.set_is_member("s", "b").await.unwrap());
        assert_eq!(store.set_members("s").await.unwrap(), vec!["a", "b"]);

        assert!(store.set_remove("s", "a").await.unwrap());
        assert!(!store.set_remove("s", "a").await.unwrap());
        assert!(store.set_remove("s", "b").await.unwrap());
        // Empty sets disappear like in Redis
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_keys_read_as_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.set_card("nope").await.unwrap(), 0);
        assert!(store.set_members("nope").await.unwrap().is_empty());
        assert!(!store.set_remove("nope", "x").await.unwrap());
        assert_eq!(store.hash_get("nope", "f").await.unwrap(), None);
        assert!(!store.expire("nope", Duration::from_secs(1)).await.unwrap());
        assert!(!store.delete("nope").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_hash_operations() {
        let store = MemoryStore::new();
        store.hash_set("h", "entity_id", "tenant-1").await.unwrap();
        store.hash_set("h", "entity_id", "tenant-2").await.unwrap();
        assert_eq!(
            store.hash_get("h", "entity_id").await.unwrap().as_deref(),
            Some("tenant-2")
        );
        assert_eq!(store.hash_incr("h", "overflow", 1).await.unwrap(), 1);
        assert_eq!(store.hash_incr("h", "overflow", 4).await.unwrap(), 5);
        assert!(store.hash_incr("h", "entity_id", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.set_add("k", "m").await.unwrap();
        assert!(matches!(
            store.hash_get("k", "f").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.hash_set("k", "f", "v").await,
            Err(StoreError::WrongType { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = MemoryStore::new();
        store.set_add("s", "a").await.unwrap();
        assert!(store.expire("s", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.ttl("s"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.set_card("s").await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.set_card("s").await.unwrap(), 0);
        assert!(store.set_members("s").await.unwrap().is_empty());

        // An expired key is recreated fresh, without the old TTL
        store.set_add("s", "b").await.unwrap();
        assert_eq!(store.ttl("s"), None);
        assert_eq!(store.set_members("s").await.unwrap(), vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_respects_ttl() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("lock", "w1", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "w2", ttl).await.unwrap());
        assert_eq!(store.get_string("lock").as_deref(), Some("w1"));

        tokio::time::advance(ttl).await;
        assert_eq!(store.get_string("lock"), None);
        assert!(store.set_if_absent("lock", "w2", ttl).await.unwrap());

        assert!(store.delete("lock").await.unwrap());
        assert!(store.set_if_absent("lock", "w3", ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.hash_set("a", "f", "v").await.unwrap();
        store.hash_set("b", "f", "v").await.unwrap();
        store.expire("a", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
