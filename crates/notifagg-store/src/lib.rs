// Bucket store abstraction for notification aggregation
//
// The store is the only shared mutable resource between workers. Every
// mutation is a single-key atomic operation; nothing here needs multi-key
// transactions.
//
// Implementations:
// - MemoryStore (single process, tests and the reference service)

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by bucket store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key holds a value of a different kind than the operation expects
    #[error("operation against a key holding the wrong kind of value: {key}")]
    WrongType { key: String },

    /// Backend could not be reached (network, timeout, shutdown)
    #[error("bucket store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Key-value operations the aggregation engine relies on.
///
/// Semantics follow the usual Redis commands of the same shape: operations on a
/// missing key behave as if the key held an empty value, and expired keys are
/// indistinguishable from missing ones.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Add `member` to the set at `key`. Returns true when it was not present.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// Number of members in the set at `key`.
    async fn set_card(&self, key: &str) -> Result<usize>;

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of the set at `key`.
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Remove `member` from the set at `key`. Returns true when it was present.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Atomically add `delta` to an integer hash field, returning the new value.
    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Set a TTL on `key`. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key`. Returns true when something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically create a string key with a TTL unless it already exists.
    /// Returns true when this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
}
