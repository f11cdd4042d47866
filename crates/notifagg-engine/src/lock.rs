// Cluster-wide flush lock
//
// A set-if-absent key with a TTL. The TTL bounds how long a crashed holder can
// block other workers. Release deletes the key unconditionally, so a cycle
// that outlives the TTL may drop a lock taken by a later worker; duplicate
// flushes that follow are absorbed by the notification dedup key.

use notifagg_store::{BucketStore, Result};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Value written into the lock key by the holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct FlushLock {
    store: Arc<dyn BucketStore>,
    key: String,
    ttl: Duration,
}

impl FlushLock {
    pub fn new(store: Arc<dyn BucketStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `None` when another worker holds the lock.
    pub async fn try_acquire(&self) -> Result<Option<LockToken>> {
        let token = LockToken(Uuid::new_v4().to_string());
        if self
            .store
            .set_if_absent(&self.key, token.as_str(), self.ttl)
            .await?
        {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    pub async fn release(&self, _token: LockToken) -> Result<bool> {
        self.store.delete(&self.key).await
    }
}
