// Notification aggregation engine
//
// Events are grouped into buckets keyed by (recipient, type, subject, window).
// The ingestor writes buckets into a shared BucketStore; the flush coordinator
// turns closed buckets into one notification each.
//
// Philosophy: keep the hot path to a handful of single-key store operations.
// Everything expensive (profile lookup, persistence, push) happens at flush.

use notifagg_core::KeySpace;
use std::time::Duration;

pub mod builder;
pub mod collaborators;
pub mod error;
pub mod flush;
pub mod ingest;
pub mod lock;

pub use builder::{AggregateBuilder, AggregateRequest};
pub use collaborators::{
    ActorProfile, AggregateRecord, AggregateStore, NewNotification, NotificationId,
    NotificationStore, ProfileResolver, PushDelivery, PushMessage, PushReceipt,
};
pub use error::{EngineError, Result};
pub use flush::{FlushCoordinator, FlushOutcome, FlushReport};
pub use ingest::{ActorDisposition, EventIngestor, RecordOutcome};
pub use lock::{FlushLock, LockToken};

/// Engine tuning shared by the ingestor and the flush coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Width of one aggregation window
    pub window: Duration,
    /// Maximum number of actor ids retained per bucket
    pub max_actors: usize,
    /// Expiry applied to bucket state on every write
    pub bucket_ttl: Duration,
    /// Expiry of the flush lock; bounds how long a crashed worker blocks flushing
    pub lock_ttl: Duration,
    pub key_prefix: String,
    /// Actor profiles requested per aggregate
    pub resolve_limit: usize,
    /// Buckets flushed concurrently within one cycle
    pub flush_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(120),
            max_actors: 50,
            bucket_ttl: Duration::from_secs(3600),
            lock_ttl: Duration::from_secs(60),
            key_prefix: "notifagg".to_string(),
            resolve_limit: 2,
            flush_concurrency: 1,
        }
    }
}

impl EngineConfig {
    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone())
    }
}
