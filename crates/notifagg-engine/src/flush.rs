// Flush coordination
//
// One cycle: take the cluster lock, scan the registry, build an aggregate for
// every bucket whose window has closed, clean up, release the lock. A failing
// bucket is logged and left registered; it never aborts the cycle. The lock is
// released even when a collaborator panics mid-cycle.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use metrics::{counter, histogram};
use notifagg_core::{meta_fields, BucketKey, Clock, KeySpace, WindowId};
use notifagg_store::BucketStore;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::builder::{AggregateBuilder, AggregateRequest};
use crate::collaborators::NotificationId;
use crate::lock::FlushLock;
use crate::{EngineConfig, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FlushReport {
    /// Registry entries read
    pub scanned: usize,
    /// Buckets whose window is still open
    pub pending: usize,
    pub flushed: usize,
    /// Registered buckets with no actors left
    pub stale: usize,
    pub failed: usize,
    /// Registry entries that were not valid bucket keys
    pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another worker is flushing
    LockHeld,
    Completed(FlushReport),
}

enum BucketResult {
    Flushed,
    Stale,
    Failed,
}

pub struct FlushCoordinator {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    builder: Arc<AggregateBuilder>,
    lock: FlushLock,
    keys: KeySpace,
    config: EngineConfig,
}

impl FlushCoordinator {
    pub fn new(
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
        builder: Arc<AggregateBuilder>,
        config: EngineConfig,
    ) -> Self {
        let keys = config.key_space();
        let lock = FlushLock::new(store.clone(), keys.flush_lock(), config.lock_ttl);
        Self {
            store,
            clock,
            builder,
            lock,
            keys,
            config,
        }
    }

    /// Run one flush cycle if no other worker is flushing.
    pub async fn flush_due_buckets(&self) -> Result<FlushOutcome> {
        let Some(token) = self.lock.try_acquire().await? else {
            debug!("flush lock held elsewhere, skipping cycle");
            return Ok(FlushOutcome::LockHeld);
        };

        let span = tracing::info_span!("flush_cycle", lock_token = %token.as_str());
        let start = Instant::now();
        let cycle = AssertUnwindSafe(self.run_cycle().instrument(span.clone()))
            .catch_unwind()
            .await;

        if let Err(e) = self.lock.release(token).await {
            warn!(parent: &span, error = %e, "failed to release flush lock; it will expire");
        }

        let result = match cycle {
            Ok(result) => result,
            Err(payload) => {
                error!(parent: &span, "flush cycle panicked; lock released");
                panic::resume_unwind(payload);
            }
        };

        counter!("notifagg.flush.cycles", 1);
        histogram!(
            "notifagg.flush.duration_ms",
            start.elapsed().as_secs_f64() * 1_000.0
        );

        match &result {
            Ok(report) => {
                counter!("notifagg.flush.buckets", report.flushed as u64);
                if report.failed > 0 {
                    counter!("notifagg.flush.failures", report.failed as u64);
                }
                if report.flushed + report.failed + report.stale + report.discarded > 0 {
                    info!(
                        parent: &span,
                        scanned = report.scanned,
                        pending = report.pending,
                        flushed = report.flushed,
                        stale = report.stale,
                        failed = report.failed,
                        discarded = report.discarded,
                        "flush cycle complete"
                    );
                }
            }
            Err(e) => {
                error!(parent: &span, error = %e, "flush cycle aborted");
            }
        }

        result.map(FlushOutcome::Completed)
    }

    async fn run_cycle(&self) -> Result<FlushReport> {
        let current = WindowId::at(self.clock.now_millis(), self.config.window);
        let registry = self.keys.registry();
        let registered = self.store.set_members(&registry).await?;

        let mut report = FlushReport {
            scanned: registered.len(),
            ..Default::default()
        };

        let mut due = Vec::new();
        for encoded in registered {
            match BucketKey::decode(&encoded) {
                Ok(bucket) if bucket.window.is_closed(current) => due.push((encoded, bucket)),
                Ok(_) => report.pending += 1,
                Err(e) => {
                    warn!(key = %encoded, error = %e, "discarding malformed registry entry");
                    self.unregister(&encoded).await;
                    report.discarded += 1;
                }
            }
        }

        let results: Vec<BucketResult> = stream::iter(due)
            .map(|(encoded, bucket)| self.flush_bucket(encoded, bucket))
            .buffer_unordered(self.config.flush_concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                BucketResult::Flushed => report.flushed += 1,
                BucketResult::Stale => report.stale += 1,
                BucketResult::Failed => report.failed += 1,
            }
        }

        Ok(report)
    }

    #[tracing::instrument(name = "flush_bucket", skip_all, fields(bucket = %encoded))]
    async fn flush_bucket(&self, encoded: String, bucket: BucketKey) -> BucketResult {
        let actors_key = self.keys.actors(&bucket);
        let actor_ids = match self.store.set_members(&actors_key).await {
            Ok(actor_ids) => actor_ids,
            Err(e) => {
                warn!(error = %e, "failed to read actor set; abandoning bucket to expiry");
                self.unregister(&encoded).await;
                return BucketResult::Failed;
            }
        };

        if actor_ids.is_empty() {
            debug!("removing stale registry entry");
            self.unregister(&encoded).await;
            return BucketResult::Stale;
        }

        match self.deliver(&encoded, &bucket, actor_ids).await {
            Ok(Some(notification_id)) => {
                self.cleanup(&encoded, &bucket).await;
                debug!(%notification_id, "bucket flushed");
                BucketResult::Flushed
            }
            Ok(None) => {
                self.cleanup(&encoded, &bucket).await;
                BucketResult::Stale
            }
            Err(e) => {
                error!(error = %e, "bucket flush failed; will retry next cycle");
                BucketResult::Failed
            }
        }
    }

    async fn deliver(
        &self,
        encoded: &str,
        bucket: &BucketKey,
        actor_ids: Vec<String>,
    ) -> Result<Option<NotificationId>> {
        let meta_key = self.keys.meta(bucket);

        let entity_id = self
            .store
            .hash_get(&meta_key, meta_fields::ENTITY_ID)
            .await?;
        if entity_id.is_none() {
            warn!("bucket metadata has no entity id");
        }

        let overflow = self
            .store
            .hash_get(&meta_key, meta_fields::OVERFLOW)
            .await?
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);

        let request = AggregateRequest {
            recipient_id: bucket.recipient_id.clone(),
            observed_count: actor_ids.len() as u64 + overflow,
            actor_ids,
            event_type: bucket.event_type,
            subject_id: bucket.subject_id.clone(),
            entity_id,
            dedup_key: encoded.to_string(),
        };

        self.builder.build_and_deliver(request).await
    }

    // A failed delete leaves state that expires on its own; the dedup key
    // absorbs a repeat flush before then.
    async fn cleanup(&self, encoded: &str, bucket: &BucketKey) {
        for key in [self.keys.actors(bucket), self.keys.meta(bucket)] {
            if let Err(e) = self.store.delete(&key).await {
                warn!(key = %key, error = %e, "failed to delete bucket state");
            }
        }
        self.unregister(encoded).await;
    }

    async fn unregister(&self, encoded: &str) {
        if let Err(e) = self.store.set_remove(&self.keys.registry(), encoded).await {
            warn!(key = %encoded, error = %e, "failed to remove registry entry");
        }
    }
}
