// Event ingestion
//
// Records one interaction into its bucket. The actor set is capped at
// `max_actors`; actors rejected by the cap still bump the bucket's overflow
// counter so the final count reflects them.

use metrics::counter;
use notifagg_core::{meta_fields, BucketKey, Clock, InteractionEvent, KeySpace, WindowId};
use notifagg_store::BucketStore;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{EngineConfig, EngineError, Result};

/// What happened to the actor of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorDisposition {
    Added,
    AlreadyPresent,
    /// Bucket was full; counted as overflow
    Capped,
    /// Actor and recipient are the same user; nothing was written
    SelfInteraction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub bucket: BucketKey,
    pub disposition: ActorDisposition,
}

pub struct EventIngestor {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    config: EngineConfig,
}

impl EventIngestor {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            keys: config.key_space(),
            config,
        }
    }

    /// Record an interaction into the bucket for the current window.
    pub async fn record_event(&self, event: &InteractionEvent) -> Result<RecordOutcome> {
        validate_event(event)?;

        let window = WindowId::at(self.clock.now_millis(), self.config.window);
        let bucket = BucketKey::new(
            event.recipient_id.clone(),
            event.event_type,
            event.subject_id.clone(),
            window,
        );

        if event.actor_id == event.recipient_id {
            debug!(bucket = %bucket, "skipping self-interaction");
            return Ok(RecordOutcome {
                bucket,
                disposition: ActorDisposition::SelfInteraction,
            });
        }

        let actors_key = self.keys.actors(&bucket);
        let meta_key = self.keys.meta(&bucket);

        let disposition = self
            .admit_actor(&actors_key, &meta_key, &event.actor_id)
            .await?;

        self.store
            .hash_set(&meta_key, meta_fields::ENTITY_ID, &event.entity_id)
            .await?;
        self.store
            .set_add(&self.keys.registry(), &bucket.encode())
            .await?;

        let ttl = self.config.bucket_ttl;
        self.store.expire(&actors_key, ttl).await?;
        self.store.expire(&meta_key, ttl).await?;

        counter!("notifagg.ingest.events", 1, "type" => event.event_type.as_str());
        if disposition == ActorDisposition::Capped {
            counter!("notifagg.ingest.capped", 1);
        }

        debug!(
            bucket = %bucket,
            actor_id = %event.actor_id,
            disposition = ?disposition,
            "recorded event"
        );

        Ok(RecordOutcome {
            bucket,
            disposition,
        })
    }

    /// Like [`record_event`](Self::record_event) but never fails; store errors
    /// are logged and counted. For callers whose primary write must not be
    /// affected by notification bookkeeping.
    pub async fn record_event_best_effort(&self, event: &InteractionEvent) -> Option<RecordOutcome> {
        match self.record_event(event).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                counter!("notifagg.ingest.failures", 1);
                warn!(
                    error = %e,
                    recipient_id = %event.recipient_id,
                    actor_id = %event.actor_id,
                    event_type = %event.event_type,
                    "dropping interaction event"
                );
                None
            }
        }
    }

    async fn admit_actor(
        &self,
        actors_key: &str,
        meta_key: &str,
        actor_id: &str,
    ) -> Result<ActorDisposition> {
        let cap = self.config.max_actors;

        if self.store.set_card(actors_key).await? < cap {
            if !self.store.set_add(actors_key, actor_id).await? {
                return Ok(ActorDisposition::AlreadyPresent);
            }
            // Concurrent ingestors can both pass the size check for the last slot
            if self.store.set_card(actors_key).await? > cap {
                self.store.set_remove(actors_key, actor_id).await?;
                self.store
                    .hash_incr(meta_key, meta_fields::OVERFLOW, 1)
                    .await?;
                return Ok(ActorDisposition::Capped);
            }
            return Ok(ActorDisposition::Added);
        }

        if self.store.set_is_member(actors_key, actor_id).await? {
            return Ok(ActorDisposition::AlreadyPresent);
        }

        self.store
            .hash_incr(meta_key, meta_fields::OVERFLOW, 1)
            .await?;
        Ok(ActorDisposition::Capped)
    }
}

fn validate_event(event: &InteractionEvent) -> Result<()> {
    let fields = [
        ("recipientId", &event.recipient_id),
        ("actorId", &event.actor_id),
        ("subjectId", &event.subject_id),
    ];
    for (name, value) in fields {
        if value.is_empty() {
            return Err(EngineError::InvalidEvent(format!("{} must not be empty", name)));
        }
    }
    Ok(())
}
