//! In-process fakes for the engine's collaborators
//!
//! `Harness` wires an ingestor and a flush coordinator to:
//! - a `FaultyStore` (MemoryStore with switchable failures)
//! - a `ManualClock`
//! - recording persistence, profile and push fakes

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use notifagg_core::{EventType, InteractionEvent, ManualClock};
use notifagg_engine::{
    ActorProfile, AggregateBuilder, AggregateRecord, AggregateStore, EngineConfig, EventIngestor,
    FlushCoordinator, NewNotification, NotificationId, NotificationStore, ProfileResolver,
    PushDelivery, PushMessage, PushReceipt,
};
use notifagg_store::{BucketStore, MemoryStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const WINDOW: Duration = Duration::from_secs(120);

pub fn like(recipient: &str, actor: &str, post: &str) -> InteractionEvent {
    event(recipient, actor, EventType::Like, post)
}

pub fn event(
    recipient: &str,
    actor: &str,
    event_type: EventType,
    subject: &str,
) -> InteractionEvent {
    InteractionEvent {
        recipient_id: recipient.to_string(),
        actor_id: actor.to_string(),
        event_type,
        subject_id: subject.to_string(),
        entity_id: format!("entity-{}", subject),
    }
}

/// Notification persistence that honours `dedup_key`
#[derive(Default)]
pub struct FakeNotifications {
    records: Mutex<Vec<(NotificationId, NewNotification)>>,
    by_dedup: Mutex<HashMap<String, NotificationId>>,
    pub fail: AtomicBool,
}

impl FakeNotifications {
    pub fn records(&self) -> Vec<(NotificationId, NewNotification)> {
        self.records.lock().clone()
    }

    pub fn contents(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|(_, n)| n.content.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationStore for FakeNotifications {
    async fn create_notification(&self, notification: NewNotification) -> Result<NotificationId> {
        // Let other tasks interleave mid-flush
        tokio::task::yield_now().await;

        if self.fail.load(Ordering::SeqCst) {
            bail!("notification database unavailable");
        }

        let mut by_dedup = self.by_dedup.lock();
        if let Some(existing) = by_dedup.get(&notification.dedup_key) {
            return Ok(existing.clone());
        }

        let mut records = self.records.lock();
        let id = NotificationId(format!("n-{}", records.len() + 1));
        by_dedup.insert(notification.dedup_key.clone(), id.clone());
        records.push((id.clone(), notification));
        Ok(id)
    }
}

#[derive(Default)]
pub struct FakeAggregates {
    records: Mutex<Vec<AggregateRecord>>,
    pub fail: AtomicBool,
}

impl FakeAggregates {
    pub fn records(&self) -> Vec<AggregateRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AggregateStore for FakeAggregates {
    async fn record_aggregate(&self, record: AggregateRecord) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("aggregate table unavailable");
        }
        self.records.lock().push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProfiles {
    names: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<(Vec<String>, usize)>>,
    pub fail: AtomicBool,
}

impl FakeProfiles {
    pub fn insert(&self, id: &str, name: &str) {
        self.names.lock().insert(id.to_string(), name.to_string());
    }

    pub fn requests(&self) -> Vec<(Vec<String>, usize)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ProfileResolver for FakeProfiles {
    async fn resolve_display_names(
        &self,
        actor_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ActorProfile>> {
        self.requests.lock().push((actor_ids.to_vec(), limit));
        if self.fail.load(Ordering::SeqCst) {
            bail!("profile service timed out");
        }
        let names = self.names.lock();
        Ok(actor_ids
            .iter()
            .take(limit)
            .filter_map(|id| {
                names.get(id).map(|name| ActorProfile {
                    id: id.clone(),
                    display_name: name.clone(),
                    avatar_url: None,
                })
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakePush {
    messages: Mutex<Vec<PushMessage>>,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
}

impl FakePush {
    pub fn messages(&self) -> Vec<PushMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl PushDelivery for FakePush {
    async fn send_push(&self, message: PushMessage) -> Result<PushReceipt> {
        if self.panic.load(Ordering::SeqCst) {
            panic!("push client crashed");
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("push gateway returned 503");
        }
        self.messages.lock().push(message);
        Ok(PushReceipt::Delivered)
    }
}

/// MemoryStore with injectable failures
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Every operation fails
    pub unavailable: AtomicBool,
    /// `set_members` fails for keys containing this fragment
    fail_members_matching: Mutex<Option<String>>,
}

impl FaultyStore {
    pub fn fail_members_matching(&self, fragment: &str) {
        *self.fail_members_matching.lock() = Some(fragment.to_string());
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BucketStore for FaultyStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_add(key, member).await
    }

    async fn set_card(&self, key: &str) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.set_card(key).await
    }

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_is_member(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        if let Some(fragment) = self.fail_members_matching.lock().as_deref() {
            if key.contains(fragment) {
                return Err(StoreError::Unavailable("read timed out".to_string()));
            }
        }
        self.inner.set_members(key).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_remove(key, member).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.hash_get(key, field).await
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.check()?;
        self.inner.hash_incr(key, field, delta).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl).await
    }
}

pub struct Harness {
    pub config: EngineConfig,
    pub store: Arc<FaultyStore>,
    pub clock: Arc<ManualClock>,
    pub notifications: Arc<FakeNotifications>,
    pub aggregates: Arc<FakeAggregates>,
    pub profiles: Arc<FakeProfiles>,
    pub push: Arc<FakePush>,
    pub ingestor: EventIngestor,
    pub coordinator: FlushCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig {
            window: WINDOW,
            ..Default::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(FaultyStore::default());
        let clock = Arc::new(ManualClock::new(0));
        let notifications = Arc::new(FakeNotifications::default());
        let aggregates = Arc::new(FakeAggregates::default());
        let profiles = Arc::new(FakeProfiles::default());
        let push = Arc::new(FakePush::default());

        let builder = Arc::new(AggregateBuilder::new(
            notifications.clone(),
            aggregates.clone(),
            profiles.clone(),
            push.clone(),
            config.resolve_limit,
        ));
        let ingestor = EventIngestor::new(store.clone(), clock.clone(), config.clone());
        let coordinator =
            FlushCoordinator::new(store.clone(), clock.clone(), builder, config.clone());

        Self {
            config,
            store,
            clock,
            notifications,
            aggregates,
            profiles,
            push,
            ingestor,
            coordinator,
        }
    }

    pub async fn record(&self, event: &InteractionEvent) {
        self.ingestor
            .record_event(event)
            .await
            .expect("event should be recorded");
    }

    /// Move the clock past the current window so its buckets become due
    pub fn close_window(&self) {
        self.clock.advance(self.config.window);
    }

    pub async fn registry(&self) -> Vec<String> {
        let keys = self.config.key_space();
        self.store
            .inner
            .set_members(&keys.registry())
            .await
            .expect("registry readable")
    }
}
