// In-process notification repository
//
// System of record for the reference service: persisted notifications and the
// aggregate metadata linked to them. Creates are idempotent on dedup_key.

use anyhow::{bail, Result};
use async_trait::async_trait;
use notifagg_engine::{
    AggregateRecord, AggregateStore, NewNotification, NotificationId, NotificationStore,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// A persisted notification together with its aggregate metadata, if recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNotification {
    pub id: NotificationId,
    #[serde(flatten)]
    pub notification: NewNotification,
    pub aggregate: Option<AggregateSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub actor_ids: Vec<String>,
    pub count: u64,
}

#[derive(Default)]
struct Inner {
    notifications: Vec<StoredNotification>,
    by_dedup_key: HashMap<String, usize>,
    by_id: HashMap<NotificationId, usize>,
}

#[derive(Default)]
pub struct NotificationRepository {
    inner: RwLock<Inner>,
}

impl NotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifications for `recipient_id`, newest first
    pub fn list_for_recipient(&self, recipient_id: &str) -> Vec<StoredNotification> {
        self.inner
            .read()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.notification.recipient_id == recipient_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn create_notification(&self, notification: NewNotification) -> Result<NotificationId> {
        let mut inner = self.inner.write();

        if let Some(&idx) = inner.by_dedup_key.get(&notification.dedup_key) {
            let existing = inner.notifications[idx].id.clone();
            debug!(notification_id = %existing, dedup_key = %notification.dedup_key, "notification already exists");
            return Ok(existing);
        }

        let idx = inner.notifications.len();
        let id = NotificationId(Uuid::new_v4().to_string());
        inner
            .by_dedup_key
            .insert(notification.dedup_key.clone(), idx);
        inner.by_id.insert(id.clone(), idx);
        inner.notifications.push(StoredNotification {
            id: id.clone(),
            notification,
            aggregate: None,
        });
        Ok(id)
    }
}

#[async_trait]
impl AggregateStore for NotificationRepository {
    async fn record_aggregate(&self, record: AggregateRecord) -> Result<()> {
        let mut inner = self.inner.write();
        let Some(&idx) = inner.by_id.get(&record.notification_id) else {
            bail!("unknown notification id {}", record.notification_id);
        };
        inner.notifications[idx].aggregate = Some(AggregateSummary {
            actor_ids: record.actor_ids,
            count: record.count,
        });
        Ok(())
    }
}
