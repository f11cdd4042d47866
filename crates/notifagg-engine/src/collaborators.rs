// Collaborator interfaces consumed by the engine
//
// Persistence, profile lookup and push transport live outside the engine.
// Implementations must be idempotent on `NewNotification::dedup_key`: a
// second create for the same key returns the id of the first record.

use anyhow::Result;
use async_trait::async_trait;
use notifagg_core::EventType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a persisted notification record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification record to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub recipient_id: String,
    /// First actor of the aggregate
    pub sender_id: String,
    pub entity_id: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub subject_id: String,
    /// Stable per bucket; repeated creates with the same key are no-ops
    pub dedup_key: String,
}

/// Aggregation metadata linked to a persisted notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub recipient_id: String,
    pub subject_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub notification_id: NotificationId,
    pub content: String,
    /// Actors retained by the bucket, at most the configured cap
    pub actor_ids: Vec<String>,
    /// Observed distinct actors, may exceed `actor_ids.len()`
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub recipient_id: String,
    pub entity_id: Option<String>,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

/// Outcome reported by a push transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushReceipt {
    Delivered,
    /// Transport accepted the call but chose not to deliver
    Dropped { reason: String },
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, notification: NewNotification) -> Result<NotificationId>;
}

#[async_trait]
pub trait AggregateStore: Send + Sync {
    async fn record_aggregate(&self, record: AggregateRecord) -> Result<()>;
}

#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// Resolve up to `limit` of `actor_ids`. Unknown actors are omitted.
    async fn resolve_display_names(
        &self,
        actor_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ActorProfile>>;
}

#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn send_push(&self, message: PushMessage) -> Result<PushReceipt>;
}
