// Aggregate building and delivery
//
// Turns the actors of one closed bucket into a persisted notification, an
// aggregate record and a best-effort push.

use metrics::counter;
use notifagg_core::{compose_content, EventType, FALLBACK_NAME};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collaborators::{
    AggregateRecord, AggregateStore, NewNotification, NotificationId, NotificationStore,
    ProfileResolver, PushDelivery, PushMessage, PushReceipt,
};
use crate::{EngineError, Result};

/// Everything the builder needs to know about one flushed bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRequest {
    pub recipient_id: String,
    /// Retained actors, earliest first
    pub actor_ids: Vec<String>,
    pub event_type: EventType,
    pub subject_id: String,
    pub entity_id: Option<String>,
    /// Distinct actors observed, including those rejected by the cap
    pub observed_count: u64,
    pub dedup_key: String,
}

pub struct AggregateBuilder {
    notifications: Arc<dyn NotificationStore>,
    aggregates: Arc<dyn AggregateStore>,
    profiles: Arc<dyn ProfileResolver>,
    push: Arc<dyn PushDelivery>,
    resolve_limit: usize,
}

impl AggregateBuilder {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        aggregates: Arc<dyn AggregateStore>,
        profiles: Arc<dyn ProfileResolver>,
        push: Arc<dyn PushDelivery>,
        resolve_limit: usize,
    ) -> Self {
        Self {
            notifications,
            aggregates,
            profiles,
            push,
            resolve_limit: resolve_limit.max(1),
        }
    }

    /// Persist and deliver the aggregate. Returns `None` for an empty actor
    /// list. Push failures are logged and never fail the call.
    pub async fn build_and_deliver(
        &self,
        request: AggregateRequest,
    ) -> Result<Option<NotificationId>> {
        let Some(leading_actor) = request.actor_ids.first().cloned() else {
            return Ok(None);
        };

        let leading_name = self.leading_name(&request.actor_ids, &leading_actor).await?;
        let total = request.observed_count.max(request.actor_ids.len() as u64);
        let content = compose_content(&leading_name, total, request.event_type);

        let notification_id = self
            .notifications
            .create_notification(NewNotification {
                recipient_id: request.recipient_id.clone(),
                sender_id: leading_actor,
                entity_id: request.entity_id.clone(),
                content: content.clone(),
                event_type: request.event_type,
                subject_id: request.subject_id.clone(),
                dedup_key: request.dedup_key.clone(),
            })
            .await
            .map_err(|e| EngineError::collaborator("create_notification", e))?;

        self.aggregates
            .record_aggregate(AggregateRecord {
                recipient_id: request.recipient_id.clone(),
                subject_id: request.subject_id.clone(),
                event_type: request.event_type,
                notification_id: notification_id.clone(),
                content: content.clone(),
                actor_ids: request.actor_ids.clone(),
                count: total,
            })
            .await
            .map_err(|e| EngineError::collaborator("record_aggregate", e))?;

        self.deliver_push(&request, &notification_id, content, total)
            .await;

        Ok(Some(notification_id))
    }

    async fn leading_name(&self, actor_ids: &[String], leading_actor: &str) -> Result<String> {
        let wanted = &actor_ids[..actor_ids.len().min(self.resolve_limit)];
        let profiles = self
            .profiles
            .resolve_display_names(wanted, self.resolve_limit)
            .await
            .map_err(|e| EngineError::collaborator("resolve_profiles", e))?;

        let name = profiles
            .into_iter()
            .find(|p| p.id == leading_actor)
            .map(|p| p.display_name)
            .filter(|name| !name.is_empty());

        Ok(name.unwrap_or_else(|| {
            debug!(actor_id = %leading_actor, "no profile for leading actor");
            FALLBACK_NAME.to_string()
        }))
    }

    async fn deliver_push(
        &self,
        request: &AggregateRequest,
        notification_id: &NotificationId,
        body: String,
        total: u64,
    ) {
        let message = PushMessage {
            recipient_id: request.recipient_id.clone(),
            entity_id: request.entity_id.clone(),
            title: request.event_type.push_title().to_string(),
            body,
            payload: json!({
                "notificationId": notification_id,
                "type": request.event_type,
                "subjectId": request.subject_id,
                "count": total,
            }),
        };

        match self.push.send_push(message).await {
            Ok(PushReceipt::Delivered) => {
                counter!("notifagg.push.delivered", 1);
            }
            Ok(PushReceipt::Dropped { reason }) => {
                debug!(notification_id = %notification_id, %reason, "push dropped by transport");
            }
            Err(e) => {
                counter!("notifagg.push.failures", 1);
                warn!(
                    notification_id = %notification_id,
                    recipient_id = %request.recipient_id,
                    error = %e,
                    "push delivery failed"
                );
            }
        }
    }
}
