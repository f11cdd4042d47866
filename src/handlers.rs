// HTTP request handlers for server mode
//
// Implements event ingestion, on-demand flushing, notification listing and
// health check endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use notifagg_core::{EventType, InteractionEvent};
use notifagg_engine::{ActorDisposition, FlushOutcome};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{AppError, AppState};

/// Body of `POST /v1/events`; the event type is parsed by hand so an unknown
/// type is a 400 rather than a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    recipient_id: String,
    actor_id: String,
    event_type: String,
    subject_id: String,
    entity_id: String,
}

impl EventRequest {
    fn into_event(self) -> Result<InteractionEvent, AppError> {
        let event_type: EventType = self.event_type.parse().map_err(AppError::bad_request)?;

        for (field, value) in [
            ("recipientId", &self.recipient_id),
            ("actorId", &self.actor_id),
            ("subjectId", &self.subject_id),
        ] {
            if value.is_empty() {
                return Err(AppError::bad_request(anyhow::anyhow!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        Ok(InteractionEvent {
            recipient_id: self.recipient_id,
            actor_id: self.actor_id,
            event_type,
            subject_id: self.subject_id,
            entity_id: self.entity_id,
        })
    }
}

/// POST /v1/events - record one interaction event
pub(crate) async fn handle_event(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Response, AppError> {
    counter!("notifagg.http.events", 1);

    let request: EventRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("invalid event body: {}", e)))?;
    let event = request.into_event()?;

    // Ingestion never fails the caller; store trouble shows up as recorded=false
    let recorded = match state.ingestor.record_event_best_effort(&event).await {
        Some(outcome) => outcome.disposition != ActorDisposition::SelfInteraction,
        None => false,
    };

    debug!(
        recipient_id = %event.recipient_id,
        event_type = %event.event_type,
        recorded,
        "event accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(json!({ "recorded": recorded }))).into_response())
}

/// POST /v1/flush - run one flush cycle now
pub(crate) async fn handle_flush(State(state): State<AppState>) -> Result<Response, AppError> {
    // Runs detached: a client disconnect must not cancel a cycle holding the lock
    let coordinator = state.coordinator.clone();
    let outcome = tokio::spawn(async move { coordinator.flush_due_buckets().await })
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;

    match outcome {
        FlushOutcome::Completed(report) => Ok((StatusCode::OK, Json(report)).into_response()),
        FlushOutcome::LockHeld => {
            Ok((StatusCode::OK, Json(json!({"status": "lock_held"}))).into_response())
        }
    }
}

/// GET /v1/notifications/:recipient - persisted notifications for a recipient
pub(crate) async fn list_notifications(
    State(state): State<AppState>,
    Path(recipient): Path<String>,
) -> impl IntoResponse {
    let notifications = state.repository.list_for_recipient(&recipient);
    Json(json!({
        "recipientId": recipient,
        "notifications": notifications,
    }))
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// GET /ready - Readiness check (reads the bucket registry)
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.set_card(&state.keys.registry()).await {
        Ok(registered) => (
            StatusCode::OK,
            Json(json!({"status": "ready", "store": "connected", "registeredBuckets": registered})),
        ),
        Err(e) => {
            warn!("Bucket store readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "not ready", "store": "disconnected", "error": e.to_string()})),
            )
        }
    }
}
