// Server mode - notification aggregation HTTP service
//
// Runs anywhere a single binary runs (containers, VMs, local development).
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Event ingestion into time-windowed buckets
// - Background flush scheduler guarded by a cluster-wide lock
// - Structured logging with tracing
// - Graceful shutdown

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use notifagg_config::RuntimeConfig;
use notifagg_core::{KeySpace, SystemClock};
use notifagg_engine::{EventIngestor, FlushCoordinator, FlushOutcome};
use notifagg_store::BucketStore;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod handlers;
mod init;
mod profiles;
mod push;
mod repository;
mod scheduler;

use handlers::{handle_event, handle_flush, health_check, list_notifications, ready_check};
pub use init::{build_services, engine_config, init_tracing, Services};
pub use repository::{NotificationRepository, StoredNotification};

/// Application state shared across all requests
#[derive(Clone)]
pub(crate) struct AppState {
    pub ingestor: Arc<EventIngestor>,
    pub coordinator: Arc<FlushCoordinator>,
    pub repository: Arc<NotificationRepository>,
    pub store: Arc<dyn BucketStore>,
    pub keys: KeySpace,
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {:?}", self.error);
        } else {
            warn!("Rejected request: {}", self.error);
        }
        (
            self.status,
            Json(json!({
                "error": self.error.to_string(),
            })),
        )
            .into_response()
    }
}

impl AppError {
    pub fn bad_request<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
        }
    }
}

/// Build the HTTP router over already-wired services
pub fn router(services: &Services) -> Router {
    let state = AppState {
        ingestor: services.ingestor.clone(),
        coordinator: services.coordinator.clone(),
        repository: services.repository.clone(),
        store: services.store.clone(),
        keys: services.engine.key_space(),
    };

    Router::new()
        .route("/v1/events", post(handle_event))
        .route("/v1/flush", post(handle_flush))
        .route("/v1/notifications/:recipient", get(list_notifications))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode (loads config automatically)
pub async fn run() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    run_with_config(config).await
}

/// Entry point for server mode with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    info!("Server mode - notification aggregation service");

    let addr = config.server.listen_addr.clone();
    let services = build_services(&config, Arc::new(SystemClock))?;
    let app = router(&services);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Notification aggregation endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/v1/events                   - Record an interaction", addr);
    info!("  POST http://{}/v1/flush                    - Run a flush cycle now", addr);
    info!("  GET  http://{}/v1/notifications/:recipient - List notifications", addr);
    info!("  GET  http://{}/health                      - Health check", addr);
    info!("  GET  http://{}/ready                       - Readiness check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush_handle = if config.flush.enabled {
        info!(
            "Background flush enabled (interval={}s concurrency={})",
            config.flush.interval_secs, config.flush.concurrency
        );
        Some(tokio::spawn(scheduler::run_flush_loop(
            services.coordinator.clone(),
            services.store.clone(),
            config.flush.interval(),
            shutdown_rx,
        )))
    } else {
        info!("Background flush disabled by configuration");
        None
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Signal background task to stop and wait for it
    let _ = shutdown_tx.send(true);
    if let Some(handle) = flush_handle {
        let _ = handle.await;
    }

    flush_closed_buckets(&services).await;

    info!("Server shutdown complete");

    Ok(())
}

/// Bucket state lives in process memory; deliver whatever is already due
/// before it is lost.
async fn flush_closed_buckets(services: &Services) {
    match services.coordinator.flush_due_buckets().await {
        Ok(FlushOutcome::Completed(report)) if report.flushed > 0 => {
            info!(flushed = report.flushed, "Flushed closed buckets before shutdown");
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "Failed to flush closed buckets during shutdown");
        }
    }
}
