// Initialization utilities for server mode
//
// Engine wiring and logging/tracing setup

use anyhow::Result;
use notifagg_config::{LogFormat, RuntimeConfig};
use notifagg_core::Clock;
use notifagg_engine::{
    AggregateBuilder, EngineConfig, EventIngestor, FlushCoordinator, PushDelivery,
};
use notifagg_store::MemoryStore;
use std::sync::Arc;
use tracing::info;

use crate::profiles::DirectoryResolver;
use crate::push::{LogPush, WebhookPush};
use crate::repository::NotificationRepository;

/// Everything a worker needs to serve requests and run flush cycles
#[derive(Clone)]
pub struct Services {
    pub store: Arc<MemoryStore>,
    pub repository: Arc<NotificationRepository>,
    pub ingestor: Arc<EventIngestor>,
    pub coordinator: Arc<FlushCoordinator>,
    pub engine: EngineConfig,
}

pub fn engine_config(config: &RuntimeConfig) -> EngineConfig {
    let aggregation = &config.aggregation;
    EngineConfig {
        window: aggregation.window(),
        max_actors: aggregation.max_actors,
        bucket_ttl: aggregation.bucket_ttl(),
        lock_ttl: aggregation.lock_ttl(),
        key_prefix: aggregation.key_prefix.clone(),
        resolve_limit: aggregation.resolve_limit,
        flush_concurrency: config.flush.concurrency,
    }
}

fn init_push(config: &RuntimeConfig) -> Result<Arc<dyn PushDelivery>> {
    match &config.push.webhook_url {
        Some(url) => {
            info!("Push delivery via webhook: {}", url);
            Ok(Arc::new(WebhookPush::new(url.clone(), config.push.timeout())?))
        }
        None => {
            info!("No push webhook configured - pushes are logged only");
            Ok(Arc::new(LogPush))
        }
    }
}

/// Build the store, repository and engine components from RuntimeConfig
pub fn build_services(config: &RuntimeConfig, clock: Arc<dyn Clock>) -> Result<Services> {
    let engine = engine_config(config);
    info!(
        "Aggregation window={}s max_actors={} bucket_ttl={}s lock_ttl={}s prefix={}",
        engine.window.as_secs(),
        engine.max_actors,
        engine.bucket_ttl.as_secs(),
        engine.lock_ttl.as_secs(),
        engine.key_prefix
    );

    let store = Arc::new(MemoryStore::new());
    let repository = Arc::new(NotificationRepository::new());
    let profiles = Arc::new(DirectoryResolver::new(config.profiles.clone()));

    let builder = Arc::new(AggregateBuilder::new(
        repository.clone(),
        repository.clone(),
        profiles,
        init_push(config)?,
        engine.resolve_limit,
    ));

    let ingestor = Arc::new(EventIngestor::new(
        store.clone(),
        clock.clone(),
        engine.clone(),
    ));
    let coordinator = Arc::new(FlushCoordinator::new(
        store.clone(),
        clock,
        builder,
        engine.clone(),
    ));

    Ok(Services {
        store,
        repository,
        ingestor,
        coordinator,
        engine,
    })
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed
    let _ = match config.server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifagg_core::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_engine_config_from_runtime_config() {
        let mut config = RuntimeConfig::default();
        config.aggregation.window_secs = 300;
        config.aggregation.max_actors = 10;
        config.flush.concurrency = 4;

        let engine = engine_config(&config);
        assert_eq!(engine.window, Duration::from_secs(300));
        assert_eq!(engine.max_actors, 10);
        assert_eq!(engine.flush_concurrency, 4);
        assert_eq!(engine.key_prefix, "notifagg");
    }

    #[tokio::test]
    async fn test_build_services_without_webhook() {
        let services =
            build_services(&RuntimeConfig::default(), Arc::new(ManualClock::new(0))).unwrap();
        assert!(services.store.is_empty());
        assert!(services.repository.is_empty());
    }
}
