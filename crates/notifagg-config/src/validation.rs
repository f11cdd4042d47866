// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_aggregation_config(&config.aggregation)?;
    validate_flush_config(&config.flush, &config.aggregation)?;
    validate_push_config(&config.push)?;
    validate_server_config(&config.server)?;
    Ok(())
}

fn validate_aggregation_config(config: &AggregationConfig) -> Result<()> {
    if config.window_secs == 0 {
        bail!("aggregation.window_secs must be greater than 0");
    }

    if config.max_actors == 0 {
        bail!("aggregation.max_actors must be greater than 0");
    }

    if config.lock_ttl_secs == 0 {
        bail!("aggregation.lock_ttl_secs must be greater than 0");
    }

    if config.resolve_limit == 0 {
        bail!("aggregation.resolve_limit must be at least 1");
    }

    // Buckets must outlive their own window or they expire before a flush sees them
    if config.bucket_ttl_secs <= config.window_secs {
        bail!(
            "aggregation.bucket_ttl_secs ({}) must be greater than aggregation.window_secs ({})",
            config.bucket_ttl_secs,
            config.window_secs
        );
    }

    if config.key_prefix.is_empty() {
        bail!("aggregation.key_prefix must not be empty");
    }

    if config.max_actors > 1_000 {
        warn!(
            max_actors = config.max_actors,
            "aggregation.max_actors is very large; flush cost grows with actor sets"
        );
    }

    Ok(())
}

fn validate_flush_config(config: &FlushConfig, aggregation: &AggregationConfig) -> Result<()> {
    if config.interval_secs == 0 {
        bail!("flush.interval_secs must be greater than 0");
    }

    if config.concurrency == 0 {
        bail!("flush.concurrency must be at least 1");
    }

    if aggregation.lock_ttl_secs < config.interval_secs.saturating_mul(2) {
        warn!(
            lock_ttl_secs = aggregation.lock_ttl_secs,
            interval_secs = config.interval_secs,
            "aggregation.lock_ttl_secs is shorter than two flush intervals; long cycles may overlap"
        );
    }

    Ok(())
}

fn validate_push_config(config: &PushConfig) -> Result<()> {
    if config.timeout_ms == 0 {
        bail!("push.timeout_ms must be greater than 0");
    }

    if let Some(raw) = &config.webhook_url {
        let parsed = url::Url::parse(raw)
            .map_err(|e| anyhow::anyhow!("push.webhook_url is not a valid URL ({}): {}", raw, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("push.webhook_url must use http or https, got '{}'", parsed.scheme());
        }
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}
