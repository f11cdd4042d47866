use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "NOTIFAGG_";

/// Abstraction over environment-variable lookups so tests (and embedders
/// without a process environment) can supply their own source of overrides.
pub trait EnvSource {
    /// Get a variable by its name without the NOTIFAGG_ prefix
    fn get(&self, key: &str) -> Option<String>;
}

impl EnvSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Aggregation
    if let Some(val) = get_env_u64(env, "WINDOW_SECS")? {
        config.aggregation.window_secs = val;
    }
    if let Some(val) = get_env_usize(env, "MAX_ACTORS")? {
        config.aggregation.max_actors = val;
    }
    if let Some(val) = get_env_u64(env, "BUCKET_TTL_SECS")? {
        config.aggregation.bucket_ttl_secs = val;
    }
    if let Some(val) = get_env_u64(env, "LOCK_TTL_SECS")? {
        config.aggregation.lock_ttl_secs = val;
    }
    if let Some(prefix) = get_env_string(env, "KEY_PREFIX")? {
        config.aggregation.key_prefix = prefix;
    }
    if let Some(val) = get_env_usize(env, "RESOLVE_LIMIT")? {
        config.aggregation.resolve_limit = val;
    }

    // Flush scheduling
    if let Some(val) = get_env_bool(env, "FLUSH_ENABLED")? {
        config.flush.enabled = val;
    }
    if let Some(val) = get_env_u64(env, "FLUSH_INTERVAL_SECS")? {
        config.flush.interval_secs = val;
    }
    if let Some(val) = get_env_usize(env, "FLUSH_CONCURRENCY")? {
        config.flush.concurrency = val;
    }

    // Push delivery; an empty URL switches back to log-only delivery
    if let Some(url) = get_env_string(env, "PUSH_WEBHOOK_URL")? {
        config.push.webhook_url = if url.trim().is_empty() {
            None
        } else {
            Some(url)
        };
    }
    if let Some(val) = get_env_u64(env, "PUSH_TIMEOUT_MS")? {
        config.push.timeout_ms = val;
    }

    // Server configuration (listen addr, log level/format)
    if let Some(addr) = get_env_string(env, "LISTEN_ADDR")? {
        config.server.listen_addr = addr;
    }
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.server.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.server.log_format = format
            .parse::<LogFormat>()
            .context("Invalid NOTIFAGG_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = match val.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(anyhow!(
                        "Failed to parse {}{} (expected bool): {}",
                        ENV_PREFIX,
                        key,
                        other
                    ))
                }
            };
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
