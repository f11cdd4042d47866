// notifagg-config - Runtime configuration for the aggregation service
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from NOTIFAGG_CONFIG env var
// 3. Config file contents from NOTIFAGG_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.notifagg.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub flush: FlushConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Display-name directory: actor id -> display name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, String>,
}

/// Bucketing and locking parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub window_secs: u64,
    pub max_actors: usize,
    pub bucket_ttl_secs: u64,
    pub lock_ttl_secs: u64,
    pub key_prefix: String,
    /// How many actor profiles to resolve when composing content
    pub resolve_limit: usize,
}

impl AggregationConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn bucket_ttl(&self) -> Duration {
        Duration::from_secs(self.bucket_ttl_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_secs: 120,
            max_actors: 50,
            bucket_ttl_secs: 3600,
            lock_ttl_secs: 60,
            key_prefix: "notifagg".to_string(),
            resolve_limit: 2,
        }
    }
}

/// Flush scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Upper bound on buckets processed at once within one cycle
    pub concurrency: usize,
}

impl FlushConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            concurrency: 1,
        }
    }
}

/// Push delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Webhook receiving push payloads; log-only delivery when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
}

impl PushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 5_000,
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load from an explicit file (CLI --config), then apply env overrides
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse TOML content, then apply env overrides
    pub fn load_from_str(content: &str) -> Result<Self> {
        sources::load_from_str(content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
