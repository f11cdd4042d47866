// Configuration source loading.
//
// Priority order:
// 1. Environment variables (NOTIFAGG_* prefix)
// 2. Config file path from NOTIFAGG_CONFIG
// 3. Inline config content from NOTIFAGG_CONFIG_CONTENT
// 4. Default config files (./config.toml, ./.notifagg.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_PATHS: [&str; 2] = ["./config.toml", "./.notifagg.toml"];

/// Load configuration using the process environment and default file locations.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = load_from_file()?.unwrap_or_default();
    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var("NOTIFAGG_CONFIG") {
        return parse_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var("NOTIFAGG_CONFIG_CONTENT") {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from NOTIFAGG_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_PATHS {
        let path = Path::new(path);
        if path.exists() {
            return parse_file(path).map(Some);
        }
    }

    Ok(None)
}

fn parse_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let mut config = parse_file(path.as_ref())?;
    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

pub fn load_from_str(content: &str) -> Result<RuntimeConfig> {
    let mut config: RuntimeConfig =
        toml::from_str(content).context("Failed to parse TOML configuration")?;
    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [aggregation]
            window_secs = 300
            key_prefix = "test-prefix"

            [server]
            listen_addr = "127.0.0.1:9000"
            "#
        )
        .unwrap();

        let config = load_from_file_path(file.path()).unwrap();
        assert_eq!(config.aggregation.window_secs, 300);
        assert_eq!(config.aggregation.key_prefix, "test-prefix");
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_from_file_path("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_file_content_fails_validation() {
        let err = load_from_str("[aggregation]\nmax_actors = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_actors"));
    }
}
