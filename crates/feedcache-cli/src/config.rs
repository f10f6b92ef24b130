//! CLI configuration loading.
//!
//! Sources, later ones winning:
//!   1. built-in defaults
//!   2. TOML file (`--config`, or `feedcache.toml` when present)
//!   3. environment (`.env` is loaded first): `FEEDCACHE_DB_PATH`, `FEEDCACHE_LOG`
//!   4. command-line flags (applied by the caller)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use feedcache_store::StoreConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "feedcache.toml";
const ENV_DB_PATH: &str = "FEEDCACHE_DB_PATH";
const ENV_LOG: &str = "FEEDCACHE_LOG";

/// Top-level CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub store: StoreConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            store: StoreConfig::new("data/feed.sqlite"),
        }
    }
}

impl CliConfig {
    /// Load from `explicit` if given, else from the default file if it
    /// exists, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            self.log_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcache_store::JournalMode;

    #[test]
    fn defaults_without_file() {
        let config = CliConfig::default();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.store.path, PathBuf::from("data/feed.sqlite"));
    }

    #[test]
    fn parses_toml() {
        let config = CliConfig::from_toml(
            r#"
            log_level = "debug"

            [store]
            path = "/var/lib/feedcache/feed.sqlite"
            journal_mode = "delete"
            busy_timeout_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.store.path,
            PathBuf::from("/var/lib/feedcache/feed.sqlite")
        );
        assert_eq!(config.store.journal_mode, JournalMode::Delete);
        assert_eq!(config.store.busy_timeout_ms, 100);
        assert_eq!(config.store.schema, "feed_store");
    }

    #[test]
    fn rejects_unknown_journal_mode() {
        assert!(CliConfig::from_toml("[store]\njournal_mode = \"fast\"").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = CliConfig::default();
        config.apply_env(|key| match key {
            ENV_DB_PATH => Some("/tmp/from-env.sqlite".to_string()),
            ENV_LOG => Some("trace".to_string()),
            _ => None,
        });

        assert_eq!(config.store.path, PathBuf::from("/tmp/from-env.sqlite"));
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = CliConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
