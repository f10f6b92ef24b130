//! Store configuration.
//!
//! [`StoreConfig`] controls where the backing file lives, which schema is
//! loaded, and the SQLite pragmas applied when the file is opened. Defaults
//! come from the [`Default`] implementation; a builder-style API lets
//! callers customise individual fields, and the struct deserializes from
//! TOML/JSON so it can be embedded in an application config file.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::schema::FEED_STORE_SCHEMA;

/// SQLite journal mode applied at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Write-ahead log.
    #[default]
    Wal,
    /// Rollback journal, deleted after each transaction.
    Delete,
    /// Journal held in memory only.
    Memory,
}

impl JournalMode {
    pub fn as_pragma(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Memory => "MEMORY",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pragma())
    }
}

/// SQLite `synchronous` level applied at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    Off,
    /// Safe with WAL: a power loss may drop the last commit, never corrupt.
    Normal,
    /// Every commit is synced before it returns.
    #[default]
    Full,
}

impl Synchronous {
    pub fn as_pragma(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// Configuration for a [`crate::SqliteFeedStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Location of the SQLite file. Created if absent.
    ///
    /// Default: **`feed-store.sqlite`**.
    pub path: PathBuf,

    /// Name of the schema requested from the schema source.
    ///
    /// Default: **`feed_store`**.
    pub schema: String,

    /// Directory to load schema files from instead of the embedded ones.
    ///
    /// Default: **none** (embedded schemas).
    pub schema_dir: Option<PathBuf>,

    /// How long SQLite waits on a locked file before failing, in
    /// milliseconds.
    ///
    /// Default: **5 000 ms**.
    pub busy_timeout_ms: u64,

    /// Default: **WAL**.
    pub journal_mode: JournalMode,

    /// Default: **FULL**.
    pub synchronous: Synchronous,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("feed-store.sqlite"),
            schema: FEED_STORE_SCHEMA.to_string(),
            schema_dir: None,
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::default(),
            synchronous: Synchronous::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration pointing at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, name: impl Into<String>) -> Self {
        self.schema = name.into();
        self
    }

    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    pub fn with_synchronous(mut self, level: Synchronous) -> Self {
        self.synchronous = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.schema, "feed_store");
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.journal_mode, JournalMode::Wal);
        assert_eq!(config.synchronous, Synchronous::Full);
        assert!(config.schema_dir.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = StoreConfig::new("/tmp/feed.sqlite")
            .with_schema("custom")
            .with_schema_dir("/etc/schemas")
            .with_busy_timeout_ms(250)
            .with_journal_mode(JournalMode::Delete)
            .with_synchronous(Synchronous::Normal);

        assert_eq!(config.path, PathBuf::from("/tmp/feed.sqlite"));
        assert_eq!(config.schema, "custom");
        assert_eq!(config.schema_dir, Some(PathBuf::from("/etc/schemas")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.journal_mode.as_pragma(), "DELETE");
        assert_eq!(config.synchronous.as_pragma(), "NORMAL");
    }

    #[test]
    fn deserializes_partial_json() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"path": "cache.db", "journal_mode": "memory"}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("cache.db"));
        assert_eq!(config.journal_mode, JournalMode::Memory);
        assert_eq!(config.schema, "feed_store");
    }
}
