//! Schema definitions and where they are loaded from.
//!
//! A [`Schema`] is a named, ordered list of [`Migration`]s. Stores never
//! look a schema up on their own: the caller hands a [`SchemaSource`] to
//! [`crate::SqliteFeedStore::open`], which asks it for the schema by name.
//!
//! Two sources ship with the crate:
//!
//! - [`EmbeddedSchemas`]: SQL compiled into the binary.
//! - [`DirectorySchemas`]: SQL files read from disk, laid out as
//!   `<root>/<schema name>/<version>_<description>.sql`
//!   (e.g. `schemas/feed_store/0001_feed_cache.sql`).

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Name of the schema used by the feed cache.
pub const FEED_STORE_SCHEMA: &str = "feed_store";

/// A single migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    pub version: u32,
    /// Human-readable description.
    pub description: Cow<'static, str>,
    /// Raw SQL to execute. May contain multiple statements.
    pub sql: Cow<'static, str>,
}

impl Migration {
    pub const fn embedded(version: u32, description: &'static str, sql: &'static str) -> Self {
        Self {
            version,
            description: Cow::Borrowed(description),
            sql: Cow::Borrowed(sql),
        }
    }
}

/// A named, validated list of migrations in version order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    migrations: Vec<Migration>,
}

impl Schema {
    /// Build a schema, rejecting empty lists and non-increasing versions.
    pub fn new(name: impl Into<String>, migrations: Vec<Migration>) -> StoreResult<Self> {
        let name = name.into();

        if migrations.is_empty() {
            return Err(StoreError::InvalidSchema {
                name,
                reason: "schema has no migrations".into(),
            });
        }
        if migrations[0].version == 0 {
            return Err(StoreError::InvalidSchema {
                name,
                reason: "migration versions start at 1".into(),
            });
        }
        for window in migrations.windows(2) {
            if window[1].version <= window[0].version {
                return Err(StoreError::InvalidSchema {
                    name,
                    reason: format!(
                        "migration versions must be strictly increasing: {} >= {}",
                        window[0].version, window[1].version
                    ),
                });
            }
        }

        Ok(Self { name, migrations })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Version the database reaches once every migration has been applied.
    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map_or(0, |m| m.version)
    }
}

/// Somewhere schemas can be loaded from by name.
pub trait SchemaSource: Send + Sync {
    /// Load the schema called `name`.
    ///
    /// Returns [`StoreError::SchemaNotFound`] when the source has no such
    /// schema.
    fn load(&self, name: &str) -> StoreResult<Schema>;
}

impl<S: SchemaSource + ?Sized> SchemaSource for &S {
    fn load(&self, name: &str) -> StoreResult<Schema> {
        (**self).load(name)
    }
}

impl<S: SchemaSource + ?Sized> SchemaSource for Box<S> {
    fn load(&self, name: &str) -> StoreResult<Schema> {
        (**self).load(name)
    }
}

// ── embedded ─────────────────────────────────────────────────────────

static FEED_STORE_MIGRATIONS: &[Migration] = &[Migration::embedded(
    1,
    "feed cache and ordered feed images",
    include_str!("../schemas/feed_store/0001_feed_cache.sql"),
)];

/// Schemas compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSchemas {
    extra: Vec<Schema>,
}

impl EmbeddedSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional schema. It shadows a built-in one of the same name.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.extra.push(schema);
        self
    }
}

impl SchemaSource for EmbeddedSchemas {
    fn load(&self, name: &str) -> StoreResult<Schema> {
        if let Some(schema) = self.extra.iter().rev().find(|s| s.name() == name) {
            return Ok(schema.clone());
        }
        match name {
            FEED_STORE_SCHEMA => Schema::new(name, FEED_STORE_MIGRATIONS.to_vec()),
            _ => Err(StoreError::SchemaNotFound {
                name: name.to_string(),
            }),
        }
    }
}

// ── directory ────────────────────────────────────────────────────────

/// Schemas read from `.sql` files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySchemas {
    root: PathBuf,
}

impl DirectorySchemas {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SchemaSource for DirectorySchemas {
    fn load(&self, name: &str) -> StoreResult<Schema> {
        let dir = self.root.join(name);
        debug!(path = %dir.display(), "loading schema from directory");

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::SchemaNotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(invalid(name, format!("cannot read {}: {e}", dir.display()))),
        };

        let mut migrations = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| invalid(name, format!("cannot read {}: {e}", dir.display())))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            let (version, description) = parse_file_stem(stem).ok_or_else(|| {
                invalid(
                    name,
                    format!(
                        "migration file `{}` is not named <version>_<description>.sql",
                        path.display()
                    ),
                )
            })?;
            let sql = fs::read_to_string(&path)
                .map_err(|e| invalid(name, format!("cannot read {}: {e}", path.display())))?;

            migrations.push(Migration {
                version,
                description: Cow::Owned(description.replace('_', " ")),
                sql: Cow::Owned(sql),
            });
        }

        if migrations.is_empty() {
            return Err(StoreError::SchemaNotFound {
                name: name.to_string(),
            });
        }

        migrations.sort_by_key(|m| m.version);
        Schema::new(name, migrations)
    }
}

fn parse_file_stem(stem: &str) -> Option<(u32, &str)> {
    let (version, description) = stem.split_once('_')?;
    let version = version.parse().ok()?;
    if description.is_empty() {
        return None;
    }
    Some((version, description))
}

fn invalid(name: &str, reason: String) -> StoreError {
    StoreError::InvalidSchema {
        name: name.to_string(),
        reason,
    }
}
