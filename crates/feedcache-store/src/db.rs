//! SQLite store handle: open, configure, and migrate the backing file.
//!
//! A [`StoreHandle`] is either fully usable or was never returned: the
//! schema is loaded, the file opened (created if absent), pragmas applied
//! and migrations run before [`StoreHandle::open`] returns `Ok`.
//!
//! The handle is not shared. Once built it is moved into the store's
//! worker thread, which is the only code that touches it afterwards.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::migration;
use crate::schema::{Schema, SchemaSource};

/// Pseudo-path reported for in-memory stores.
const MEMORY_PATH: &str = ":memory:";

/// Exclusive owner of the SQLite connection for one store.
pub struct StoreHandle {
    conn: Connection,
    path: PathBuf,
    schema_name: String,
    schema_version: u32,
}

impl StoreHandle {
    /// Open (or create) the file named by `config`, using the schema
    /// `config.schema` from `schemas`.
    pub fn open(config: &StoreConfig, schemas: &dyn SchemaSource) -> StoreResult<Self> {
        let started_at = Instant::now();
        let path = config.path.clone();
        info!(path = %path.display(), schema = %config.schema, "opening store");

        let schema = schemas.load(&config.schema)?;
        let conn = Connection::open(&path).map_err(|source| {
            error!(
                path = %path.display(),
                duration_ms = started_at.elapsed().as_millis() as u64,
                %source,
                "store open failed"
            );
            StoreError::StoreOpenFailed {
                path: path.clone(),
                source,
            }
        })?;

        let handle = Self::bootstrap(conn, path, config, &schema, true)?;
        info!(
            path = %handle.path.display(),
            schema_version = handle.schema_version,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "store opened"
        );
        Ok(handle)
    }

    /// Create a volatile store, useful for tests. Pragmas that only matter
    /// for files (journal mode, synchronous) are left at SQLite's defaults.
    pub fn open_in_memory(config: &StoreConfig, schemas: &dyn SchemaSource) -> StoreResult<Self> {
        debug!(schema = %config.schema, "opening in-memory store");
        let schema = schemas.load(&config.schema)?;
        let path = PathBuf::from(MEMORY_PATH);
        let conn = Connection::open_in_memory().map_err(|source| StoreError::StoreOpenFailed {
            path: path.clone(),
            source,
        })?;
        Self::bootstrap(conn, path, config, &schema, false)
    }

    fn bootstrap(
        mut conn: Connection,
        path: PathBuf,
        config: &StoreConfig,
        schema: &Schema,
        on_disk: bool,
    ) -> StoreResult<Self> {
        let open_failed = |e: StoreError| match e {
            StoreError::PersistenceFailure(source) => StoreError::StoreOpenFailed {
                path: path.clone(),
                source,
            },
            other => other,
        };

        apply_pragmas(&conn, config, on_disk)
            .map_err(|source| StoreError::StoreOpenFailed {
                path: path.clone(),
                source,
            })?;
        migration::run_all(&mut conn, schema).map_err(open_failed)?;
        let schema_version = migration::current_version(&conn).map_err(open_failed)?;

        Ok(Self {
            conn,
            path,
            schema_name: schema.name().to_string(),
            schema_version,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

// ── pragmas ──────────────────────────────────────────────────────────

fn apply_pragmas(conn: &Connection, config: &StoreConfig, on_disk: bool) -> rusqlite::Result<()> {
    debug!(
        journal_mode = %config.journal_mode,
        busy_timeout_ms = config.busy_timeout_ms,
        "applying SQLite pragmas"
    );

    if on_disk {
        conn.pragma_update(None, "journal_mode", config.journal_mode.as_pragma())?;
        conn.pragma_update(None, "synchronous", config.synchronous.as_pragma())?;
    }

    // Image rows cascade away with their cache row.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EmbeddedSchemas;

    #[test]
    fn open_in_memory_applies_schema() {
        let handle =
            StoreHandle::open_in_memory(&StoreConfig::default(), &EmbeddedSchemas::new()).unwrap();
        assert_eq!(handle.schema_name(), "feed_store");
        assert_eq!(handle.schema_version(), 1);

        let count: i64 = handle
            .connection()
            .query_row("SELECT count(*) FROM feed_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let handle =
            StoreHandle::open_in_memory(&StoreConfig::default(), &EmbeddedSchemas::new()).unwrap();
        let enabled: i64 = handle
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn open_creates_file_with_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.sqlite");

        let handle =
            StoreHandle::open(&StoreConfig::new(&path), &EmbeddedSchemas::new()).unwrap();
        assert!(path.exists());
        assert_eq!(handle.path(), path.as_path());

        let journal: String = handle
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal.to_lowercase(), "wal");
    }

    #[test]
    fn file_store_syncs_every_commit_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.sqlite");

        let handle =
            StoreHandle::open(&StoreConfig::new(&path), &EmbeddedSchemas::new()).unwrap();
        // 2 = FULL
        let level: i64 = handle
            .connection()
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        assert_eq!(level, 2);
    }

    #[test]
    fn relaxed_synchronous_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("feed.sqlite"))
            .with_synchronous(crate::config::Synchronous::Normal);

        let handle = StoreHandle::open(&config, &EmbeddedSchemas::new()).unwrap();
        let level: i64 = handle
            .connection()
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        assert_eq!(level, 1);
    }

    #[test]
    fn missing_schema_fails_before_creating_anything() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("feed.sqlite")).with_schema("nope");

        let err = StoreHandle::open(&config, &EmbeddedSchemas::new())
            .err()
            .expect("open should fail");
        assert!(matches!(err, StoreError::SchemaNotFound { .. }));
        assert!(!config.path.exists());
    }

    #[test]
    fn unopenable_path_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("missing-dir").join("feed.sqlite"));

        let err = StoreHandle::open(&config, &EmbeddedSchemas::new())
            .err()
            .expect("open should fail");
        assert!(matches!(err, StoreError::StoreOpenFailed { .. }));
    }

    #[test]
    fn non_database_file_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.sqlite");
        std::fs::write(&path, vec![b'x'; 8192]).unwrap();

        let err = StoreHandle::open(&StoreConfig::new(&path), &EmbeddedSchemas::new())
            .err()
            .expect("open should fail");
        assert!(matches!(err, StoreError::StoreOpenFailed { .. }));
    }
}
