//! The feed store facade.
//!
//! [`SqliteFeedStore`] holds at most one [`CacheSnapshot`] (the *slot*) in a
//! SQLite file and exposes `retrieve`, `insert`, and `delete`. Every
//! operation is a task on the store's [`Worker`], so operations run one at
//! a time in call order no matter how many callers share the store.
//!
//! `insert` replaces the slot inside one transaction: the old rows are
//! removed, the new rows written, then the transaction commits. Any failure
//! rolls the whole transaction back, so the file keeps the previous
//! snapshot and never a partial one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, debug_span, warn, Instrument};

use crate::config::StoreConfig;
use crate::db::StoreHandle;
use crate::error::StoreResult;
use crate::mapper::{self, CacheRow, ImageRow};
use crate::model::{CacheSnapshot, FeedImageRecord};
use crate::schema::{DirectorySchemas, EmbeddedSchemas, SchemaSource};
use crate::worker::Worker;

/// Primary key of the only row `feed_cache` may hold.
const CACHE_ROW_ID: i64 = 1;

/// Asynchronous single-slot feed cache.
///
/// Each method queues its work when called and returns a future for the
/// result; the future resolves exactly once.
pub trait FeedStore: Send + Sync {
    /// The cached snapshot, or `None` when the slot is empty.
    fn retrieve(&self) -> BoxFuture<'static, StoreResult<Option<CacheSnapshot>>>;

    /// Replace the slot with `images` written at `timestamp`.
    fn insert(
        &self,
        images: Vec<FeedImageRecord>,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Empty the slot. Succeeds when it is already empty.
    fn delete(&self) -> BoxFuture<'static, StoreResult<()>>;
}

/// Summary of a store, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub path: PathBuf,
    pub schema: String,
    pub schema_version: u32,
    pub cached_at: Option<DateTime<Utc>>,
    pub image_count: usize,
}

/// [`FeedStore`] persisted in a SQLite file.
///
/// Cloning is cheap; clones share the same worker and file.
#[derive(Clone)]
pub struct SqliteFeedStore {
    worker: Arc<Worker>,
    path: PathBuf,
}

impl SqliteFeedStore {
    /// Open (or create) a store at `path` with default settings, loading the
    /// feed store schema from `schemas`.
    pub fn open(path: impl Into<PathBuf>, schemas: &dyn SchemaSource) -> StoreResult<Self> {
        Self::open_with_config(&StoreConfig::new(path), schemas)
    }

    /// Open (or create) a store described by `config`.
    pub fn open_with_config(config: &StoreConfig, schemas: &dyn SchemaSource) -> StoreResult<Self> {
        Self::start(StoreHandle::open(config, schemas)?)
    }

    /// Open a store using the schema source named by `config`: files under
    /// `config.schema_dir` if set, the embedded schemas otherwise.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        match &config.schema_dir {
            Some(dir) => Self::open_with_config(config, &DirectorySchemas::new(dir)),
            None => Self::open_with_config(config, &EmbeddedSchemas::new()),
        }
    }

    /// A store whose contents vanish when it is dropped.
    pub fn open_in_memory(schemas: &dyn SchemaSource) -> StoreResult<Self> {
        Self::start(StoreHandle::open_in_memory(
            &StoreConfig::default(),
            schemas,
        )?)
    }

    fn start(handle: StoreHandle) -> StoreResult<Self> {
        let path = handle.path().to_path_buf();
        let worker = Worker::spawn(handle)?;
        Ok(Self {
            worker: Arc::new(worker),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retrieve(&self) -> BoxFuture<'static, StoreResult<Option<CacheSnapshot>>> {
        self.worker
            .submit("retrieve", |handle| read_snapshot(handle.connection_mut()))
            .instrument(debug_span!("feed_store.retrieve"))
            .boxed()
    }

    pub fn insert(
        &self,
        images: Vec<FeedImageRecord>,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let span = debug_span!("feed_store.insert", images = images.len(), %timestamp);
        self.worker
            .submit("insert", move |handle| {
                replace_snapshot(handle.connection_mut(), &images, &timestamp)
            })
            .instrument(span)
            .boxed()
    }

    pub fn delete(&self) -> BoxFuture<'static, StoreResult<()>> {
        self.worker
            .submit("delete", |handle| {
                in_transaction(handle.connection_mut(), "delete", |tx| {
                    remove_snapshot(tx).map(|_| ())
                })
            })
            .instrument(debug_span!("feed_store.delete"))
            .boxed()
    }

    pub fn status(&self) -> BoxFuture<'static, StoreResult<StoreStatus>> {
        self.worker.submit("status", |handle| {
            let conn = handle.connection();
            let cached_at = conn
                .query_row(
                    "SELECT timestamp FROM feed_cache WHERE id = ?1",
                    [CACHE_ROW_ID],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .map(|raw| mapper::decode_timestamp(&raw))
                .transpose()?;
            let image_count: i64 = conn.query_row(
                "SELECT count(*) FROM feed_images WHERE cache_id = ?1",
                [CACHE_ROW_ID],
                |row| row.get(0),
            )?;

            Ok(StoreStatus {
                path: handle.path().to_path_buf(),
                schema: handle.schema_name().to_string(),
                schema_version: handle.schema_version(),
                cached_at,
                image_count: usize::try_from(image_count).unwrap_or_default(),
            })
        })
    }
}

impl FeedStore for SqliteFeedStore {
    fn retrieve(&self) -> BoxFuture<'static, StoreResult<Option<CacheSnapshot>>> {
        SqliteFeedStore::retrieve(self)
    }

    fn insert(
        &self,
        images: Vec<FeedImageRecord>,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        SqliteFeedStore::insert(self, images, timestamp)
    }

    fn delete(&self) -> BoxFuture<'static, StoreResult<()>> {
        SqliteFeedStore::delete(self)
    }
}

// ── tasks (run on the worker thread) ─────────────────────────────────

fn read_snapshot(conn: &mut Connection) -> StoreResult<Option<CacheSnapshot>> {
    // Deferred: both reads see the same committed state.
    let tx = conn.transaction()?;

    let cache = tx
        .query_row(
            "SELECT timestamp FROM feed_cache WHERE id = ?1",
            [CACHE_ROW_ID],
            |row| Ok(CacheRow { timestamp: row.get(0)? }),
        )
        .optional()?;

    let Some(cache) = cache else {
        debug!("feed cache is empty");
        return Ok(None);
    };

    let rows = {
        let mut stmt = tx.prepare(
            "SELECT position, image_id, description, location, url \
             FROM feed_images WHERE cache_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map([CACHE_ROW_ID], ImageRow::from_sql)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    tx.commit()?;

    let snapshot = mapper::rows_to_snapshot(cache, rows)?;
    debug!(images = snapshot.images.len(), "feed cache retrieved");
    Ok(Some(snapshot))
}

fn replace_snapshot(
    conn: &mut Connection,
    images: &[FeedImageRecord],
    timestamp: &DateTime<Utc>,
) -> StoreResult<()> {
    let (cache, rows) = mapper::snapshot_to_rows(images, timestamp);

    in_transaction(conn, "insert", |tx| {
        let removed = remove_snapshot(tx)?;
        if removed > 0 {
            debug!(removed, "previous feed cache removed");
        }

        tx.execute(
            "INSERT INTO feed_cache (id, timestamp) VALUES (?1, ?2)",
            rusqlite::params![CACHE_ROW_ID, cache.timestamp],
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO feed_images (cache_id, position, image_id, description, location, url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in &rows {
            stmt.execute(rusqlite::params![
                CACHE_ROW_ID,
                row.position,
                row.image_id,
                row.description,
                row.location,
                row.url,
            ])?;
        }

        debug!(images = rows.len(), "feed cache written");
        Ok(())
    })
}

/// Remove the cache row and its images. Returns the number of rows removed.
fn remove_snapshot(tx: &Transaction<'_>) -> StoreResult<usize> {
    let images = tx.execute(
        "DELETE FROM feed_images WHERE cache_id = ?1",
        [CACHE_ROW_ID],
    )?;
    let caches = tx.execute("DELETE FROM feed_cache WHERE id = ?1", [CACHE_ROW_ID])?;
    Ok(images + caches)
}

/// Run `f` in an immediate transaction, committing on success and rolling
/// back on any error, including a failed commit.
fn in_transaction<T>(
    conn: &mut Connection,
    operation: &'static str,
    f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    match f(&tx) {
        Ok(value) => {
            // A failed COMMIT leaves the transaction open; dropping `tx`
            // rolls it back.
            if let Err(err) = tx.commit() {
                warn!(operation, %err, "commit failed, rolled back");
                return Err(err.into());
            }
            Ok(value)
        }
        Err(err) => {
            warn!(operation, %err, "operation failed, rolling back");
            if let Err(rollback_err) = tx.rollback() {
                warn!(operation, %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use url::Url;
    use uuid::Uuid;

    fn store() -> SqliteFeedStore {
        SqliteFeedStore::open_in_memory(&EmbeddedSchemas::new()).unwrap()
    }

    fn image(n: u128) -> FeedImageRecord {
        FeedImageRecord::new(
            Uuid::from_u128(n),
            Some(format!("description {n}")),
            None,
            Url::parse(&format!("https://example.com/images/{n}")).unwrap(),
        )
    }

    #[tokio::test]
    async fn retrieve_on_empty_store_returns_none() {
        let store = store();
        assert_eq!(store.retrieve().await.unwrap(), None);
        assert_eq!(store.retrieve().await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_then_retrieve_returns_snapshot() {
        let store = store();
        let images = vec![image(1), image(2)];
        let timestamp = Utc::now();

        store.insert(images.clone(), timestamp).await.unwrap();

        let snapshot = store.retrieve().await.unwrap().unwrap();
        assert_eq!(snapshot, CacheSnapshot::new(images, timestamp));
    }

    #[tokio::test]
    async fn empty_image_list_is_still_a_snapshot() {
        let store = store();
        let timestamp = Utc::now();

        store.insert(Vec::new(), timestamp).await.unwrap();

        let snapshot = store.retrieve().await.unwrap().unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.timestamp, timestamp);
    }

    #[tokio::test]
    async fn insert_replaces_previous_snapshot() {
        let store = store();
        store.insert(vec![image(1), image(2), image(3)], Utc::now()).await.unwrap();

        let latest = Utc::now();
        store.insert(vec![image(9)], latest).await.unwrap();

        let snapshot = store.retrieve().await.unwrap().unwrap();
        assert_eq!(snapshot.images, vec![image(9)]);
        assert_eq!(snapshot.timestamp, latest);
    }

    #[tokio::test]
    async fn delete_empties_the_slot_and_is_idempotent() {
        let store = store();
        store.delete().await.unwrap();

        store.insert(vec![image(1)], Utc::now()).await.unwrap();
        store.delete().await.unwrap();
        assert_eq!(store.retrieve().await.unwrap(), None);

        store.delete().await.unwrap();
        assert_eq!(store.retrieve().await.unwrap(), None);
    }

    #[tokio::test]
    async fn status_reports_slot_contents() {
        let store = store();
        let empty = store.status().await.unwrap();
        assert_eq!(empty.cached_at, None);
        assert_eq!(empty.image_count, 0);
        assert_eq!(empty.schema_version, 1);

        let timestamp = Utc::now();
        store.insert(vec![image(1), image(2)], timestamp).await.unwrap();
        let full = store.status().await.unwrap();
        assert_eq!(full.cached_at, Some(timestamp));
        assert_eq!(full.image_count, 2);
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let store: Box<dyn FeedStore> = Box::new(store());
        let timestamp = Utc::now();
        store.insert(vec![image(4)], timestamp).await.unwrap();
        assert_eq!(
            store.retrieve().await.unwrap(),
            Some(CacheSnapshot::new(vec![image(4)], timestamp))
        );
        store.delete().await.unwrap();
        assert_eq!(store.retrieve().await.unwrap(), None);
    }

    #[test]
    fn in_transaction_rolls_back_on_error() {
        let handle =
            StoreHandle::open_in_memory(&StoreConfig::default(), &EmbeddedSchemas::new()).unwrap();
        let mut handle = handle;
        let conn = handle.connection_mut();

        let result: StoreResult<()> = in_transaction(conn, "test", |tx| {
            tx.execute("INSERT INTO feed_cache (id, timestamp) VALUES (1, 't')", [])?;
            Err(StoreError::corrupt("forced"))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT count(*) FROM feed_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn cache_table_refuses_a_second_row() {
        let mut handle =
            StoreHandle::open_in_memory(&StoreConfig::default(), &EmbeddedSchemas::new()).unwrap();
        let conn = handle.connection_mut();
        assert!(conn
            .execute("INSERT INTO feed_cache (id, timestamp) VALUES (2, 't')", [])
            .is_err());
    }
}
