//! Versioned schema application.
//!
//! Applied versions are recorded in a `_migrations` bookkeeping table, so
//! each migration runs exactly once per database file. Every migration is
//! applied inside its own transaction together with its bookkeeping row.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::schema::{Migration, Schema};

/// Apply every migration of `schema` newer than the database's version.
///
/// This is a **synchronous** function; it runs during store construction,
/// before the worker takes ownership of the connection.
pub fn run_all(conn: &mut Connection, schema: &Schema) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let latest = schema.latest_version();

    if current > latest {
        return Err(StoreError::InvalidSchema {
            name: schema.name().to_string(),
            reason: format!(
                "database schema version {current} is newer than supported {latest}"
            ),
        });
    }

    let pending: Vec<&Migration> = schema
        .migrations()
        .iter()
        .filter(|m| m.version > current)
        .collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        schema = schema.name(),
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    info!(new_version = latest, "all migrations applied");
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )?;
    Ok(())
}

fn apply(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = %migration.description,
        "applying migration"
    );

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let result = tx.execute_batch(&migration.sql).and_then(|()| {
        tx.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description.as_ref(),
                chrono::Utc::now().timestamp()
            ],
        )
    });

    match result {
        Ok(_) => {
            tx.commit()?;
            info!(version = migration.version, "migration applied successfully");
            Ok(())
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            if let Err(rollback_err) = tx.rollback() {
                warn!(%rollback_err, "rollback after failed migration also failed");
            }
            Err(err.into())
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
