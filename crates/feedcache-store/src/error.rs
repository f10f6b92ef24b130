//! Error types for the feedcache-store crate.
//!
//! Every store operation returns [`StoreError`] via [`StoreResult`].
//! Construction errors (`SchemaNotFound`, `InvalidSchema`,
//! `StoreOpenFailed`) mean no store was returned; the remaining variants
//! are reported per operation and leave the store usable.

use std::path::PathBuf;

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the feed cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The schema source has no schema with the requested name.
    #[error("schema `{name}` not found")]
    SchemaNotFound { name: String },

    /// The schema was found but cannot be applied.
    #[error("invalid schema `{name}`: {reason}")]
    InvalidSchema { name: String, reason: String },

    /// SQLite failed to open, configure, or migrate the backing file.
    #[error("failed to open store at {}: {source}", path.display())]
    StoreOpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A read, write, or commit failed while serving an operation.
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] rusqlite::Error),

    /// A stored row is missing a required value or holds an unreadable one.
    #[error("corrupt record: {reason}")]
    CorruptRecord { reason: String },

    /// The execution worker is gone, could not start, or dropped the reply.
    #[error("store worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The in-memory slot lock was poisoned by a panicking holder.
    #[error("in-memory slot unavailable: {0}")]
    SlotPoisoned(String),
}

impl StoreError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            reason: reason.into(),
        }
    }

    /// Whether this error happened while constructing the store.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaNotFound { .. } | Self::InvalidSchema { .. } | Self::StoreOpenFailed { .. }
        )
    }
}
