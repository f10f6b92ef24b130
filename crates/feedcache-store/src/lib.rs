//! # feedcache-store
//!
//! Single-slot persistent cache for feed snapshots.
//!
//! The store holds at most one [`CacheSnapshot`] (an ordered list of
//! [`FeedImageRecord`]s plus the time it was written) in a SQLite file and
//! exposes asynchronous `retrieve`, `insert`, and `delete`. Inserting
//! replaces whatever was cached, atomically.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  SqliteFeedStore (FeedStore facade)     │
//! ├─────────────────────────────────────────┤
//! │  Worker (one thread, FIFO task queue)   │
//! ├─────────────────────────────────────────┤
//! │  StoreHandle (rusqlite connection)      │  mapper: snapshot <-> rows
//! │  Migrations (versioned, transactional)  │
//! ├─────────────────────────────────────────┤
//! │  SchemaSource (embedded | directory)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use feedcache_store::{EmbeddedSchemas, SqliteFeedStore};
//!
//! let store = SqliteFeedStore::open("data/feed.sqlite", &EmbeddedSchemas::new())?;
//! store.insert(images, chrono::Utc::now()).await?;
//! let cached = store.retrieve().await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod mapper;
pub mod memory;
pub mod migration;
pub mod model;
pub mod schema;
pub mod store;
pub mod worker;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::{JournalMode, StoreConfig, Synchronous};
pub use db::StoreHandle;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryFeedStore;
pub use model::{CacheSnapshot, FeedImageRecord};
pub use schema::{
    DirectorySchemas, EmbeddedSchemas, FEED_STORE_SCHEMA, Migration, Schema, SchemaSource,
};
pub use store::{FeedStore, SqliteFeedStore, StoreStatus};
