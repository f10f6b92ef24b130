//! Volatile [`FeedStore`] kept entirely in memory.
//!
//! Same contract as [`crate::SqliteFeedStore`] without durability: the slot
//! is lost when the last clone is dropped. Each operation completes while
//! the method is being called, so call order is execution order here too.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::model::{CacheSnapshot, FeedImageRecord};
use crate::store::FeedStore;

/// In-memory single-slot feed cache.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeedStore {
    slot: Arc<Mutex<Option<CacheSnapshot>>>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Option<CacheSnapshot>>> {
        self.slot
            .lock()
            .map_err(|e| StoreError::SlotPoisoned(format!("mutex poisoned: {e}")))
    }
}

impl FeedStore for InMemoryFeedStore {
    fn retrieve(&self) -> BoxFuture<'static, StoreResult<Option<CacheSnapshot>>> {
        let result = self.lock().map(|slot| slot.clone());
        future::ready(result).boxed()
    }

    fn insert(
        &self,
        images: Vec<FeedImageRecord>,
        timestamp: DateTime<Utc>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let result = self.lock().map(|mut slot| {
            debug!(images = images.len(), "in-memory feed cache replaced");
            *slot = Some(CacheSnapshot::new(images, timestamp));
        });
        future::ready(result).boxed()
    }

    fn delete(&self) -> BoxFuture<'static, StoreResult<()>> {
        let result = self.lock().map(|mut slot| {
            slot.take();
        });
        future::ready(result).boxed()
    }
}
