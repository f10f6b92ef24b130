//! Domain value types held by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A single image entry of a cached feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedImageRecord {
    /// Unique identifier of the image.
    pub id: Uuid,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Optional location label.
    pub location: Option<String>,
    /// Where the image can be loaded from.
    pub url: Url,
}

impl FeedImageRecord {
    pub fn new(
        id: Uuid,
        description: Option<String>,
        location: Option<String>,
        url: Url,
    ) -> Self {
        Self {
            id,
            description,
            location,
            url,
        }
    }
}

/// Everything currently cached: the ordered images plus the time they were
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Images in insertion order.
    pub images: Vec<FeedImageRecord>,
    /// When the snapshot was written.
    pub timestamp: DateTime<Utc>,
}

impl CacheSnapshot {
    pub fn new(images: Vec<FeedImageRecord>, timestamp: DateTime<Utc>) -> Self {
        Self { images, timestamp }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
