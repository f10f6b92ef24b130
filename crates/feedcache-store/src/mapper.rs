//! Conversion between [`CacheSnapshot`] and its on-disk rows.
//!
//! The mapping is pure: no I/O happens here. Writing never fails; reading
//! fails with [`StoreError::CorruptRecord`] when a row lacks a required
//! value (`image_id`, `url`) or holds one that cannot be parsed.
//!
//! Row order is carried by an explicit `position` column. Rows handed to
//! [`rows_to_snapshot`] must already be sorted by position.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use url::Url;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{CacheSnapshot, FeedImageRecord};

/// The single `feed_cache` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    /// RFC 3339, UTC, nanosecond precision.
    pub timestamp: String,
}

/// One `feed_images` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub position: i64,
    pub image_id: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
}

impl ImageRow {
    /// Column order: `position, image_id, description, location, url`.
    pub(crate) fn from_sql(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            position: row.get(0)?,
            image_id: row.get(1)?,
            description: row.get(2)?,
            location: row.get(3)?,
            url: row.get(4)?,
        })
    }
}

/// Split a snapshot into its cache row and one image row per record.
pub fn snapshot_to_rows(
    images: &[FeedImageRecord],
    timestamp: &DateTime<Utc>,
) -> (CacheRow, Vec<ImageRow>) {
    let cache = CacheRow {
        timestamp: encode_timestamp(timestamp),
    };
    let rows = images
        .iter()
        .enumerate()
        .map(|(index, image)| ImageRow {
            position: index as i64,
            image_id: Some(image.id.hyphenated().to_string()),
            description: image.description.clone(),
            location: image.location.clone(),
            url: Some(image.url.to_string()),
        })
        .collect();
    (cache, rows)
}

/// Rebuild a snapshot from its rows.
pub fn rows_to_snapshot(cache: CacheRow, rows: Vec<ImageRow>) -> StoreResult<CacheSnapshot> {
    let timestamp = decode_timestamp(&cache.timestamp)?;
    let images = rows
        .into_iter()
        .map(row_to_image)
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(CacheSnapshot { images, timestamp })
}

fn row_to_image(row: ImageRow) -> StoreResult<FeedImageRecord> {
    let position = row.position;

    let raw_id = row
        .image_id
        .ok_or_else(|| StoreError::corrupt(format!("image at position {position} has no id")))?;
    let id = Uuid::parse_str(&raw_id).map_err(|e| {
        StoreError::corrupt(format!("image at position {position} has invalid id `{raw_id}`: {e}"))
    })?;

    let raw_url = row
        .url
        .ok_or_else(|| StoreError::corrupt(format!("image at position {position} has no url")))?;
    let url = Url::parse(&raw_url).map_err(|e| {
        StoreError::corrupt(format!("image at position {position} has invalid url `{raw_url}`: {e}"))
    })?;

    Ok(FeedImageRecord {
        id,
        description: row.description,
        location: row.location,
        url,
    })
}

pub(crate) fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(format!("invalid cache timestamp `{raw}`: {e}")))
}
