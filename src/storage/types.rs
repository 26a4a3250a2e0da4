use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-level errors covering snapshot (de)serialization and durable I/O.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot blob could not be decoded
    #[error("Corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Snapshot blob decoded but its records violate a uniqueness invariant
    #[error("Snapshot index conflict: duplicate {key} in {collection}")]
    IndexConflict {
        collection: &'static str,
        key: String,
    },

    /// Reading or writing the snapshot failed
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Records
// ============================================================================

/// A subscribed RSS/Atom source.
///
/// `url` is the natural key (unique across all feeds); `id` is a surrogate
/// key derived deterministically from the url and never changes once
/// assigned. Articles reference their feed through `feed_id`.
///
/// A `Feed` record never embeds its articles - the "feed with items" shape
/// is [`crate::feed::ParsedFeed`], which exists only between the parser and
/// the merge step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    /// The feed's own last-updated timestamp, as published by the feed
    pub feed_date: Option<DateTime<Utc>>,
    /// When we last completed a fetch of this feed (None = never fetched)
    pub last_fetched: Option<DateTime<Utc>>,
    /// HTTP cache validator from the last fetch
    pub etag: Option<String>,
    /// HTTP cache validator from the last fetch
    pub last_modified: Option<String>,
}

impl Feed {
    /// Construct a bare feed from a configuration entry: only `url` (and the
    /// derived `id`) are populated, all other fields are cleared.
    pub fn from_url(url: &str) -> Self {
        Self {
            id: feed_id_for(url),
            url: url.to_string(),
            title: String::new(),
            link: String::new(),
            feed_date: None,
            last_fetched: None,
            etag: None,
            last_modified: None,
        }
    }
}

/// Derive the stable surrogate id for a feed url.
///
/// First 16 hex chars of SHA-256, which keeps ids short while making a
/// collision between distinct configured urls vanishingly unlikely.
pub fn feed_id_for(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    format!("{:x}", hash)[..16].to_string()
}

/// Metadata copied from a parse result onto a stored [`Feed`] record.
///
/// Applied by the merge step after every fetch, including fetches that
/// yielded zero new articles.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedUpdate {
    pub title: Option<String>,
    pub link: Option<String>,
    pub feed_date: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched: DateTime<Utc>,
}

impl FeedUpdate {
    /// An update that only advances `last_fetched`, leaving every stored
    /// field as it was.
    pub fn touch(at: DateTime<Utc>) -> Self {
        Self {
            title: None,
            link: None,
            feed_date: None,
            etag: None,
            last_modified: None,
            last_fetched: at,
        }
    }
}

/// A single entry parsed from a feed.
///
/// `link` is the primary dedup key and `summary` the secondary one: two
/// articles are considered duplicates if either collides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub link: String,
    pub summary: String,
    pub title: String,
    /// Publish/update timestamp, used for default read ordering
    pub published: Option<DateTime<Utc>>,
    /// Non-owning back-reference to the owning feed (lookup only)
    pub feed_id: String,
}

/// Placeholder singleton id until multi-user support exists.
pub const SYNC_METADATA_ID: &str = "nullUser";

/// Singleton record describing the last successful sync completion.
///
/// Created on the first sync, updated in place on every subsequent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub id: String,
    pub time_stamp: DateTime<Utc>,
    pub article_count: usize,
    pub feed_list: Vec<String>,
}

// ============================================================================
// Insert Outcomes
// ============================================================================

/// Which uniqueness key an insert candidate collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Link,
    Summary,
}

/// Typed result of an article insert attempt.
///
/// Duplicate detection is an expected, non-exceptional outcome; callers
/// branch on this value instead of catching a constraint-violation fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate(DuplicateKey),
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}
