use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Article, Feed, StoreError, SyncMetadata, SYNC_METADATA_ID};

// ============================================================================
// Snapshot Store
// ============================================================================

/// In-memory indexed collections (articles, feeds, sync metadata) with
/// whole-store serialize/deserialize.
///
/// The snapshot blob carries only the records; the unique indices are
/// rebuilt from them on every load, so re-ensuring indices after a reload
/// is inherently a no-op.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    pub(crate) articles: Vec<Article>,
    pub(crate) feeds: Vec<Feed>,
    pub(crate) sync: Option<SyncMetadata>,
    // Unique indices: value is the position in the backing Vec
    pub(crate) articles_by_link: HashMap<String, usize>,
    pub(crate) articles_by_summary: HashMap<String, usize>,
    pub(crate) feeds_by_url: HashMap<String, usize>,
    pub(crate) feeds_by_id: HashMap<String, usize>,
}

/// The on-disk shape of a snapshot: records only, no indices.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotData {
    articles: Vec<Article>,
    feeds: Vec<Feed>,
    sync: Option<SyncMetadata>,
}

#[derive(Serialize)]
struct SnapshotDataRef<'a> {
    articles: &'a [Article],
    feeds: &'a [Feed],
    sync: &'a Option<SyncMetadata>,
}

impl SnapshotStore {
    /// Deserialize a store from a snapshot blob, or initialize empty
    /// collections when no blob is provided.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] when the blob is not valid snapshot
    /// JSON, and [`StoreError::IndexConflict`] when its records violate a
    /// uniqueness invariant. Callers treat both as "blob unusable" and fall
    /// back to bootstrap.
    pub fn load(blob: Option<&[u8]>) -> Result<Self, StoreError> {
        let data = match blob {
            Some(bytes) => serde_json::from_slice::<SnapshotData>(bytes)?,
            None => SnapshotData::default(),
        };
        let mut store = Self {
            articles: data.articles,
            feeds: data.feeds,
            sync: data.sync,
            ..Self::default()
        };
        store.ensure_indices()?;
        Ok(store)
    }

    /// Serialize the whole store to a snapshot blob.
    pub fn serialize(&self) -> Result<Vec<u8>, StoreError> {
        let data = SnapshotDataRef {
            articles: &self.articles,
            feeds: &self.feeds,
            sync: &self.sync,
        };
        Ok(serde_json::to_vec(&data)?)
    }

    /// Rebuild the unique indices from the record collections.
    ///
    /// Idempotent: re-applying the same declarations over unchanged records
    /// produces identical maps. Fails if two records collide on a unique
    /// key, which can only happen with a hand-edited or corrupt blob.
    pub fn ensure_indices(&mut self) -> Result<(), StoreError> {
        self.articles_by_link.clear();
        self.articles_by_summary.clear();
        self.feeds_by_url.clear();
        self.feeds_by_id.clear();

        for (pos, article) in self.articles.iter().enumerate() {
            if self
                .articles_by_link
                .insert(article.link.clone(), pos)
                .is_some()
            {
                return Err(StoreError::IndexConflict {
                    collection: "articles",
                    key: article.link.clone(),
                });
            }
            if self
                .articles_by_summary
                .insert(article.summary.clone(), pos)
                .is_some()
            {
                return Err(StoreError::IndexConflict {
                    collection: "articles",
                    key: article.summary.clone(),
                });
            }
        }

        for (pos, feed) in self.feeds.iter().enumerate() {
            if self.feeds_by_url.insert(feed.url.clone(), pos).is_some() {
                return Err(StoreError::IndexConflict {
                    collection: "feeds",
                    key: feed.url.clone(),
                });
            }
            if self.feeds_by_id.insert(feed.id.clone(), pos).is_some() {
                return Err(StoreError::IndexConflict {
                    collection: "feeds",
                    key: feed.id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Upsert the singleton sync-metadata record from current collection
    /// state.
    ///
    /// The one operation that touches all three collections together; runs
    /// before every persisted serialize so the snapshot always carries a
    /// consistent completion marker.
    pub fn record_sync_completion(&mut self, now: DateTime<Utc>) {
        let details = SyncMetadata {
            id: SYNC_METADATA_ID.to_string(),
            time_stamp: now,
            article_count: self.articles.len(),
            feed_list: self.feeds.iter().map(|f| f.id.clone()).collect(),
        };
        match &mut self.sync {
            Some(existing) => {
                existing.time_stamp = details.time_stamp;
                existing.article_count = details.article_count;
                existing.feed_list = details.feed_list;
            }
            None => self.sync = Some(details),
        }
    }

    /// The singleton sync-metadata record, if a sync has completed.
    pub fn sync_metadata(&self) -> Option<&SyncMetadata> {
        self.sync.as_ref()
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }
}
