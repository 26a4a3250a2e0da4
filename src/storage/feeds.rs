use tracing::debug;

use super::store::SnapshotStore;
use super::types::{Feed, FeedUpdate};

// ============================================================================
// Feed Operations
// ============================================================================

impl SnapshotStore {
    /// Insert a feed record, idempotently.
    ///
    /// Feed creation is idempotent by design: a url collision is not an
    /// error, it returns a clone of the record already stored. The surrogate
    /// `id` is derived from the url, so an id collision implies a url
    /// collision and needs no separate check.
    pub fn insert_feed(&mut self, feed: Feed) -> Feed {
        if let Some(&pos) = self.feeds_by_url.get(&feed.url) {
            debug!(url = %feed.url, "feed already exists, returning stored record");
            return self.feeds[pos].clone();
        }

        let pos = self.feeds.len();
        self.feeds_by_url.insert(feed.url.clone(), pos);
        self.feeds_by_id.insert(feed.id.clone(), pos);
        self.feeds.push(feed.clone());
        feed
    }

    /// Point lookup by the unique url key.
    pub fn feed_by_url(&self, url: &str) -> Option<&Feed> {
        self.feeds_by_url.get(url).map(|&pos| &self.feeds[pos])
    }

    /// Point lookup by the surrogate id.
    pub fn feed_by_id(&self, id: &str) -> Option<&Feed> {
        self.feeds_by_id.get(id).map(|&pos| &self.feeds[pos])
    }

    /// All feed records in stable insertion order.
    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    /// Copy fetch metadata from a parse result onto the stored feed.
    ///
    /// Succeeds (returns true) whenever the feed exists, including fetches
    /// that yielded zero new articles - the cache validators and
    /// `last_fetched` must advance either way. Metadata fields absent from
    /// the update keep their stored values.
    pub fn apply_feed_update(&mut self, feed_id: &str, update: &FeedUpdate) -> bool {
        let Some(&pos) = self.feeds_by_id.get(feed_id) else {
            return false;
        };
        let feed = &mut self.feeds[pos];
        if let Some(title) = &update.title {
            feed.title = title.clone();
        }
        if let Some(link) = &update.link {
            feed.link = link.clone();
        }
        if update.feed_date.is_some() {
            feed.feed_date = update.feed_date;
        }
        if update.etag.is_some() {
            feed.etag = update.etag.clone();
        }
        if update.last_modified.is_some() {
            feed.last_modified = update.last_modified.clone();
        }
        feed.last_fetched = Some(update.last_fetched);
        true
    }

    /// Select up to `limit` feeds due for refresh, ordered by ascending
    /// `last_fetched` with never-fetched feeds first.
    ///
    /// Pure read. Bounds outbound fan-out per sync cycle and guarantees
    /// fairness: every feed eventually becomes the least-recently-fetched.
    pub fn select_due_feeds(&self, limit: usize) -> Vec<Feed> {
        let mut due: Vec<&Feed> = self.feeds.iter().collect();
        // Option<DateTime> orders None before Some, exactly the staleness
        // order we want
        due.sort_by(|a, b| a.last_fetched.cmp(&b.last_fetched));
        due.into_iter().take(limit).cloned().collect()
    }
}
