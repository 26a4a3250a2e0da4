//! The sync engine: select-due → fetch → parse → merge → persist.
//!
//! One engine owns one store. A cycle-wide mutex makes the whole composite
//! sequence single-flight per engine; within a cycle, fetches for the
//! selected feeds run concurrently and only the merge against the shared
//! collections is serialized (behind the store's write lock).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::feed::{fetch, parse_outcome, FetchError, ParseError, ParsedFeed};
use crate::storage::{
    Article, Feed, FeedUpdate, SnapshotBackend, SnapshotStore, StoreError, SyncMetadata,
};

// ============================================================================
// Error Types
// ============================================================================

/// Failure of one feed's fetch-and-parse leg, scoped to that feed.
#[derive(Debug, Error)]
pub enum FeedSyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

// ============================================================================
// Reports
// ============================================================================

/// Best-effort outcome of one sync cycle.
///
/// Per-feed failures reduce the counts but never abort the batch; a
/// persistence failure is carried in the value (in-memory state is kept,
/// the next persisted write retries).
#[derive(Debug)]
pub struct SyncReport {
    /// Newly inserted articles across all merged feeds
    pub inserted: usize,
    /// Feeds selected as due at the start of the cycle
    pub feeds_selected: usize,
    /// Feeds whose fetch or parse failed
    pub feeds_failed: usize,
    /// Error from the end-of-cycle snapshot write, if it failed
    pub persist_error: Option<StoreError>,
}

/// Point-in-time counters for status reporting.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub feed_count: usize,
    pub article_count: usize,
    pub last_sync: Option<SyncMetadata>,
}

// ============================================================================
// Sync Engine
// ============================================================================

pub struct SyncEngine {
    store: RwLock<SnapshotStore>,
    backend: Arc<dyn SnapshotBackend>,
    client: reqwest::Client,
    config: Config,
    // Set once initialize_or_load has run to completion, so later calls
    // skip the backend entirely
    initialized: AtomicBool,
    // Guards the whole fetch→parse→merge→persist sequence: at most one
    // sync cycle runs at a time per engine
    cycle: Mutex<()>,
}

impl SyncEngine {
    pub fn new(config: Config, backend: Arc<dyn SnapshotBackend>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("brook/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            store: RwLock::new(SnapshotStore::default()),
            backend,
            client,
            config,
            initialized: AtomicBool::new(false),
            cycle: Mutex::new(()),
        }
    }

    /// Load the snapshot into memory, or bootstrap from the configured
    /// default feed list when no usable snapshot exists.
    ///
    /// Idempotent: after the first completed call, further calls return
    /// `true` without touching the backend. An unreadable or corrupt
    /// snapshot is logged and falls back to bootstrap rather than failing
    /// startup.
    pub async fn initialize_or_load(&self) -> Result<bool, StoreError> {
        let mut store = self.store.write().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(true);
        }

        let loaded = match self.backend.load() {
            Ok(Some(blob)) => match SnapshotStore::load(Some(&blob)) {
                Ok(s) => {
                    info!(
                        articles = s.article_count(),
                        feeds = s.feed_count(),
                        "Loaded snapshot"
                    );
                    Some(s)
                }
                Err(e) => {
                    warn!(error = %e, "Snapshot unusable, bootstrapping fresh store");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read snapshot, bootstrapping fresh store");
                None
            }
        };
        if let Some(s) = loaded {
            *store = s;
        }

        if store.feed_count() == 0 {
            for url in &self.config.feeds {
                store.insert_feed(Feed::from_url(url));
            }
            info!(feeds = store.feed_count(), "Bootstrapped default feed list");

            store.record_sync_completion(Utc::now());
            let blob = store.serialize()?;
            drop(store);
            if let Err(e) = self.backend.save(&blob) {
                warn!(error = %e, "Failed to persist bootstrap snapshot");
            }
        }

        self.initialized.store(true, Ordering::Release);
        Ok(true)
    }

    /// Execute one full due-feed sync cycle. Safe to call repeatedly;
    /// concurrent callers queue behind the cycle lock.
    pub async fn run_sync_cycle(&self, batch_limit: usize) -> SyncReport {
        let _cycle = self.cycle.lock().await;

        let due = self.store.read().await.select_due_feeds(batch_limit);
        let feeds_selected = due.len();
        info!(selected = feeds_selected, "Starting sync cycle");

        let timeout = self.config.fetch_timeout();
        let mut fetches = stream::iter(due)
            .map(|feed| {
                let client = self.client.clone();
                async move {
                    let result = fetch_and_parse(&client, &feed, timeout).await;
                    (feed, result)
                }
            })
            .buffer_unordered(batch_limit.max(1));

        // The optional cycle deadline bounds how long we wait on the fetch
        // set as a whole; dropping the stream abandons in-flight fetches
        // and their results are never merged
        let deadline = self
            .config
            .cycle_deadline()
            .map(|d| tokio::time::Instant::now() + d);
        let mut results = Vec::with_capacity(feeds_selected);
        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, fetches.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        warn!(
                            completed = results.len(),
                            selected = feeds_selected,
                            "Cycle deadline reached, abandoning remaining fetches"
                        );
                        break;
                    }
                },
                None => fetches.next().await,
            };
            match next {
                Some(r) => results.push(r),
                None => break,
            }
        }
        drop(fetches);

        let mut inserted = 0usize;
        let mut feeds_failed = 0usize;
        let mut store = self.store.write().await;
        for (feed, result) in results {
            match result {
                Ok(parsed) => {
                    if parsed.skipped > 0 {
                        warn!(
                            feed = %feed.url,
                            skipped = parsed.skipped,
                            "Entries without links skipped"
                        );
                    }
                    store.apply_feed_update(&feed.id, &parsed.update);
                    let new = store.insert_if_new(parsed.articles);
                    debug!(feed = %feed.url, inserted = new.len(), "Merged feed");
                    inserted += new.len();
                }
                Err(e) => {
                    feeds_failed += 1;
                    warn!(feed = %feed.url, error = %e, "Feed sync failed");
                    // A failed attempt still advances the fetch date;
                    // otherwise the feed stays least-recently-fetched and
                    // crowds healthy feeds out of every future batch
                    store.apply_feed_update(&feed.id, &FeedUpdate::touch(Utc::now()));
                }
            }
        }
        store.record_sync_completion(Utc::now());
        let blob = store.serialize();
        drop(store);

        let persist_error = match blob {
            Ok(b) => self.backend.save(&b).err(),
            Err(e) => Some(e),
        };
        if let Some(e) = &persist_error {
            warn!(error = %e, "Failed to persist snapshot after sync cycle");
        }

        info!(inserted, feeds_failed, "Sync cycle complete");
        SyncReport {
            inserted,
            feeds_selected,
            feeds_failed,
            persist_error,
        }
    }

    /// Subscribe a feed by url, idempotently.
    ///
    /// An already-known url returns the stored record untouched. A new url
    /// is registered immediately and fetched once so its articles land
    /// without waiting for the next cycle; the initial fetch failing leaves
    /// the bare feed in place for the scheduler to retry.
    pub async fn add_feed(&self, url: &str) -> Feed {
        let _cycle = self.cycle.lock().await;

        if let Some(existing) = self.store.read().await.feed_by_url(url) {
            debug!(url = %url, "Feed already subscribed");
            return existing.clone();
        }

        let feed = self.store.write().await.insert_feed(Feed::from_url(url));
        match fetch_and_parse(&self.client, &feed, self.config.fetch_timeout()).await {
            Ok(parsed) => {
                let mut store = self.store.write().await;
                store.apply_feed_update(&feed.id, &parsed.update);
                let new = store.insert_if_new(parsed.articles);
                info!(feed = %feed.url, inserted = new.len(), "Subscribed new feed");
            }
            Err(e) => {
                warn!(feed = %feed.url, error = %e, "Initial fetch for new feed failed");
            }
        }

        self.store
            .read()
            .await
            .feed_by_url(url)
            .cloned()
            .unwrap_or(feed)
    }

    /// Up to `limit` stored articles, `published` descending. Operates on
    /// whatever in-memory state exists; never fails due to sync errors.
    pub async fn list_recent_articles(&self, limit: usize) -> Vec<Article> {
        self.store.read().await.recent_articles(limit)
    }

    pub async fn stats(&self) -> EngineStats {
        let store = self.store.read().await;
        EngineStats {
            feed_count: store.feed_count(),
            article_count: store.article_count(),
            last_sync: store.sync_metadata().cloned(),
        }
    }

    /// Force an out-of-cycle snapshot write.
    pub async fn persist_now(&self) -> Result<(), StoreError> {
        let mut store = self.store.write().await;
        store.record_sync_completion(Utc::now());
        let blob = store.serialize()?;
        drop(store);
        self.backend.save(&blob)
    }

    /// Schedule a deferred snapshot write after a mutating request.
    ///
    /// Does not block the caller; failure is logged rather than returned,
    /// since nobody is left waiting on it. Not guaranteed to complete
    /// before process shutdown - callers that need durability await the
    /// handle or use [`Self::persist_now`].
    pub fn persist_in_background(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.persist_now().await {
                warn!(error = %e, "Background snapshot persistence failed");
            }
        })
    }
}

async fn fetch_and_parse(
    client: &reqwest::Client,
    feed: &Feed,
    timeout: Duration,
) -> Result<ParsedFeed, FeedSyncError> {
    let outcome = fetch(client, feed, timeout).await?;
    Ok(parse_outcome(outcome, feed)?)
}
