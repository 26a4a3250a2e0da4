//! Snapshot store: in-memory indexed collections with durable
//! serialize/deserialize.
//!
//! Three collections (articles, feeds, sync metadata) live in memory with
//! declared unique indices and are persisted as a single byte blob through
//! a [`SnapshotBackend`]. The blob is loaded once at process start and
//! written atomically after every sync cycle.

mod articles;
mod feeds;
mod snapshot;
mod store;
mod types;

pub use snapshot::{FileBackend, MemoryBackend, SnapshotBackend};
pub use store::SnapshotStore;
pub use types::{
    feed_id_for, Article, DuplicateKey, Feed, FeedUpdate, InsertOutcome, StoreError, SyncMetadata,
    SYNC_METADATA_ID,
};
