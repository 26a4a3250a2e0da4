//! Feed synchronization engine with deduplicating snapshot storage.
//!
//! `brook` periodically pulls a bounded set of RSS/Atom feeds, parses new
//! entries, and merges them into a persisted article/feed store while
//! avoiding duplicate storage and redundant network fetches.
//!
//! The crate is organized around a handful of components:
//!
//! - [`storage`] - in-memory indexed collections with snapshot
//!   serialize/deserialize and an atomic file persistence backend
//! - [`feed`] - conditional HTTP fetching and feed parsing
//! - [`sync`] - the engine that composes select-due → fetch → parse →
//!   merge → persist into a single sync cycle
//! - [`config`] - TOML configuration with sensible defaults

pub mod config;
pub mod feed;
pub mod storage;
pub mod sync;
pub mod util;

pub use config::Config;
pub use storage::{
    Article, Feed, FileBackend, InsertOutcome, MemoryBackend, SnapshotBackend, SnapshotStore,
    StoreError, SyncMetadata,
};
pub use sync::{SyncEngine, SyncReport};
