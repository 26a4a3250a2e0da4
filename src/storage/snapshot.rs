use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::StoreError;

// ============================================================================
// Snapshot Backend
// ============================================================================

/// Durable byte-oriented persistence for the snapshot blob, keyed by a
/// fixed logical name.
///
/// The store treats this as best-effort storage: save failures are surfaced
/// to the caller and logged, never silently dropped, and in-memory state is
/// kept so persistence can be retried later.
pub trait SnapshotBackend: Send + Sync {
    /// Load the current snapshot blob, or `None` when no snapshot exists.
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Durably replace the snapshot blob.
    fn save(&self, blob: &[u8]) -> Result<(), StoreError>;
}

/// File-based backend with write-new-then-swap semantics.
///
/// The blob is written to a randomized temp path, synced, then renamed over
/// the destination. A crash mid-write leaves the previous snapshot intact;
/// it never produces a partial blob that fails to deserialize on next boot.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, blob: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Randomized temp filename: a concurrent writer cannot collide with
        // our temp path, and rename is atomic on the same filesystem
        use std::time::{SystemTime, UNIX_EPOCH};
        let random_suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = self.path.with_extension(format!("tmp.{:016x}", random_suffix));

        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        if let Err(e) = temp_file
            .write_all(blob)
            .and_then(|_| temp_file.sync_all())
        {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }
        drop(temp_file);

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBackend {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the backend with an existing blob.
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blob.lock().unwrap().clone())
    }

    fn save(&self, blob: &[u8]) -> Result<(), StoreError> {
        *self.blob.lock().unwrap() = Some(blob.to_vec());
        Ok(())
    }
}
