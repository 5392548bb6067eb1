use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

use crate::snapshot::ProgressSnapshot;

/// Key under which the full progress snapshot is stored.
pub const SNAPSHOT_KEY: &str = "current";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Application-scoped asynchronous key-value store.
///
/// Single-key reads and writes only; there are no transactions spanning keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key has never been written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove every key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be cleared.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys currently stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }
}

/// Persistent store adapter: full progress snapshots under a single fixed key.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the persisted snapshot.
    ///
    /// `Ok(None)` is the normal first-run case.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails, the payload is not a
    /// snapshot, or its schema version is newer than this build understands.
    pub async fn load(&self) -> Result<Option<ProgressSnapshot>, StorageError> {
        let Some(raw) = self.store.get(SNAPSHOT_KEY).await? else {
            debug!("no persisted snapshot");
            return Ok(None);
        };
        ProgressSnapshot::from_json(&raw).map(Some)
    }

    /// Replace the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the backend write fails.
    pub async fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
        let raw = snapshot.to_json()?;
        self.store.put(SNAPSHOT_KEY, &raw).await?;
        debug!(bytes = raw.len(), "snapshot saved");
        Ok(())
    }

    /// Drop all persisted progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be cleared.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.store.clear().await?;
        info!("persisted progress cleared");
        Ok(())
    }
}

/// Aggregates the backing store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub state: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let state: Arc<dyn KeyValueStore> = Arc::new(InMemoryRepository::new());
        Self { state }
    }

    #[must_use]
    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(Arc::clone(&self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{Catalog, ProgressState};
    use course_core::time::fixed_now;

    #[tokio::test]
    async fn in_memory_get_put_clear() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.get("k").await.unwrap(), None);
        repo.put("k", "v1").await.unwrap();
        repo.put("k", "v2").await.unwrap();
        assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v2"));
        repo.clear().await.unwrap();
        assert!(repo.is_empty().unwrap());
    }

    #[tokio::test]
    async fn snapshot_store_round_trips_and_resets() {
        let storage = Storage::in_memory();
        let snapshots = storage.snapshots();
        assert!(snapshots.load().await.unwrap().is_none());

        let catalog = Catalog::standard();
        let state = ProgressState::new(&catalog);
        let snapshot = ProgressSnapshot::from_state(&state, fixed_now());
        snapshots.save(&snapshot).await.unwrap();

        let loaded = snapshots.load().await.unwrap().expect("snapshot present");
        assert_eq!(loaded, snapshot);

        snapshots.reset().await.unwrap();
        assert!(snapshots.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_payload_is_a_serialization_error() {
        let repo = InMemoryRepository::new();
        repo.put(SNAPSHOT_KEY, "{not json").await.unwrap();
        let snapshots = SnapshotStore::new(Arc::new(repo));
        assert!(matches!(
            snapshots.load().await,
            Err(StorageError::Serialization(_))
        ));
    }
}
