//! State record manager.
//!
//! Owns the single state record under a storage path: reads it, detects
//! duplicates, writes it only when it changed and removes it when the
//! manager release is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{Result, StateError};
use crate::release::{Release, ReleaseCodec};

use super::path::remote_file_path;
use super::types::{StateInfo, STATE_FILE_NAME};

/// What a state update did to the remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChange {
    /// The record was written.
    Written,
    /// The stored record already matched.
    Unchanged,
    /// The record was removed because the manager release is gone.
    Removed,
    /// No manager release is configured.
    Disabled,
}

/// Manages the state record under a storage path.
pub struct StateManager {
    /// Storage backend.
    backend: Arc<dyn Backend>,
    /// Storage path the record lives under.
    storage_path: String,
    /// Codec used to name the manager release file.
    codec: ReleaseCodec,
    /// Set once the first update of this run has written.
    initialized: AtomicBool,
}

impl StateManager {
    /// Creates a state manager.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, storage_path: &str) -> Self {
        Self {
            backend,
            storage_path: storage_path.to_string(),
            codec: ReleaseCodec::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Full backend path of the state record.
    #[must_use]
    pub fn path(&self) -> String {
        remote_file_path(
            &self.storage_path,
            self.backend.path_separator(),
            STATE_FILE_NAME,
        )
    }

    /// Reads the state record.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if there is no record, or an error if
    /// the record cannot be decoded.
    pub async fn read(&self) -> Result<StateInfo> {
        let path = self.path();
        debug!("Reading state from {}", path);
        let data = self.backend.read(&path).await?;

        serde_json::from_slice(&data).map_err(|e| {
            StateError::Corrupted {
                message: format!("{path}: {e}"),
            }
            .into()
        })
    }

    /// Reads the state record, mapping a missing record to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than a missing record.
    pub async fn read_optional(&self) -> Result<Option<StateInfo>> {
        match self.read().await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns true if exactly one state record exists.
    ///
    /// # Errors
    ///
    /// Returns `StateError::MultipleStateFiles` if more than one entry is
    /// listed at the record path.
    pub async fn exists(&self) -> Result<bool> {
        let path = self.path();
        info!("Checking if remote state file {} exists", path);
        let entries = self.backend.list(&path).await?;

        match entries.len() {
            0 => Ok(false),
            1 => Ok(true),
            count => Err(StateError::MultipleStateFiles { count, path }.into()),
        }
    }

    /// Writes `candidate` if it differs from the stored record.
    ///
    /// The first update of a run always writes. Later updates read the
    /// stored record back and write only on a difference or a read error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn update(&self, candidate: &StateInfo) -> Result<StateChange> {
        let should_write = if self.initialized.load(Ordering::SeqCst) {
            match self.read().await {
                Ok(stored) => !candidate.matches(&stored),
                Err(e) => {
                    warn!("Error reading remote state: {}", e);
                    true
                }
            }
        } else {
            true
        };

        if !should_write {
            debug!("State for {} is unchanged", candidate.release_name);
            return Ok(StateChange::Unchanged);
        }

        debug!("Updating state {}", candidate.release_name);
        self.write(candidate).await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(StateChange::Written)
    }

    /// Runs the record lifecycle for the currently deployed `releases`.
    ///
    /// If the manager release named `manager_name` is deployed, the record is
    /// updated to describe it; otherwise the record is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write or delete fails.
    pub async fn update_for_releases(
        &self,
        releases: &[Release],
        manager_name: Option<&str>,
    ) -> Result<StateChange> {
        let Some(manager_name) = manager_name else {
            debug!("No manager release name configured; ignoring state");
            return Ok(StateChange::Disabled);
        };

        match releases.iter().find(|r| r.name == manager_name) {
            Some(manager) => {
                let mut candidate = StateInfo::for_release(manager, &self.codec);
                candidate.release_name = manager_name.to_string();
                self.update(&candidate).await
            }
            None => {
                debug!(
                    "Manager release {} doesn't exist. Removing state.",
                    manager_name
                );
                self.remove().await?;
                Ok(StateChange::Removed)
            }
        }
    }

    /// Deletes any state left by a previous run before a fresh export.
    ///
    /// Failures are logged, not returned.
    pub async fn reset(&self) {
        let path = self.path();
        info!("Removing old state {}", path);
        if let Err(e) = self.backend.delete(&path).await {
            warn!("Error cleaning up old release manager state: {}", e);
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// Deletes the state record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    pub async fn remove(&self) -> Result<()> {
        let path = self.path();
        debug!("Removing remote state {}", path);
        self.backend.delete(&path).await
    }

    async fn write(&self, info: &StateInfo) -> Result<()> {
        let data =
            serde_json::to_vec(info).map_err(|e| StateError::serialization(e.to_string()))?;
        self.backend.write(&self.path(), &data).await
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("backend", &self.backend.kind())
            .field("storage_path", &self.storage_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, MockBackend};
    use crate::error::BackendError;
    use crate::release::ChartRef;

    fn manager_release(version: u32) -> Release {
        Release::new("mgr", "ops", version, ChartRef::new("releasemanager", "0.4.0"))
    }

    #[test]
    fn test_path_policy() {
        let backend = Arc::new(MemoryBackend::new());
        assert_eq!(
            StateManager::new(backend.clone(), "/").path(),
            "releasemanager.state.json"
        );
        assert_eq!(
            StateManager::new(backend, "clusters/a").path(),
            "clusters/a/releasemanager.state.json"
        );
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = StateManager::new(backend, "snap");

        assert!(manager.read().await.expect_err("no record").is_not_found());
        assert_eq!(manager.read_optional().await.expect("read"), None);
        assert!(!manager.exists().await.expect("exists"));
    }

    #[tokio::test]
    async fn test_unchanged_update_writes_once() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = StateManager::new(backend.clone(), "snap");
        let info = StateInfo::new("mgr-3.yaml", "mgr", 3);

        assert_eq!(manager.update(&info).await.expect("update"), StateChange::Written);
        assert_eq!(manager.update(&info).await.expect("update"), StateChange::Unchanged);
        assert_eq!(backend.write_count(), 1);

        let stored = manager.read().await.expect("read");
        assert_eq!(stored, info);
        assert!(manager.exists().await.expect("exists"));
    }

    #[tokio::test]
    async fn test_changed_update_writes_again() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = StateManager::new(backend.clone(), "snap");

        manager
            .update(&StateInfo::new("mgr-3.yaml", "mgr", 3))
            .await
            .expect("update");
        manager
            .update(&StateInfo::new("mgr-4.yaml", "mgr", 4))
            .await
            .expect("update");

        assert_eq!(backend.write_count(), 2);
        assert_eq!(manager.read().await.expect("read").release_version, 4);
    }

    #[tokio::test]
    async fn test_tampered_record_is_rewritten() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = StateManager::new(backend.clone(), "snap");
        let info = StateInfo::new("mgr-3.yaml", "mgr", 3);

        manager.update(&info).await.expect("update");
        backend
            .insert("snap/releasemanager.state.json", "not json")
            .await;

        assert_eq!(manager.update(&info).await.expect("update"), StateChange::Written);
        assert_eq!(manager.read().await.expect("read"), info);
    }

    #[tokio::test]
    async fn test_multiple_state_files() {
        let mut backend = MockBackend::new();
        backend.expect_path_separator().return_const("/");
        backend.expect_list().returning(|_| {
            Ok(vec![
                String::from("releasemanager.state.json"),
                String::from("releasemanager.state.json.bak"),
            ])
        });

        let manager = StateManager::new(Arc::new(backend), "snap");
        let err = manager.exists().await.expect_err("two entries");
        assert!(matches!(
            err,
            crate::error::ReleaseManagerError::State(StateError::MultipleStateFiles { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_follows_manager_release() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = StateManager::new(backend.clone(), "snap");
        let other = Release::new("web", "apps", 1, ChartRef::new("web", "1.0.0"));

        let change = manager
            .update_for_releases(&[other.clone(), manager_release(3)], Some("mgr"))
            .await
            .expect("update");
        assert_eq!(change, StateChange::Written);
        assert_eq!(
            manager.read().await.expect("read"),
            StateInfo::new("mgr-3.yaml", "mgr", 3)
        );

        let change = manager
            .update_for_releases(&[other.clone()], Some("mgr"))
            .await
            .expect("update");
        assert_eq!(change, StateChange::Removed);
        assert!(!backend.contains("snap/releasemanager.state.json").await);

        let change = manager
            .update_for_releases(&[other], None)
            .await
            .expect("update");
        assert_eq!(change, StateChange::Disabled);
    }

    #[tokio::test]
    async fn test_read_backend_failure_propagates() {
        let mut backend = MockBackend::new();
        backend.expect_path_separator().return_const("/");
        backend
            .expect_read()
            .returning(|path| Err(BackendError::unavailable(path, "timeout").into()));

        let manager = StateManager::new(Arc::new(backend), "snap");
        assert!(manager.read_optional().await.is_err());
    }
}
