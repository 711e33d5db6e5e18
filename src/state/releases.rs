//! Release store.
//!
//! Stored releases live one per file directly under the storage path. Any
//! other object there, the state record included, is ignored.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::deploy::WorkerPool;
use crate::error::Result;
use crate::release::{Release, ReleaseCodec};

use super::path::remote_file_path;

/// Reads and writes release files under a storage path.
#[derive(Clone)]
pub struct ReleaseStore {
    /// Storage backend.
    backend: Arc<dyn Backend>,
    /// Storage path releases are kept under.
    storage_path: String,
    /// Codec for release files.
    codec: ReleaseCodec,
    /// Pool bounding concurrent decodes.
    pool: WorkerPool,
}

impl ReleaseStore {
    /// Creates a release store.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, storage_path: &str, retrieval_concurrency: usize) -> Self {
        Self {
            backend,
            storage_path: storage_path.to_string(),
            codec: ReleaseCodec::new(),
            pool: WorkerPool::new(retrieval_concurrency),
        }
    }

    /// Gets the storage path.
    #[must_use]
    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    /// Gets the codec used for release files.
    #[must_use]
    pub const fn codec(&self) -> &ReleaseCodec {
        &self.codec
    }

    /// Lists the release file names under the storage path.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be listed.
    pub async fn stored_release_names(&self) -> Result<Vec<String>> {
        debug!("Finding releases stored under {}", self.storage_path);
        let names = self.backend.list(&self.storage_path).await?;

        Ok(names
            .into_iter()
            .filter(|name| self.codec.is_release_file(name))
            .collect())
    }

    /// Reads and decodes every stored release.
    ///
    /// Entries that fail to read or decode are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage path cannot be listed.
    pub async fn stored_releases(&self) -> Result<Vec<Release>> {
        let names = self.stored_release_names().await?;
        let results = self
            .pool
            .run(names, |name| async move {
                let outcome = self.read_release(&name).await;
                (name, outcome)
            })
            .await;

        let mut releases = Vec::with_capacity(results.len());
        for (name, outcome) in results {
            match outcome {
                Ok(release) => releases.push(release),
                Err(e) => warn!("Skipping stored release {}: {}", name, e),
            }
        }
        Ok(releases)
    }

    /// Reads the release stored as `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub async fn read_release(&self, filename: &str) -> Result<Release> {
        let path = self.file_path(filename);
        debug!("Reading remote release {}", path);
        let data = self.backend.read(&path).await?;
        self.codec.decode(filename, &data)
    }

    /// Writes `release` under its deterministic file name.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend write fails.
    pub async fn write_release(&self, release: &Release) -> Result<()> {
        let data = self.codec.encode(release)?;
        let path = self.file_path(&self.codec.filename(release));
        debug!("Writing remote release {}", path);
        self.backend.write(&path, &data).await
    }

    /// Deletes the release stored as `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    pub async fn delete_release(&self, filename: &str) -> Result<()> {
        let path = self.file_path(filename);
        debug!("Removing remote release {}", path);
        self.backend.delete(&path).await
    }

    fn file_path(&self, name: &str) -> String {
        remote_file_path(&self.storage_path, self.backend.path_separator(), name)
    }
}

impl std::fmt::Debug for ReleaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseStore")
            .field("backend", &self.backend.kind())
            .field("storage_path", &self.storage_path)
            .field("pool", &self.pool)
            .finish()
    }
}
