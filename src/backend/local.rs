//! Local filesystem backend.
//!
//! Objects are plain files below a root directory. Useful for single-machine
//! snapshots and for shared filesystems mounted on several clusters.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{BackendError, Result};

use super::store::Backend;

/// Path separator used for local object paths.
const SEPARATOR: &str = "/";

/// Local filesystem backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    /// Root directory all paths are resolved against.
    root: PathBuf,
}

impl LocalBackend {
    /// Creates a backend rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a backend rooted at the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Gets the root directory.
    #[must_use]
    pub const fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Resolves an object path to a filesystem path below the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path.split(SEPARATOR).filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." {
                return Err(BackendError::unavailable(path, "path escapes the backend root").into());
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let target = self.resolve(path)?;

        let metadata = match fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Nothing to list at {}", target.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(BackendError::unavailable(path, e.to_string()).into()),
        };

        if metadata.is_file() {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            return Ok(vec![name]);
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&target)
            .await
            .map_err(|e| BackendError::unavailable(path, e.to_string()))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| BackendError::unavailable(path, e.to_string()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                entries.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        entries.sort();
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        debug!("Reading {}", target.display());

        fs::read(&target).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BackendError::not_found(path).into()
            } else {
                BackendError::unavailable(path, e.to_string()).into()
            }
        })
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        debug!("Writing {}", target.display());

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::unavailable(path, format!("Failed to create directory: {e}")))?;
        }

        // Write to a temporary file first, then rename for atomicity
        let temp_path = temp_path_for(&target);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| BackendError::unavailable(path, format!("Failed to create temp file: {e}")))?;

        file.write_all(data)
            .await
            .map_err(|e| BackendError::unavailable(path, format!("Failed to write file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| BackendError::unavailable(path, format!("Failed to sync file: {e}")))?;

        fs::rename(&temp_path, &target)
            .await
            .map_err(|e| BackendError::unavailable(path, format!("Failed to rename file: {e}")))?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        debug!("Deleting {}", target.display());

        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::unavailable(path, e.to_string()).into()),
        }
    }

    fn path_separator(&self) -> &'static str {
        SEPARATOR
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

/// Sibling temp path keeping the full file name, so `a.yaml` and `a.json`
/// never share one.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}
