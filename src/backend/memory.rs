//! In-memory backend.
//!
//! Keeps objects in a map behind an async mutex. Intended for embedding and
//! for exercising the state and release stores without real storage.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::error::{BackendError, Result};

use super::store::{entries_under, Backend};

/// Object key separator.
const SEPARATOR: &str = "/";

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Stored objects by key.
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Number of `write` calls served.
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object without counting it as a write.
    pub async fn insert(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.objects.lock().await.insert(Self::key(path), data.into());
    }

    /// Returns true if an object exists at `path`.
    pub async fn contains(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(&Self::key(path))
    }

    /// Returns every stored key.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    /// Number of `write` calls served so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn key(path: &str) -> String {
        path.trim_matches('/').to_string()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let objects = self.objects.lock().await;
        Ok(entries_under(
            objects.keys().map(String::as_str),
            &Self::key(path),
            SEPARATOR,
        ))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&Self::key(path))
            .cloned()
            .ok_or_else(|| BackendError::not_found(path).into())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .await
            .insert(Self::key(path), data.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.lock().await.remove(&Self::key(path));
        Ok(())
    }

    fn path_separator(&self) -> &'static str {
        SEPARATOR
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_counts_and_reads_back() {
        let backend = MemoryBackend::new();
        backend.insert("seed.yaml", "seed").await;
        assert_eq!(backend.write_count(), 0);

        backend.write("/a/b.yaml", b"b").await.expect("write failed");
        assert_eq!(backend.write_count(), 1);
        assert_eq!(backend.read("a/b.yaml").await.expect("read failed"), b"b");
        assert!(backend.contains("a/b.yaml").await);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.read("a/b.yaml").await.expect_err("should be missing");
        assert!(err.is_not_found());
    }
}
