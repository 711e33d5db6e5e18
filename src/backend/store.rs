//! Backend trait definition.
//!
//! This module defines the narrow storage contract every backend provides.
//! Paths are relative to the backend's configured root and joined with the
//! backend's path separator.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for storage backends.
///
/// Writes overwrite unconditionally; there is no compare-and-swap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Lists entry names at `path`.
    ///
    /// A path naming a single object yields that object's name; a path
    /// naming a directory or prefix yields its direct children. A missing
    /// path yields nothing.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Reads the object at `path`.
    ///
    /// Fails with `BackendError::NotFound` if the object does not exist.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Writes `data` to `path`, replacing any existing object.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Deletes the object at `path`. Deleting a missing object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Separator used to join path segments.
    fn path_separator(&self) -> &'static str;

    /// Gets the backend type name.
    fn kind(&self) -> &'static str;
}

/// Filters object keys down to the entries `list(path)` should report.
///
/// A key equal to `path` reports its basename; a key exactly one level below
/// `path` reports its final segment. Everything else is ignored.
pub(crate) fn entries_under<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    path: &str,
    separator: &str,
) -> Vec<String> {
    let path = path.trim_matches(|c: char| separator.contains(c));
    let mut entries = Vec::new();

    for key in keys {
        if path.is_empty() {
            if !key.contains(separator) {
                entries.push(key.to_string());
            }
            continue;
        }

        if key == path {
            let name = key.rsplit(separator).next().unwrap_or(key);
            entries.push(name.to_string());
        } else if let Some(rest) = key
            .strip_prefix(path)
            .and_then(|rest| rest.strip_prefix(separator))
            && !rest.is_empty()
            && !rest.contains(separator)
        {
            entries.push(rest.to_string());
        }
    }

    entries.sort();
    entries.dedup();
    entries
}
