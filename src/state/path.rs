//! Storage path joining.

/// Joins `name` onto the storage path with the backend's separator.
///
/// A storage path equal to the separator means "directly under the root" and
/// yields `name` unchanged.
#[must_use]
pub fn remote_file_path(storage_path: &str, separator: &str, name: &str) -> String {
    if storage_path.is_empty() || storage_path == separator {
        return name.to_string();
    }

    let root = storage_path.strip_suffix(separator).unwrap_or(storage_path);
    format!("{root}{separator}{name}")
}
