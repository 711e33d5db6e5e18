//! Storage backends.
//!
//! Releases and the state record are persisted through the [`Backend`]
//! contract, which is small enough to sit on a flat object store or on a
//! hierarchical filesystem.

mod store;
mod local;
mod memory;
mod s3;

use std::sync::Arc;

use tracing::info;

use crate::config::{BackendConfig, BackendKind};
use crate::error::{ReleaseManagerError, Result};

pub use self::local::LocalBackend;
pub use self::memory::MemoryBackend;
pub use self::s3::S3Backend;
pub use self::store::Backend;

#[cfg(test)]
pub use self::store::MockBackend;

/// Builds the backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the s3 backend has no bucket or the working
/// directory cannot be determined for the local backend.
pub async fn from_config(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match config.kind {
        BackendKind::Local => match &config.root {
            Some(root) => Arc::new(LocalBackend::new(root)),
            None => Arc::new(LocalBackend::current_dir()?),
        },
        BackendKind::S3 => {
            let bucket = config
                .bucket
                .as_deref()
                .ok_or_else(|| ReleaseManagerError::internal("S3 bucket not configured"))?;
            Arc::new(S3Backend::new(bucket, config.region.as_deref()).await)
        }
    };

    info!(
        "Using {} backend with storage path {}",
        backend.kind(),
        config.storage_path
    );
    Ok(backend)
}
