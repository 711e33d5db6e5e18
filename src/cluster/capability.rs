//! Cluster capability traits.
//!
//! The workflows reach the cluster only through these two traits: one to
//! enumerate what is deployed, one to install a release.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{InstallError, Result};
use crate::release::Release;

/// Installs releases onto a cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Installs `release`, honoring `timeout` at the cluster layer.
    ///
    /// An already-installed release must be reported as
    /// `InstallError::AlreadyExists` so callers can tell it apart.
    async fn install(&self, release: &Release, timeout: Duration) -> std::result::Result<(), InstallError>;
}

/// Enumerates releases deployed on a cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Lists every deployed release with its user-supplied values.
    async fn deployed_releases(&self) -> Result<Vec<Release>>;
}
