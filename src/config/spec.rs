//! Configuration types for the release manager.
//!
//! These structs map to `releasemanager.yaml`. Every field has a default so
//! that an empty file, or no file at all, yields a usable configuration that
//! command-line flags can then refine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Default number of installs allowed in flight at once.
pub const DEFAULT_DEPLOY_CONCURRENCY: usize = 5;

/// Default number of stored releases decoded at once.
pub const DEFAULT_RETRIEVAL_CONCURRENCY: usize = 16;

/// Default per-release install timeout in seconds.
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 300;

/// Release value key holding the manager's storage path.
pub const VALUE_STORAGE_PATH: &str = "path";

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct ManagerConfig {
    /// Backend storage configuration.
    #[validate(nested)]
    pub backend: BackendConfig,
    /// Export configuration.
    pub export: ExportConfig,
    /// Import configuration.
    pub import: ImportConfig,
    /// Transfer configuration.
    pub transfer: TransferConfig,
    /// Installer configuration.
    #[validate(nested)]
    pub install: InstallConfig,
    /// Number of stored releases decoded concurrently.
    #[validate(range(min = 1, max = 1024))]
    pub retrieval_concurrency: usize,
    /// Compute and report everything, change nothing.
    pub dry_run: bool,
    /// Render full release values in dry-run output.
    pub verbose: bool,
}

/// Backend storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend type.
    pub kind: BackendKind,
    /// Storage path under which releases and the state record live.
    #[validate(length(min = 1))]
    pub storage_path: String,
    /// Root directory (local backend).
    pub root: Option<String>,
    /// Bucket name (s3 backend).
    pub bucket: Option<String>,
    /// Region (s3 backend, AWS default when unset).
    pub region: Option<String>,
}

/// Backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local filesystem.
    #[default]
    Local,
    /// AWS S3 or a compatible object store.
    S3,
}

/// Export configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    /// Helm release name of the manager itself.
    pub release_name: Option<String>,
    /// Namespaces to export; empty exports every namespace.
    pub namespaces: Vec<String>,
}

/// Import configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImportConfig {
    /// Namespace allow-list.
    pub namespaces: Vec<String>,
    /// Namespace exclude-list, ignored when an allow-list is set.
    pub exclude_namespaces: Vec<String>,
    /// Namespace every imported release is installed into.
    pub target_namespace: Option<String>,
    /// Value overrides applied to every release.
    pub values: BTreeMap<String, String>,
    /// New storage path for an imported manager release.
    pub new_storage_path: Option<String>,
    /// Proceed despite a state conflict.
    pub force: bool,
}

/// Transfer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransferConfig {
    /// New storage path for a transferred manager release.
    pub new_storage_path: Option<String>,
    /// Proceed despite a state conflict.
    pub force: bool,
}

/// Installer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct InstallConfig {
    /// Per-release install timeout in seconds.
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// Maximum installs in flight.
    #[validate(range(min = 1, max = 256))]
    pub concurrency: usize,
    /// Helm binary to invoke.
    pub helm_binary: String,
    /// Kube context to target.
    pub kube_context: Option<String>,
    /// Chart repository used when a release does not record one.
    pub chart_repository: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            export: ExportConfig::default(),
            import: ImportConfig::default(),
            transfer: TransferConfig::default(),
            install: InstallConfig::default(),
            retrieval_concurrency: DEFAULT_RETRIEVAL_CONCURRENCY,
            dry_run: false,
            verbose: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            storage_path: String::from("/"),
            root: None,
            bucket: None,
            region: None,
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
            concurrency: DEFAULT_DEPLOY_CONCURRENCY,
            helm_binary: String::from("helm"),
            kube_context: None,
            chart_repository: None,
        }
    }
}

impl InstallConfig {
    /// Returns the per-release timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ManagerConfig {
    /// Returns the configured manager release name, if any.
    #[must_use]
    pub fn manager_release_name(&self) -> Option<&str> {
        self.export
            .release_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.backend.storage_path, "/");
        assert_eq!(config.install.concurrency, DEFAULT_DEPLOY_CONCURRENCY);
        assert_eq!(config.retrieval_concurrency, DEFAULT_RETRIEVAL_CONCURRENCY);
        assert!(config.manager_release_name().is_none());
    }

    #[test]
    fn test_empty_release_name_is_unset() {
        let mut config = ManagerConfig::default();
        config.export.release_name = Some(String::new());
        assert!(config.manager_release_name().is_none());

        config.export.release_name = Some(String::from("releasemanager"));
        assert_eq!(config.manager_release_name(), Some("releasemanager"));
    }
}
