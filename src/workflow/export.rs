//! Export workflow.
//!
//! Captures the releases deployed on the cluster into the backend, removes
//! stored files for releases that are gone, and maintains the state record
//! for the manager release.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::backend::Backend;
use crate::cluster::ReleaseSource;
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::release::Release;
use crate::state::{generate_run_id, ReleaseStore, StateChange, StateManager};

/// Result of an export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Identifier of the run.
    pub run_id: String,
    /// Storage path written to.
    pub storage_path: String,
    /// Releases found on the cluster after namespace filtering.
    pub deployed: usize,
    /// Files written.
    pub written: Vec<String>,
    /// Files removed because their release is gone.
    pub removed: Vec<String>,
    /// Files already up to date.
    pub unchanged: usize,
    /// What happened to the state record; `None` in dry-run mode.
    pub state: Option<StateChange>,
    /// Whether the run was a dry run.
    pub dry_run: bool,
}

/// Exports deployed releases to the backend.
pub struct Exporter {
    /// Cluster to read releases from.
    source: Arc<dyn ReleaseSource>,
    /// Release files under the storage path.
    store: ReleaseStore,
    /// State record under the storage path.
    state: StateManager,
    /// Namespaces to export; empty exports all.
    namespaces: Vec<String>,
    /// Name of the manager release.
    manager_name: Option<String>,
    /// Report without writing.
    dry_run: bool,
    /// Set once the old state record has been cleared.
    reset_done: AtomicBool,
}

impl Exporter {
    /// Creates an exporter from the configuration.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        source: Arc<dyn ReleaseSource>,
        config: &ManagerConfig,
    ) -> Self {
        let storage_path = &config.backend.storage_path;
        Self {
            source,
            store: ReleaseStore::new(
                Arc::clone(&backend),
                storage_path,
                config.retrieval_concurrency,
            ),
            state: StateManager::new(backend, storage_path),
            namespaces: config.export.namespaces.clone(),
            manager_name: config.manager_release_name().map(str::to_string),
            dry_run: config.dry_run,
            reset_done: AtomicBool::new(false),
        }
    }

    /// Runs one export.
    ///
    /// The first run clears any old state record. Later runs on the same
    /// exporter only rewrite the record when it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster or the backend cannot be reached.
    pub async fn run(&self) -> Result<ExportSummary> {
        let run_id = generate_run_id();
        let span = info_span!("export", run_id = %run_id, dry_run = self.dry_run);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: String) -> Result<ExportSummary> {
        if self.manager_name.is_some()
            && !self.dry_run
            && !self.reset_done.swap(true, Ordering::SeqCst)
        {
            self.state.reset().await;
        }

        let releases = self.deployed_releases().await?;
        let codec = self.store.codec();

        let stored: BTreeSet<String> = self.store.stored_release_names().await?.into_iter().collect();
        let current: BTreeSet<String> = releases.iter().map(|r| codec.filename(r)).collect();

        let mut written = Vec::new();
        let mut unchanged = 0;
        for release in &releases {
            let filename = codec.filename(release);
            if stored.contains(&filename) {
                unchanged += 1;
                continue;
            }

            if self.dry_run {
                info!("Would export release {} as {}", release.qualified_name(), filename);
            } else {
                let mut release = release.clone();
                release.exported_at = Some(Utc::now());
                self.store.write_release(&release).await?;
                info!("Exported release {} as {}", release.qualified_name(), filename);
            }
            written.push(filename);
        }

        let mut removed = Vec::new();
        for filename in stored.difference(&current) {
            if self.dry_run {
                info!("Would remove stale release file {}", filename);
            } else {
                self.store.delete_release(filename).await?;
                info!("Removed stale release file {}", filename);
            }
            removed.push(filename.clone());
        }

        let state = if self.dry_run {
            None
        } else {
            Some(
                self.state
                    .update_for_releases(&releases, self.manager_name.as_deref())
                    .await?,
            )
        };

        info!(
            "Export complete: {} written, {} removed, {} unchanged",
            written.len(),
            removed.len(),
            unchanged
        );

        Ok(ExportSummary {
            run_id,
            storage_path: self.store.storage_path().to_string(),
            deployed: releases.len(),
            written,
            removed,
            unchanged,
            state,
            dry_run: self.dry_run,
        })
    }

    async fn deployed_releases(&self) -> Result<Vec<Release>> {
        let releases = self.source.deployed_releases().await?;
        if self.namespaces.is_empty() {
            return Ok(releases);
        }

        Ok(releases
            .into_iter()
            .filter(|r| self.namespaces.contains(&r.namespace))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cluster::MockReleaseSource;
    use crate::release::ChartRef;
    use crate::state::StateInfo;

    fn release(name: &str, namespace: &str, version: u32) -> Release {
        Release::new(name, namespace, version, ChartRef::new(name, "1.0.0"))
    }

    fn source(releases: Vec<Release>) -> Arc<MockReleaseSource> {
        let mut source = MockReleaseSource::new();
        source
            .expect_deployed_releases()
            .returning(move || Ok(releases.clone()));
        Arc::new(source)
    }

    fn config() -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.backend.storage_path = String::from("snap");
        config.export.release_name = Some(String::from("mgr"));
        config
    }

    #[tokio::test]
    async fn test_export_writes_releases_and_state() {
        let backend = Arc::new(MemoryBackend::new());
        let exporter = Exporter::new(
            backend.clone(),
            source(vec![release("web", "apps", 2), release("mgr", "ops", 5)]),
            &config(),
        );

        let summary = exporter.run().await.expect("export");
        assert_eq!(summary.deployed, 2);
        assert_eq!(summary.written.len(), 2);
        assert_eq!(summary.state, Some(StateChange::Written));
        assert!(backend.contains("snap/web-2.yaml").await);

        let state = StateManager::new(backend, "snap");
        assert_eq!(
            state.read().await.expect("state"),
            StateInfo::new("mgr-5.yaml", "mgr", 5)
        );
    }

    #[tokio::test]
    async fn test_export_removes_stale_files() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("snap/web-1.yaml", "stale").await;
        backend.insert("snap/notes.txt", "keep").await;

        let exporter = Exporter::new(backend.clone(), source(vec![release("web", "apps", 2)]), &config());
        let summary = exporter.run().await.expect("export");

        assert_eq!(summary.removed, vec![String::from("web-1.yaml")]);
        assert_eq!(summary.state, Some(StateChange::Removed));
        assert!(!backend.contains("snap/web-1.yaml").await);
        assert!(backend.contains("snap/web-2.yaml").await);
        assert!(backend.contains("snap/notes.txt").await);
    }

    #[tokio::test]
    async fn test_export_namespace_filter() {
        let backend = Arc::new(MemoryBackend::new());
        let mut config = config();
        config.export.namespaces = vec![String::from("apps")];

        let exporter = Exporter::new(
            backend.clone(),
            source(vec![release("web", "apps", 1), release("dns", "kube-system", 1)]),
            &config,
        );
        let summary = exporter.run().await.expect("export");

        assert_eq!(summary.written, vec![String::from("web-1.yaml")]);
        assert!(!backend.contains("snap/dns-1.yaml").await);
    }

    #[tokio::test]
    async fn test_export_dry_run_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let mut config = config();
        config.dry_run = true;

        let exporter = Exporter::new(backend.clone(), source(vec![release("mgr", "ops", 1)]), &config);
        let summary = exporter.run().await.expect("export");

        assert_eq!(summary.written.len(), 1);
        assert_eq!(summary.state, None);
        assert_eq!(backend.write_count(), 0);
        assert!(backend.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_second_export_is_unchanged() {
        let backend = Arc::new(MemoryBackend::new());
        let releases = vec![release("web", "apps", 2)];

        Exporter::new(backend.clone(), source(releases.clone()), &config())
            .run()
            .await
            .expect("first export");
        let summary = Exporter::new(backend.clone(), source(releases), &config())
            .run()
            .await
            .expect("second export");

        assert!(summary.written.is_empty());
        assert_eq!(summary.unchanged, 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_keep_state() {
        let backend = Arc::new(MemoryBackend::new());
        let exporter = Exporter::new(backend.clone(), source(vec![release("mgr", "ops", 5)]), &config());

        let first = exporter.run().await.expect("first export");
        assert_eq!(first.state, Some(StateChange::Written));
        assert_eq!(backend.write_count(), 2);

        let second = exporter.run().await.expect("second export");
        assert_eq!(second.state, Some(StateChange::Unchanged));
        assert!(second.written.is_empty());
        assert_eq!(backend.write_count(), 2);
        assert!(backend.contains("snap/releasemanager.state.json").await);
    }
}
