//! Import workflow.
//!
//! Restores stored releases onto the current cluster with namespace
//! filtering, value overrides and a target namespace. Releases that already
//! exist are skipped.

use std::sync::Arc;

use crate::backend::Backend;
use crate::cluster::Installer;
use crate::config::ManagerConfig;
use crate::deploy::{ConflictResolver, DeployOptions, DeploymentOrchestrator};
use crate::error::Result;
use crate::state::{ReleaseStore, StateManager};

use super::deploy::{deploy_stored, DeployRun};

/// Imports stored releases.
pub struct Importer {
    /// Release files under the storage path.
    store: ReleaseStore,
    /// State record under the storage path.
    state: StateManager,
    /// Conflict gate.
    resolver: ConflictResolver,
    /// Batch deployment.
    orchestrator: DeploymentOrchestrator,
}

impl Importer {
    /// Creates an importer from the configuration.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        installer: Arc<dyn Installer>,
        config: &ManagerConfig,
    ) -> Self {
        let storage_path = &config.backend.storage_path;
        Self {
            store: ReleaseStore::new(
                Arc::clone(&backend),
                storage_path,
                config.retrieval_concurrency,
            ),
            state: StateManager::new(backend, storage_path),
            resolver: ConflictResolver::new(config.import.force, config.dry_run),
            orchestrator: DeploymentOrchestrator::new(installer, DeployOptions::for_import(config)),
        }
    }

    /// Runs the import.
    ///
    /// # Errors
    ///
    /// Returns an error if stored releases cannot be listed, an override
    /// fails, the state record is inconsistent or the conflict gate refuses.
    pub async fn run(&self) -> Result<DeployRun> {
        deploy_stored(
            "import",
            &self.store,
            &self.state,
            self.resolver,
            &self.orchestrator,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cluster::MockInstaller;
    use crate::deploy::ReleaseOutcome;
    use crate::error::InstallError;
    use crate::release::{ChartRef, Release};
    use crate::state::StateInfo;

    async fn seeded_backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        let store = ReleaseStore::new(backend.clone(), "snap", 4);
        for (name, namespace) in [("web", "apps"), ("dns", "kube-system"), ("mgr", "ops")] {
            let mut release = Release::new(name, namespace, 1, ChartRef::new(name, "1.0.0"));
            release.values = serde_yaml::from_str("path: snap\n").expect("values");
            store.write_release(&release).await.expect("seed");
        }
        backend
    }

    async fn seed_state(backend: &Arc<MemoryBackend>) {
        StateManager::new(backend.clone(), "snap")
            .update(&StateInfo::new("mgr-1.yaml", "mgr", 1))
            .await
            .expect("seed state");
    }

    fn config() -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.backend.storage_path = String::from("snap");
        config
    }

    #[tokio::test]
    async fn test_import_without_state() {
        let backend = seeded_backend().await;
        let mut installer = MockInstaller::new();
        installer.expect_install().times(3).returning(|_, _| Ok(()));

        let run = Importer::new(backend, Arc::new(installer), &config())
            .run()
            .await
            .expect("import");
        assert_eq!(run.report.installed(), 3);
        assert!(run.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_import_conflict_refuses_dispatch() {
        let backend = seeded_backend().await;
        seed_state(&backend).await;
        let mut installer = MockInstaller::new();
        installer.expect_install().never();

        let err = Importer::new(backend, Arc::new(installer), &config())
            .run()
            .await
            .expect_err("conflict");
        assert!(err.is_state_conflict());
        assert!(err.to_string().contains("snap/releasemanager.state.json"));
    }

    #[tokio::test]
    async fn test_import_with_new_path_rewrites_manager() {
        let backend = seeded_backend().await;
        seed_state(&backend).await;

        let mut installer = MockInstaller::new();
        installer.expect_install().times(3).returning(|release, _| {
            let path = release.value("path").and_then(serde_yaml::Value::as_str);
            let expected = if release.name == "mgr" { "snap-b" } else { "snap" };
            if path == Some(expected) {
                Ok(())
            } else {
                Err(InstallError::failed(&release.name, "unexpected path"))
            }
        });

        let mut config = config();
        config.import.new_storage_path = Some(String::from("snap-b"));
        let run = Importer::new(backend, Arc::new(installer), &config)
            .run()
            .await
            .expect("import");
        assert_eq!(run.report.installed(), 3);
    }

    #[tokio::test]
    async fn test_import_filters_and_skips_existing() {
        let backend = seeded_backend().await;
        let mut installer = MockInstaller::new();
        installer.expect_install().times(2).returning(|release, _| {
            assert_eq!(release.namespace, "restored");
            if release.name == "web" {
                Err(InstallError::AlreadyExists {
                    name: release.name.clone(),
                })
            } else {
                Ok(())
            }
        });

        let mut config = config();
        config.import.exclude_namespaces = vec![String::from("kube-system")];
        config.import.target_namespace = Some(String::from("restored"));
        let run = Importer::new(backend, Arc::new(installer), &config)
            .run()
            .await
            .expect("import");

        assert_eq!(run.report.filtered_out, 1);
        assert_eq!(run.report.outcome("web"), Some(&ReleaseOutcome::SkippedAlreadyExists));
        assert_eq!(run.report.installed(), 1);
    }

    #[tokio::test]
    async fn test_import_override_error_aborts() {
        let backend = seeded_backend().await;
        let mut installer = MockInstaller::new();
        installer.expect_install().never();

        let mut config = config();
        config
            .import
            .values
            .insert(String::from("path.nested"), String::from("x"));
        let result = Importer::new(backend, Arc::new(installer), &config).run().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_import_dry_run_with_conflict() {
        let backend = seeded_backend().await;
        seed_state(&backend).await;
        let mut installer = MockInstaller::new();
        installer.expect_install().never();

        let mut config = config();
        config.dry_run = true;
        let run = Importer::new(backend.clone(), Arc::new(installer), &config)
            .run()
            .await
            .expect("dry run");

        assert_eq!(run.report.rendered(), 3);
        assert_eq!(run.warnings.len(), 1);
        assert_eq!(backend.write_count(), 4);
    }
}
