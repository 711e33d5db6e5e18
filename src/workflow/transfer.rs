//! Transfer workflow.
//!
//! Installs every stored release onto the current cluster as it was
//! exported. Unlike import there are no filters or overrides, and a release
//! that already exists counts as a failure.

use std::sync::Arc;

use crate::backend::Backend;
use crate::cluster::Installer;
use crate::config::ManagerConfig;
use crate::deploy::{ConflictResolver, DeployOptions, DeploymentOrchestrator};
use crate::error::Result;
use crate::state::{ReleaseStore, StateManager};

use super::deploy::{deploy_stored, DeployRun};

/// Transfers stored releases.
pub struct Transferer {
    /// Release files under the storage path.
    store: ReleaseStore,
    /// State record under the storage path.
    state: StateManager,
    /// Conflict gate.
    resolver: ConflictResolver,
    /// Batch deployment.
    orchestrator: DeploymentOrchestrator,
}

impl Transferer {
    /// Creates a transferer from the configuration.
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
            resolver: ConflictResolver::new(config.transfer.force, config.dry_run),
            orchestrator: DeploymentOrchestrator::new(
                installer,
                DeployOptions::for_transfer(config),
            ),
        }
    }

    /// Runs the transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if stored releases cannot be listed, the state record
    /// is inconsistent or the conflict gate refuses.
    pub async fn run(&self) -> Result<DeployRun> {
        deploy_stored(
            "transfer",
            &self.store,
            &self.state,
            self.resolver,
            &self.orchestrator,
        )
        .await
    }
}
