//! Shared run for import and transfer.

use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::deploy::{BatchReport, ConflictResolver, DeploymentOrchestrator};
use crate::error::Result;
use crate::state::{generate_run_id, ReleaseStore, StateManager};

/// Result of an import or transfer run.
#[derive(Debug, Clone, Serialize)]
pub struct DeployRun {
    /// Identifier of the run.
    pub run_id: String,
    /// Conflict warnings reported before dispatch.
    pub warnings: Vec<String>,
    /// Per-release outcomes.
    pub report: BatchReport,
}

/// Deploys every stored release through `orchestrator`, inside a span
/// tagged with a fresh run identifier.
pub(crate) async fn deploy_stored(
    operation: &'static str,
    store: &ReleaseStore,
    state: &StateManager,
    resolver: ConflictResolver,
    orchestrator: &DeploymentOrchestrator,
) -> Result<DeployRun> {
    let run_id = generate_run_id();
    let span = info_span!("deploy", operation, run_id = %run_id);

    run_batch(run_id, store, state, resolver, orchestrator)
        .instrument(span)
        .await
}

/// Stored releases are read and prepared first, the state record is read
/// once, then the conflict gate decides whether dispatch happens.
async fn run_batch(
    run_id: String,
    store: &ReleaseStore,
    state: &StateManager,
    resolver: ConflictResolver,
    orchestrator: &DeploymentOrchestrator,
) -> Result<DeployRun> {
    let releases = store.stored_releases().await?;
    info!(
        "Retrieved {} stored releases from {}",
        releases.len(),
        store.storage_path()
    );

    let batch = orchestrator.prepare(releases)?;

    let info = if state.exists().await? {
        state.read_optional().await?
    } else {
        None
    };

    let resolution = resolver.check(
        info.as_ref(),
        &state.path(),
        orchestrator.options().new_path(),
    )?;

    let report = orchestrator.dispatch(batch, info.as_ref()).await;
    info!(
        "Batch complete: {} installed, {} skipped, {} failed, {} rendered",
        report.installed(),
        report.skipped(),
        report.failed(),
        report.rendered()
    );

    Ok(DeployRun {
        run_id,
        warnings: resolution.warnings,
        report,
    })
}
