//! State conflict resolution.
//!
//! Before a batch is deployed, the stored state record decides whether the
//! run may proceed. A record with no new storage path means the manager
//! release being restored would write to a path another manager already
//! owns. That case fails unless forced or dry-run.

use tracing::warn;

use crate::error::{Result, StateError};
use crate::state::StateInfo;

/// Advice appended to every conflict report.
const CONFLICT_ADVICE: &str = "This can lead to unexpected results and is probably a mistake. \
     Pass --new-path to relocate the restored manager, or --force if you really wish to continue";

/// How the gate was passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No state and no new path; nothing to reconcile.
    Clear,
    /// State present and a new path was given.
    Relocating,
    /// A new path was given but no state was found.
    NoStateForNewPath,
    /// Conflict overridden by force.
    Forced,
    /// Conflict reported, dry-run has no side effect to guard.
    DryRunAdvisory,
}

/// Outcome of a passed gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// How the gate was passed.
    pub decision: Decision,
    /// Messages reported to the operator.
    pub warnings: Vec<String>,
}

impl Resolution {
    fn new(decision: Decision) -> Self {
        Self {
            decision,
            warnings: Vec::new(),
        }
    }

    fn with_warning(decision: Decision, warning: String) -> Self {
        warn!("{}", warning);
        Self {
            decision,
            warnings: vec![warning],
        }
    }

    /// Returns true if a conflict was found but overridden.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.decision, Decision::Forced | Decision::DryRunAdvisory)
    }
}

/// Gate evaluated once per run, before dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    /// Proceed past a conflict with a warning.
    force: bool,
    /// Proceed past a conflict with an advisory.
    dry_run: bool,
}

impl ConflictResolver {
    /// Creates a resolver with the given escape hatches.
    #[must_use]
    pub const fn new(force: bool, dry_run: bool) -> Self {
        Self { force, dry_run }
    }

    /// Decides whether a deployment may proceed.
    ///
    /// `state` is the record read at the start of the run and `state_path`
    /// is where it lives. An empty `new_path` counts as not given.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Conflict` when a record exists, no new path was
    /// given, and neither force nor dry-run is set.
    pub fn check(
        &self,
        state: Option<&StateInfo>,
        state_path: &str,
        new_path: Option<&str>,
    ) -> Result<Resolution> {
        let new_path = new_path.filter(|p| !p.is_empty());

        match (state, new_path) {
            (Some(info), None) => self.resolve_conflict(info, state_path),
            (None, Some(path)) => Ok(Resolution::with_warning(
                Decision::NoStateForNewPath,
                format!("New path {path} specified but no remote state found"),
            )),
            (None, None) => Ok(Resolution::new(Decision::Clear)),
            (Some(_), Some(_)) => Ok(Resolution::new(Decision::Relocating)),
        }
    }

    fn resolve_conflict(&self, info: &StateInfo, state_path: &str) -> Result<Resolution> {
        let message = format!(
            "Existing state for manager release {} exists at {} but no new path was specified.",
            info.release_name, state_path
        );

        if self.force {
            return Ok(Resolution::with_warning(
                Decision::Forced,
                format!("{message} Force specified. Proceeding..."),
            ));
        }

        if self.dry_run {
            return Ok(Resolution::with_warning(
                Decision::DryRunAdvisory,
                format!("{message}\n{CONFLICT_ADVICE}"),
            ));
        }

        Err(StateError::Conflict {
            path: state_path.to_string(),
            message: format!("{message}\n{CONFLICT_ADVICE}"),
        }
        .into())
    }
}
