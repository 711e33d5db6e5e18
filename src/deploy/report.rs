//! Per-release outcomes and batch reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal state of one release in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Installed successfully.
    Installed,
    /// Already present on the cluster; skipped.
    SkippedAlreadyExists,
    /// Install or rewrite failed.
    Failed {
        /// Failure description.
        reason: String,
    },
    /// Rendered instead of installed.
    DryRunRendered {
        /// Rendered release.
        output: String,
    },
}

/// Outcome for one named release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseResult {
    /// Release name.
    pub name: String,
    /// Namespace the release was deployed to.
    pub namespace: String,
    /// Terminal state.
    #[serde(flatten)]
    pub outcome: ReleaseOutcome,
}

/// Result of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// One entry per dispatched release.
    pub results: Vec<ReleaseResult>,
    /// Releases dropped by the namespace filter.
    pub filtered_out: usize,
    /// Whether the batch ran in dry-run mode.
    pub dry_run: bool,
    /// When dispatch started.
    pub started_at: DateTime<Utc>,
    /// When the last release reached a terminal state.
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Number of releases installed.
    #[must_use]
    pub fn installed(&self) -> usize {
        self.count(|o| matches!(o, ReleaseOutcome::Installed))
    }

    /// Number of releases skipped because they already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ReleaseOutcome::SkippedAlreadyExists))
    }

    /// Number of releases that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ReleaseOutcome::Failed { .. }))
    }

    /// Number of releases rendered in dry-run mode.
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, ReleaseOutcome::DryRunRendered { .. }))
    }

    /// Returns true if any release failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Wall-clock duration of the batch.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Looks up the outcome for a release by name.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&ReleaseOutcome> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.outcome)
    }

    fn count(&self, predicate: impl Fn(&ReleaseOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}
