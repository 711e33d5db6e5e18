//! Batch deployment.
//!
//! This module provides the conflict gate evaluated before a batch, the
//! orchestrator that filters, rewrites and installs it, and the bounded
//! worker pool shared with release retrieval.

mod pool;
mod conflict;
mod report;
mod orchestrator;

pub use self::conflict::{ConflictResolver, Decision, Resolution};
pub use self::orchestrator::{DeployOptions, DeploymentOrchestrator, PreparedBatch};
pub use self::pool::WorkerPool;
pub use self::report::{BatchReport, ReleaseOutcome, ReleaseResult};
