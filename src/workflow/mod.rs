//! End-to-end workflows.
//!
//! Each workflow wires the backend, state and cluster pieces together for
//! one run and wraps it in a span tagged with the run identifier.

mod deploy;
mod export;
mod import;
mod transfer;

pub use self::deploy::DeployRun;
pub use self::export::{ExportSummary, Exporter};
pub use self::import::Importer;
pub use self::transfer::Transferer;
