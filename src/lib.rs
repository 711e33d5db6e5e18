// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Tests assert with expect() and panic on unexpected outcomes
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Release Manager
//!
//! Snapshots the releases deployed in a cluster to a remote backend and
//! restores them onto the same or another cluster.
//!
//! ## Overview
//!
//! - **Export** captures every deployed release as one file under a storage
//!   path and maintains a state record naming the manager release that owns
//!   the path.
//! - **Import** restores stored releases with namespace filters, value
//!   overrides and an optional target namespace.
//! - **Transfer** restores every stored release exactly as exported.
//!
//! ## Ownership
//!
//! A storage path holds at most one state record. Before any restore, the
//! record is checked: restoring the manager release onto a new cluster
//! without pointing it at a new path would leave two managers writing to one
//! path, so that case fails unless `--force` or `--dry-run` is given. The
//! check is advisory; backends offer no compare-and-swap.
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`backend`]: Storage backends (local, S3, in-memory)
//! - [`release`]: Release model, value overrides and codec
//! - [`state`]: State record and release store
//! - [`deploy`]: Conflict gate, bounded orchestrator and worker pool
//! - [`cluster`]: Install and listing capabilities, helm adapter
//! - [`workflow`]: Export, import and transfer runs
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! backend:
//!   kind: s3
//!   bucket: release-snapshots
//!   storage_path: clusters/prod-eu
//!
//! export:
//!   release_name: releasemanager
//!
//! import:
//!   new_storage_path: clusters/prod-us
//!   exclude_namespaces: [kube-system]
//!   values:
//!     image.tag: v2.3.1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backend;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod deploy;
pub mod error;
pub mod release;
pub mod state;
pub mod workflow;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{Backend, LocalBackend, MemoryBackend, S3Backend};
pub use cli::{Cli, Commands, OutputFormatter};
pub use cluster::{HelmClient, Installer, ReleaseSource};
pub use config::{ConfigParser, ConfigValidator, ManagerConfig};
pub use deploy::{BatchReport, ConflictResolver, DeploymentOrchestrator, WorkerPool};
pub use error::{ReleaseManagerError, Result};
pub use release::{Release, ReleaseCodec};
pub use state::{ReleaseStore, StateInfo, StateManager};
pub use workflow::{Exporter, Importer, Transferer};
