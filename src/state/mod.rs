//! Remote state for the release manager.
//!
//! This module provides the state record that marks ownership of a storage
//! path, the store for release files kept beside it, and the run identity
//! used to tag log output.

mod types;
mod path;
mod releases;
mod manager;
mod identity;

pub use self::identity::generate_run_id;
pub use self::manager::{StateChange, StateManager};
pub use self::path::remote_file_path;
pub use self::releases::ReleaseStore;
pub use self::types::{StateInfo, STATE_FILE_NAME};
