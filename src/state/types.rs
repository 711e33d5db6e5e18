//! State record types.
//!
//! The state record marks a storage path as owned by one manager release.
//! Its presence means some manager currently writes snapshots to the path.

use serde::{Deserialize, Serialize};

use crate::release::{Release, ReleaseCodec};

/// Well-known name of the state record under the storage path.
pub const STATE_FILE_NAME: &str = "releasemanager.state.json";

/// The state record.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    /// Stored file name of the manager release.
    #[serde(rename = "ReleaseFilename")]
    pub release_filename: String,
    /// Name of the manager release.
    #[serde(rename = "ReleaseName")]
    pub release_name: String,
    /// Cluster revision of the manager release.
    #[serde(rename = "ReleaseVersion")]
    pub release_version: u32,
}

impl StateInfo {
    /// Creates a state record.
    #[must_use]
    pub fn new(release_filename: &str, release_name: &str, release_version: u32) -> Self {
        Self {
            release_filename: release_filename.to_string(),
            release_name: release_name.to_string(),
            release_version,
        }
    }

    /// Builds the record describing `release` as the manager.
    #[must_use]
    pub fn for_release(release: &Release, codec: &ReleaseCodec) -> Self {
        Self {
            release_filename: codec.filename(release),
            release_name: release.name.clone(),
            release_version: release.version,
        }
    }

    /// Compares every field of two records.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.release_filename == other.release_filename
            && self.release_name == other.release_name
            && self.release_version == other.release_version
    }

    /// Returns true if `release` is the manager release this record names.
    #[must_use]
    pub fn is_manager(&self, release: &Release) -> bool {
        self.release_name == release.name
    }
}

impl PartialEq for StateInfo {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}
