//! Error types for the release manager.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, backend storage, the state record, release handling,
//! and installation onto the target cluster.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the release manager.
#[derive(Debug, Error)]
pub enum ReleaseManagerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend storage errors.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// State record errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Release encoding, decoding and rewriting errors.
    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    /// Cluster installation errors.
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A `key=value` override could not be parsed.
    #[error("Invalid value override '{raw}': expected KEY=VALUE")]
    InvalidOverride {
        /// The raw override string.
        raw: String,
    },
}

/// Backend storage errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport or IO failure talking to storage.
    #[error("Backend unavailable while accessing {path}: {message}")]
    Unavailable {
        /// Path being accessed.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// The requested object does not exist.
    #[error("Object not found: {path}")]
    NotFound {
        /// Path of the missing object.
        path: String,
    },
}

/// State record errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// More than one state record was found under the storage path.
    #[error("Found {count} state files at {path}; remove the extras manually")]
    MultipleStateFiles {
        /// Number of entries found.
        count: usize,
        /// Path that was listed.
        path: String,
    },

    /// The storage path is already owned by another manager release.
    #[error("{message}")]
    Conflict {
        /// Path of the existing state record.
        path: String,
        /// Operator-facing description of the conflict.
        message: String,
    },

    /// The state record could not be decoded.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Release handling errors.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A stored release could not be decoded.
    #[error("Failed to decode release {file}: {message}")]
    Decode {
        /// File the bytes came from.
        file: String,
        /// Description of the decode error.
        message: String,
    },

    /// A release could not be encoded.
    #[error("Failed to encode release {name}: {message}")]
    Encode {
        /// Release name.
        name: String,
        /// Description of the encode error.
        message: String,
    },

    /// A value override could not be applied.
    #[error("Failed to set value '{key}' on release {release}: {message}")]
    ValueOverride {
        /// Release name.
        release: String,
        /// Dotted key being set.
        key: String,
        /// Description of the failure.
        message: String,
    },
}

/// Installation errors, classified by the installer itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    /// A release with the same name is already installed.
    #[error("release {name} already exists")]
    AlreadyExists {
        /// Release name.
        name: String,
    },

    /// The install did not finish within its timeout.
    #[error("release {name} timed out after {timeout_secs}s")]
    TimedOut {
        /// Release name.
        name: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// The installer could not be reached.
    #[error("installer unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Any other install failure.
    #[error("failed to install release {name}: {message}")]
    Failed {
        /// Release name.
        name: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for release manager operations.
pub type Result<T> = std::result::Result<T, ReleaseManagerError>;

impl ReleaseManagerError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error reports a missing backend object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(BackendError::NotFound { .. }))
    }

    /// Returns true if this error is a state ownership conflict.
    #[must_use]
    pub const fn is_state_conflict(&self) -> bool {
        matches!(self, Self::State(StateError::Conflict { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl BackendError {
    /// Creates an unavailable error for the given path.
    #[must_use]
    pub fn unavailable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error for the given path.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl InstallError {
    /// Returns true if the release was already present on the cluster.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Creates a generic install failure.
    #[must_use]
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}
