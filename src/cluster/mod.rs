//! Cluster integration.
//!
//! This module provides the capability traits the workflows consume and the
//! helm-backed implementation of them.

mod capability;
mod helm;

pub use self::capability::{Installer, ReleaseSource};
pub use self::helm::HelmClient;

#[cfg(test)]
pub use self::capability::{MockInstaller, MockReleaseSource};
