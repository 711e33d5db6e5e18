//! Release codec.
//!
//! Releases are stored one per file as YAML, named `<name>-<version>.yaml`.

use std::fmt::Write;

use crate::error::{ReleaseError, Result};

use super::types::Release;

/// Extension every stored release file carries.
pub const RELEASE_EXTENSION: &str = ".yaml";

/// Encodes, decodes, names and renders releases.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReleaseCodec;

impl ReleaseCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encodes a release to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the release cannot be serialized.
    pub fn encode(&self, release: &Release) -> Result<Vec<u8>> {
        serde_yaml::to_string(release)
            .map(String::into_bytes)
            .map_err(|e| {
                ReleaseError::Encode {
                    name: release.name.clone(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Decodes a release from bytes read from `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid release.
    pub fn decode(&self, file: &str, data: &[u8]) -> Result<Release> {
        serde_yaml::from_slice(data).map_err(|e| {
            ReleaseError::Decode {
                file: file.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Deterministic file name for a release.
    #[must_use]
    pub fn filename(&self, release: &Release) -> String {
        format!("{}-{}{RELEASE_EXTENSION}", release.name, release.version)
    }

    /// Returns true if `name` follows the release file naming convention.
    #[must_use]
    pub fn is_release_file(&self, name: &str) -> bool {
        name.len() > RELEASE_EXTENSION.len() && name.ends_with(RELEASE_EXTENSION)
    }

    /// Renders a release for dry-run display.
    ///
    /// The verbose form appends the full values document.
    #[must_use]
    pub fn render(&self, release: &Release, verbose: bool) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "release:   {}", release.name);
        let _ = writeln!(output, "namespace: {}", release.namespace);
        let _ = writeln!(output, "version:   {}", release.version);
        let _ = write!(output, "chart:     {}", release.chart);
        if let Some(repository) = &release.chart.repository {
            let _ = write!(output, " ({repository})");
        }
        output.push('\n');

        if verbose {
            output.push_str("values:\n");
            if release.values.is_empty() {
                output.push_str("  {}\n");
            } else {
                let values = serde_yaml::to_string(&release.values).unwrap_or_default();
                for line in values.lines() {
                    let _ = writeln!(output, "  {line}");
                }
            }
        }

        output
    }
}
