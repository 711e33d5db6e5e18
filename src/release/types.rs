//! Release types.
//!
//! A release is a named, versioned deployment of a chart into a namespace,
//! together with the user-supplied values it was installed with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// A deployed release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Release name, unique within its namespace.
    pub name: String,
    /// Namespace the release is installed into.
    pub namespace: String,
    /// Revision counter assigned by the cluster.
    pub version: u32,
    /// Chart the release was installed from.
    pub chart: ChartRef,
    /// User-supplied values.
    #[serde(default)]
    pub values: Mapping,
    /// When the release was captured by an export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

/// Reference to the chart a release was installed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRef {
    /// Chart name.
    pub name: String,
    /// Chart version.
    pub version: String,
    /// Chart repository URL, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl Release {
    /// Creates a release with no values.
    #[must_use]
    pub fn new(name: &str, namespace: &str, version: u32, chart: ChartRef) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            version,
            chart,
            values: Mapping::new(),
            exported_at: None,
        }
    }

    /// Returns a copy installed into `namespace`.
    #[must_use]
    pub fn in_namespace(&self, namespace: &str) -> Self {
        let mut release = self.clone();
        release.namespace = namespace.to_string();
        release
    }

    /// Looks up a value by dotted key.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Returns the `namespace/name` identifier used in logs.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl ChartRef {
    /// Creates a chart reference without a repository.
    #[must_use]
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            repository: None,
        }
    }

    /// Splits a `name-version` chart string as reported by helm.
    ///
    /// The version starts at the first `-` followed by a digit.
    #[must_use]
    pub fn parse(chart: &str) -> Self {
        let split = chart
            .match_indices('-')
            .map(|(i, _)| i)
            .find(|i| {
                chart[i + 1..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit())
            });

        match split {
            Some(i) => Self::new(&chart[..i], &chart[i + 1..]),
            None => Self::new(chart, ""),
        }
    }
}

impl std::fmt::Display for ChartRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}-{}", self.name, self.version)
        }
    }
}
