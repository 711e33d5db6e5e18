//! Helm command-line adapter.
//!
//! Drives the `helm` binary to list deployed releases and install stored
//! ones. Helm's own error text is classified here, at the boundary, so the
//! rest of the crate only sees tagged `InstallError` values.

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::InstallConfig;
use crate::error::{InstallError, Result};
use crate::release::{ChartRef, Release};

use super::capability::{Installer, ReleaseSource};

/// Extra time allowed past helm's own timeout before the call is abandoned.
const TIMEOUT_GRACE_SECS: u64 = 30;

/// Entry of `helm list --output json`.
#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    namespace: String,
    revision: String,
    chart: String,
}

/// Helm client.
#[derive(Debug, Clone)]
pub struct HelmClient {
    /// Path or name of the helm binary.
    binary: String,
    /// Kube context to target.
    kube_context: Option<String>,
    /// Repository used for charts that carry none.
    chart_repository: Option<String>,
}

impl HelmClient {
    /// Creates a client for the given helm binary.
    #[must_use]
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            kube_context: None,
            chart_repository: None,
        }
    }

    /// Creates a client from the install configuration.
    #[must_use]
    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            binary: config.helm_binary.clone(),
            kube_context: config.kube_context.clone(),
            chart_repository: config.chart_repository.clone(),
        }
    }

    /// Builds the argument list for installing `release`.
    #[must_use]
    pub fn install_args(&self, release: &Release, timeout: Duration) -> Vec<String> {
        let mut args = vec![
            String::from("install"),
            release.name.clone(),
            release.chart.name.clone(),
            String::from("--namespace"),
            release.namespace.clone(),
            String::from("--create-namespace"),
        ];

        if !release.chart.version.is_empty() {
            args.push(String::from("--version"));
            args.push(release.chart.version.clone());
        }

        let repository = release
            .chart
            .repository
            .as_ref()
            .or(self.chart_repository.as_ref());
        if let Some(repository) = repository {
            args.push(String::from("--repo"));
            args.push(repository.clone());
        }

        args.push(String::from("--values"));
        args.push(String::from("-"));
        args.push(String::from("--timeout"));
        args.push(format!("{}s", timeout.as_secs()));
        args.push(String::from("--wait"));

        self.push_context(&mut args);
        args
    }

    /// Builds the argument list for listing every deployed release.
    ///
    /// `--max 0` lifts helm's default page size so the listing is complete.
    #[must_use]
    pub fn list_args(&self) -> Vec<String> {
        let mut args = vec![
            String::from("list"),
            String::from("--all-namespaces"),
            String::from("--max"),
            String::from("0"),
            String::from("--output"),
            String::from("json"),
        ];
        self.push_context(&mut args);
        args
    }

    fn push_context(&self, args: &mut Vec<String>) {
        if let Some(context) = &self.kube_context {
            args.push(String::from("--kube-context"));
            args.push(context.clone());
        }
    }

    /// Runs helm with `args`, feeding `stdin` if given.
    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> std::result::Result<Output, InstallError> {
        debug!("Running {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InstallError::Unavailable {
                message: format!("failed to run {}: {e}", self.binary),
            })?;

        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(data)
                .await
                .map_err(|e| InstallError::Unavailable {
                    message: format!("failed to write to {}: {e}", self.binary),
                })?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| InstallError::Unavailable {
                message: format!("failed to wait for {}: {e}", self.binary),
            })
    }

    async fn release_values(&self, entry: &ListEntry) -> Result<Mapping> {
        let mut args = vec![
            String::from("get"),
            String::from("values"),
            entry.name.clone(),
            String::from("--namespace"),
            entry.namespace.clone(),
            String::from("--output"),
            String::from("yaml"),
        ];
        self.push_context(&mut args);

        let output = self.run(&args, None).await?;
        if !output.status.success() {
            return Err(InstallError::Unavailable {
                message: stderr_message(&output),
            }
            .into());
        }

        Ok(parse_values(&output.stdout)?)
    }
}

#[async_trait]
impl ReleaseSource for HelmClient {
    async fn deployed_releases(&self) -> Result<Vec<Release>> {
        let args = self.list_args();

        let output = self.run(&args, None).await?;
        if !output.status.success() {
            return Err(InstallError::Unavailable {
                message: stderr_message(&output),
            }
            .into());
        }

        let entries = parse_list(&output.stdout)?;
        info!("Found {} deployed releases", entries.len());

        let mut releases = Vec::with_capacity(entries.len());
        for entry in entries {
            let version = parse_revision(&entry.revision).ok_or_else(|| InstallError::Unavailable {
                message: format!(
                    "unreadable revision {:?} for {}/{}",
                    entry.revision, entry.namespace, entry.name
                ),
            })?;
            let mut release = Release::new(
                &entry.name,
                &entry.namespace,
                version,
                ChartRef::parse(&entry.chart),
            );
            release.values = self.release_values(&entry).await?;
            releases.push(release);
        }
        Ok(releases)
    }
}

#[async_trait]
impl Installer for HelmClient {
    async fn install(&self, release: &Release, timeout: Duration) -> std::result::Result<(), InstallError> {
        let args = self.install_args(release, timeout);
        let values = serde_yaml::to_string(&release.values)
            .map_err(|e| InstallError::failed(&release.name, e.to_string()))?;

        let deadline = timeout + Duration::from_secs(TIMEOUT_GRACE_SECS);
        let output = tokio::time::timeout(deadline, self.run(&args, Some(values.as_bytes())))
            .await
            .map_err(|_| InstallError::TimedOut {
                name: release.name.clone(),
                timeout_secs: timeout.as_secs(),
            })??;

        if output.status.success() {
            return Ok(());
        }

        Err(classify_failure(release, timeout, &stderr_message(&output)))
    }
}

/// Parses `helm list --output json`.
fn parse_list(stdout: &[u8]) -> std::result::Result<Vec<ListEntry>, InstallError> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text).map_err(|e| InstallError::Unavailable {
        message: format!("unexpected helm list output: {e}"),
    })
}

/// Parses a helm revision; revisions start at 1.

fn parse_revision(revision: &str) -> Option<u32> {
    revision.trim().parse().ok().filter(|version| *version > 0)
}

/// Parses `helm get values --output yaml`; `null` means no values.
fn parse_values(stdout: &[u8]) -> std::result::Result<Mapping, InstallError> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(stdout).map_err(|e| InstallError::Unavailable {
            message: format!("unexpected helm values output: {e}"),
        })?;

    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        _ => Ok(Mapping::new()),
    }
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = stderr.trim();
    let message = message.strip_prefix("Error:").unwrap_or(message).trim();
    if message.is_empty() {
        format!("helm exited with {}", output.status)
    } else {
        message.to_string()
    }
}

/// Maps helm's failure text to a tagged install error.
///
/// Only a release name collision counts as already existing. A rendered
/// resource owned by something else is a real failure.
fn classify_failure(release: &Release, timeout: Duration, message: &str) -> InstallError {
    let lower = message.to_lowercase();

    if lower.contains("cannot re-use a name that is still in use") {
        InstallError::AlreadyExists {
            name: release.name.clone(),
        }
    } else if lower.contains("timed out waiting") {
        InstallError::TimedOut {
            name: release.name.clone(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        InstallError::failed(&release.name, message)
    }
}
