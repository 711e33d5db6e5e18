//! Deployment orchestrator.
//!
//! A batch moves through five stages in order: namespace filter, value
//! overrides, target namespace, manager path rewrite, then dispatch. The
//! first two run over the whole batch and abort it on error. The last three
//! run per release, and a failure there only ends that release.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::cluster::Installer;
use crate::config::{ManagerConfig, DEFAULT_DEPLOY_CONCURRENCY, VALUE_STORAGE_PATH};
use crate::error::Result;
use crate::release::{Release, ReleaseCodec};
use crate::state::StateInfo;

use super::pool::WorkerPool;
use super::report::{BatchReport, ReleaseOutcome, ReleaseResult};

/// Options controlling a batch deployment.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Namespaces to keep; takes precedence over the exclude list.
    pub namespaces: Vec<String>,
    /// Namespaces to drop.
    pub exclude_namespaces: Vec<String>,
    /// Namespace every release is installed into.
    pub target_namespace: Option<String>,
    /// Dotted-key value overrides.
    pub values: BTreeMap<String, String>,
    /// Storage path the restored manager release should write to.
    pub new_storage_path: Option<String>,
    /// Render instead of install.
    pub dry_run: bool,
    /// Render the full values document.
    pub verbose: bool,
    /// Treat "already exists" as a skip rather than a failure.
    pub skip_existing: bool,
    /// Maximum installs in flight.
    pub concurrency: usize,
    /// Per-install timeout passed to the installer.
    pub timeout: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            exclude_namespaces: Vec::new(),
            target_namespace: None,
            values: BTreeMap::new(),
            new_storage_path: None,
            dry_run: false,
            verbose: false,
            skip_existing: false,
            concurrency: DEFAULT_DEPLOY_CONCURRENCY,
            timeout: Duration::from_secs(crate::config::DEFAULT_INSTALL_TIMEOUT_SECS),
        }
    }
}

impl DeployOptions {
    /// Options for an import: filters and overrides apply, existing
    /// releases are skipped.
    #[must_use]
    pub fn for_import(config: &ManagerConfig) -> Self {
        Self {
            namespaces: config.import.namespaces.clone(),
            exclude_namespaces: config.import.exclude_namespaces.clone(),
            target_namespace: config
                .import
                .target_namespace
                .clone()
                .filter(|ns| !ns.is_empty()),
            values: config.import.values.clone(),
            new_storage_path: config.import.new_storage_path.clone(),
            dry_run: config.dry_run,
            verbose: config.verbose,
            skip_existing: true,
            concurrency: config.install.concurrency,
            timeout: config.install.timeout(),
        }
    }

    /// Options for a transfer: every stored release is installed as is.
    #[must_use]
    pub fn for_transfer(config: &ManagerConfig) -> Self {
        Self {
            new_storage_path: config.transfer.new_storage_path.clone(),
            dry_run: config.dry_run,
            verbose: config.verbose,
            skip_existing: false,
            concurrency: config.install.concurrency,
            timeout: config.install.timeout(),
            ..Self::default()
        }
    }

    /// New storage path, if a non-empty one was given.
    #[must_use]
    pub fn new_path(&self) -> Option<&str> {
        self.new_storage_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// A filtered batch with overrides applied, ready for dispatch.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    /// Releases to dispatch.
    pub releases: Vec<Release>,
    /// Releases dropped by the namespace filter.
    pub filtered_out: usize,
}

/// Filters, rewrites and installs batches of releases.
pub struct DeploymentOrchestrator {
    /// Install capability.
    installer: Arc<dyn Installer>,
    /// Batch options.
    options: DeployOptions,
    /// Codec used for dry-run renders.
    codec: ReleaseCodec,
    /// Pool bounding concurrent installs.
    pool: WorkerPool,
}

impl DeploymentOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(installer: Arc<dyn Installer>, options: DeployOptions) -> Self {
        let pool = WorkerPool::new(options.concurrency);
        Self {
            installer,
            options,
            codec: ReleaseCodec::new(),
            pool,
        }
    }

    /// Gets the batch options.
    #[must_use]
    pub const fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Runs the batch-wide stages: namespace filter, then value overrides.
    ///
    /// # Errors
    ///
    /// Returns the first override that cannot be applied; no release of the
    /// batch proceeds in that case.
    pub fn prepare(&self, releases: Vec<Release>) -> Result<PreparedBatch> {
        let total = releases.len();
        let releases = self.filter(releases);
        let filtered_out = total - releases.len();
        if filtered_out > 0 {
            info!("Filtered out {} of {} releases by namespace", filtered_out, total);
        }

        let releases = self.apply_overrides(releases)?;
        Ok(PreparedBatch {
            releases,
            filtered_out,
        })
    }

    /// Keeps releases by namespace. The allow list wins over the exclude list.
    #[must_use]
    pub fn filter(&self, releases: Vec<Release>) -> Vec<Release> {
        if !self.options.namespaces.is_empty() {
            return releases
                .into_iter()
                .filter(|r| self.options.namespaces.contains(&r.namespace))
                .collect();
        }

        if !self.options.exclude_namespaces.is_empty() {
            return releases
                .into_iter()
                .filter(|r| !self.options.exclude_namespaces.contains(&r.namespace))
                .collect();
        }

        releases
    }

    /// Applies every value override to every release.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn apply_overrides(&self, releases: Vec<Release>) -> Result<Vec<Release>> {
        if self.options.values.is_empty() {
            return Ok(releases);
        }

        debug!("Applying {} value overrides", self.options.values.len());
        releases
            .iter()
            .map(|r| r.with_values(&self.options.values))
            .collect()
    }

    /// Runs the per-release stages: target namespace and manager path.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager release's storage path cannot be set.
    pub fn rewrite(&self, release: &Release, state: Option<&StateInfo>) -> Result<Release> {
        let release = match &self.options.target_namespace {
            Some(namespace) => release.in_namespace(namespace),
            None => release.clone(),
        };

        match (state, self.options.new_path()) {
            (Some(info), Some(path)) if info.is_manager(&release) => {
                info!(
                    "Pointing manager release {} at storage path {}",
                    release.name, path
                );
                release.with_value(VALUE_STORAGE_PATH, path)
            }
            _ => Ok(release),
        }
    }

    /// Dispatches a prepared batch and waits for every release to finish.
    ///
    /// Individual failures are logged and recorded in the report; they never
    /// stop the rest of the batch.
    pub async fn dispatch(&self, batch: PreparedBatch, state: Option<&StateInfo>) -> BatchReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(batch.releases.len());
        let mut pending = Vec::new();

        for release in &batch.releases {
            info!(
                "Deploying release {} to namespace {}",
                release.name,
                self.options
                    .target_namespace
                    .as_deref()
                    .unwrap_or(&release.namespace)
            );

            let release = match self.rewrite(release, state) {
                Ok(release) => release,
                Err(e) => {
                    error!(
                        "Unable to update the storage path for manager release {}: {}. Skipping.",
                        release.name, e
                    );
                    results.push(ReleaseResult {
                        name: release.name.clone(),
                        namespace: release.namespace.clone(),
                        outcome: ReleaseOutcome::Failed {
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            if self.options.dry_run {
                let output = self.codec.render(&release, self.options.verbose);
                results.push(ReleaseResult {
                    name: release.name.clone(),
                    namespace: release.namespace.clone(),
                    outcome: ReleaseOutcome::DryRunRendered { output },
                });
                continue;
            }

            pending.push(release);
        }

        let installed = self
            .pool
            .run(pending, |release| async move {
                let outcome = self.install(&release).await;
                ReleaseResult {
                    name: release.name,
                    namespace: release.namespace,
                    outcome,
                }
            })
            .await;
        results.extend(installed);

        BatchReport {
            results,
            filtered_out: batch.filtered_out,
            dry_run: self.options.dry_run,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Prepares and dispatches `releases` in one call.
    ///
    /// # Errors
    ///
    /// Returns an error only from the batch-wide stages.
    pub async fn deploy(&self, releases: Vec<Release>, state: Option<&StateInfo>) -> Result<BatchReport> {
        let batch = self.prepare(releases)?;
        Ok(self.dispatch(batch, state).await)
    }

    async fn install(&self, release: &Release) -> ReleaseOutcome {
        match self.installer.install(release, self.options.timeout).await {
            Ok(()) => {
                info!("Successfully deployed release {}", release.qualified_name());
                ReleaseOutcome::Installed
            }
            Err(e) if e.is_already_exists() && self.options.skip_existing => {
                info!("Skipping release: {} already exists", release.qualified_name());
                ReleaseOutcome::SkippedAlreadyExists
            }
            Err(e) => {
                error!("Error deploying release {}: {}", release.qualified_name(), e);
                ReleaseOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("options", &self.options)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockInstaller;
    use crate::error::InstallError;
    use crate::release::ChartRef;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Installer that records how many installs overlap.
    #[derive(Default)]
    struct CountingInstaller {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        installed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Installer for CountingInstaller {
        async fn install(
            &self,
            release: &Release,
            _timeout: Duration,
        ) -> std::result::Result<(), InstallError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.installed
                .lock()
                .expect("lock poisoned")
                .push(release.name.clone());
            Ok(())
        }
    }

    fn release(name: &str, namespace: &str) -> Release {
        let mut release = Release::new(name, namespace, 1, ChartRef::new(name, "1.0.0"));
        release.values = serde_yaml::from_str("path: clusters/a\nimage:\n  tag: v1\n")
            .expect("values");
        release
    }

    fn options() -> DeployOptions {
        DeployOptions {
            skip_existing: true,
            ..DeployOptions::default()
        }
    }

    #[test]
    fn test_allow_list_scenario() {
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(MockInstaller::new()),
            DeployOptions {
                namespaces: vec![String::from("default")],
                ..options()
            },
        );

        let batch = orchestrator
            .prepare(vec![release("a", "default"), release("b", "kube-system")])
            .expect("prepare");
        let names: Vec<_> = batch.releases.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(batch.filtered_out, 1);
    }

    #[test]
    fn test_allow_list_takes_precedence() {
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(MockInstaller::new()),
            DeployOptions {
                namespaces: vec![String::from("default")],
                exclude_namespaces: vec![String::from("default")],
                ..options()
            },
        );

        let kept = orchestrator.filter(vec![release("a", "default"), release("b", "apps")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "a");
    }

    #[test]
    fn test_exclude_list() {
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(MockInstaller::new()),
            DeployOptions {
                exclude_namespaces: vec![String::from("kube-system")],
                ..options()
            },
        );

        let kept = orchestrator.filter(vec![release("a", "default"), release("b", "kube-system")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "a");
    }

    #[test]
    fn test_override_failure_aborts_batch() {
        let mut values = BTreeMap::new();
        values.insert(String::from("image.tag"), String::from("v2"));
        values.insert(String::from("path.nested"), String::from("x"));

        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(MockInstaller::new()),
            DeployOptions { values, ..options() },
        );

        assert!(orchestrator
            .prepare(vec![release("a", "default"), release("b", "default")])
            .is_err());
    }

    #[test]
    fn test_filter_sees_original_namespace() {
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(MockInstaller::new()),
            DeployOptions {
                namespaces: vec![String::from("default")],
                target_namespace: Some(String::from("restored")),
                ..options()
            },
        );

        let batch = orchestrator
            .prepare(vec![release("a", "default"), release("b", "apps")])
            .expect("prepare");
        assert_eq!(batch.releases.len(), 1);

        let rewritten = orchestrator
            .rewrite(&batch.releases[0], None)
            .expect("rewrite");
        assert_eq!(rewritten.namespace, "restored");
        assert_eq!(batch.releases[0].namespace, "default");
    }

    #[test]
    fn test_manager_path_rewrite() {
        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(MockInstaller::new()),
            DeployOptions {
                new_storage_path: Some(String::from("clusters/b")),
                ..options()
            },
        );
        let state = StateInfo::new("mgr-1.yaml", "mgr", 1);

        let manager = orchestrator
            .rewrite(&release("mgr", "ops"), Some(&state))
            .expect("rewrite");
        assert_eq!(
            manager.value("path").and_then(serde_yaml::Value::as_str),
            Some("clusters/b")
        );

        let other = orchestrator
            .rewrite(&release("web", "apps"), Some(&state))
            .expect("rewrite");
        assert_eq!(
            other.value("path").and_then(serde_yaml::Value::as_str),
            Some("clusters/a")
        );

        let no_state = orchestrator
            .rewrite(&release("mgr", "ops"), None)
            .expect("rewrite");
        assert_eq!(
            no_state.value("path").and_then(serde_yaml::Value::as_str),
            Some("clusters/a")
        );
    }

    #[tokio::test]
    async fn test_bounded_dispatch() {
        let installer = Arc::new(CountingInstaller::default());
        let orchestrator = DeploymentOrchestrator::new(
            installer.clone(),
            DeployOptions {
                concurrency: 3,
                ..options()
            },
        );

        let releases: Vec<_> = (0..10).map(|i| release(&format!("r{i}"), "default")).collect();
        let report = orchestrator.deploy(releases, None).await.expect("deploy");

        assert_eq!(report.installed(), 10);
        assert!(installer.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(installer.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(installer.installed.lock().expect("lock poisoned").len(), 10);
    }

    #[tokio::test]
    async fn test_already_exists_is_skipped_on_import() {
        let mut installer = MockInstaller::new();
        installer.expect_install().times(3).returning(|release, _| {
            if release.name == "x" {
                Err(InstallError::AlreadyExists {
                    name: release.name.clone(),
                })
            } else {
                Ok(())
            }
        });

        let orchestrator = DeploymentOrchestrator::new(Arc::new(installer), options());
        let report = orchestrator
            .deploy(
                vec![release("w", "default"), release("x", "default"), release("y", "default")],
                None,
            )
            .await
            .expect("deploy");

        assert_eq!(report.outcome("x"), Some(&ReleaseOutcome::SkippedAlreadyExists));
        assert_eq!(report.installed(), 2);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_already_exists_fails_without_skip() {
        let mut installer = MockInstaller::new();
        installer.expect_install().returning(|release, _| {
            Err(InstallError::AlreadyExists {
                name: release.name.clone(),
            })
        });

        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(installer),
            DeployOptions {
                skip_existing: false,
                ..options()
            },
        );
        let report = orchestrator
            .deploy(vec![release("x", "default")], None)
            .await
            .expect("deploy");
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let mut installer = MockInstaller::new();
        installer.expect_install().times(4).returning(|release, _| {
            if release.name == "bad" {
                Err(InstallError::failed(&release.name, "chart not found"))
            } else {
                Ok(())
            }
        });

        let orchestrator = DeploymentOrchestrator::new(Arc::new(installer), options());
        let report = orchestrator
            .deploy(
                vec![
                    release("a", "default"),
                    release("bad", "default"),
                    release("c", "default"),
                    release("d", "default"),
                ],
                None,
            )
            .await
            .expect("deploy");

        assert_eq!(report.installed(), 3);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.outcome("bad"), Some(ReleaseOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn test_dry_run_installs_nothing() {
        let mut installer = MockInstaller::new();
        installer.expect_install().never();

        let orchestrator = DeploymentOrchestrator::new(
            Arc::new(installer),
            DeployOptions {
                dry_run: true,
                target_namespace: Some(String::from("restored")),
                ..options()
            },
        );
        let report = orchestrator
            .deploy(vec![release("a", "default"), release("b", "apps")], None)
            .await
            .expect("deploy");

        assert_eq!(report.rendered(), 2);
        assert!(report.dry_run);
        match report.outcome("a") {
            Some(ReleaseOutcome::DryRunRendered { output }) => {
                assert!(output.contains("namespace: restored"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
