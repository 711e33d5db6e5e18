//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{parse_override, BackendKind, ManagerConfig};
use crate::error::Result;

/// Release Manager - snapshot cluster releases to a backend and restore them.
#[derive(Parser, Debug)]
#[command(name = "releasemanager")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "RELEASEMANAGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Compute and print every decision without writing or installing.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Backend connection options.
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Kube context to target.
    #[arg(long, global = true, env = "RELEASEMANAGER_KUBE_CONTEXT")]
    pub kube_context: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Backend connection options shared by every command.
#[derive(Args, Debug, Default)]
pub struct BackendArgs {
    /// Backend kind.
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    /// Storage path releases and state are kept under.
    #[arg(short, long, global = true)]
    pub path: Option<String>,

    /// Root directory for the local backend.
    #[arg(long, global = true)]
    pub root: Option<String>,

    /// Bucket for the s3 backend.
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Region for the s3 backend.
    #[arg(long, global = true)]
    pub region: Option<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export deployed releases to the backend.
    Export {
        /// Helm release name of the release manager itself.
        #[arg(long)]
        release_name: Option<String>,

        /// Comma-separated namespaces to export (default: all).
        #[arg(long, value_delimiter = ',')]
        namespaces: Vec<String>,
    },

    /// Install stored releases, with filters and overrides.
    Import {
        /// Deployment options.
        #[command(flatten)]
        deploy: DeployArgs,

        /// Only import releases from these namespaces.
        #[arg(long = "namespace", value_delimiter = ',')]
        namespaces: Vec<String>,

        /// Skip releases from these namespaces.
        #[arg(long = "exclude-namespace", value_delimiter = ',')]
        exclude_namespaces: Vec<String>,

        /// Install every release into this namespace.
        #[arg(long)]
        target_namespace: Option<String>,

        /// Value override as KEY=VALUE; may be repeated.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },

    /// Install every stored release as it was exported.
    Transfer {
        /// Deployment options.
        #[command(flatten)]
        deploy: DeployArgs,
    },

    /// Inspect or remove the state record.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },

    /// List stored releases.
    Releases,

    /// Validate the configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Options shared by import and transfer.
#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Skip the state conflict check.
    #[arg(long)]
    pub force: bool,

    /// Storage path the restored release manager should write to.
    #[arg(long)]
    pub new_path: Option<String>,

    /// Seconds to wait for each release to install.
    #[arg(long)]
    pub release_timeout: Option<u64>,

    /// Maximum installs in flight.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show the current state record.
    Show,

    /// Remove the state record.
    Remove,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies flag values on top of a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a `--set` override is malformed.
    pub fn apply_to(&self, config: &mut ManagerConfig) -> Result<()> {
        config.verbose |= self.verbose;
        config.dry_run |= self.dry_run;

        if let Some(kind) = self.backend.backend {
            config.backend.kind = kind;
        }
        if let Some(path) = &self.backend.path {
            config.backend.storage_path.clone_from(path);
        }
        if self.backend.root.is_some() {
            config.backend.root.clone_from(&self.backend.root);
        }
        if self.backend.bucket.is_some() {
            config.backend.bucket.clone_from(&self.backend.bucket);
        }
        if self.backend.region.is_some() {
            config.backend.region.clone_from(&self.backend.region);
        }
        if self.kube_context.is_some() {
            config.install.kube_context.clone_from(&self.kube_context);
        }

        match &self.command {
            Commands::Export {
                release_name,
                namespaces,
            } => {
                if release_name.is_some() {
                    config.export.release_name.clone_from(release_name);
                }
                if !namespaces.is_empty() {
                    config.export.namespaces = trimmed(namespaces);
                }
            }
            Commands::Import {
                deploy,
                namespaces,
                exclude_namespaces,
                target_namespace,
                values,
            } => {
                deploy.apply_install(config);
                config.import.force |= deploy.force;
                if deploy.new_path.is_some() {
                    config.import.new_storage_path.clone_from(&deploy.new_path);
                }
                if !namespaces.is_empty() {
                    config.import.namespaces = trimmed(namespaces);
                }
                if !exclude_namespaces.is_empty() {
                    config.import.exclude_namespaces = trimmed(exclude_namespaces);
                }
                if target_namespace.is_some() {
                    config.import.target_namespace.clone_from(target_namespace);
                }
                for raw in values {
                    let (key, value) = parse_override(raw)?;
                    config.import.values.insert(key, value);
                }
            }
            Commands::Transfer { deploy } => {
                deploy.apply_install(config);
                config.transfer.force |= deploy.force;
                if deploy.new_path.is_some() {
                    config.transfer.new_storage_path.clone_from(&deploy.new_path);
                }
            }
            Commands::State { .. } | Commands::Releases | Commands::Validate { .. } => {}
        }

        Ok(())
    }
}

impl DeployArgs {
    fn apply_install(&self, config: &mut ManagerConfig) {
        if let Some(timeout) = self.release_timeout {
            config.install.timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.install.concurrency = concurrency;
        }
    }
}

fn trimmed(namespaces: &[String]) -> Vec<String> {
    namespaces
        .iter()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_flags_apply() {
        let cli = Cli::parse_from([
            "releasemanager",
            "--path",
            "clusters/a",
            "import",
            "--new-path",
            "clusters/b",
            "--namespace",
            "default, apps",
            "--set",
            "image.tag=v2",
            "--release-timeout",
            "60",
            "--concurrency",
            "2",
        ]);

        let mut config = ManagerConfig::default();
        cli.apply_to(&mut config).expect("apply");

        assert_eq!(config.backend.storage_path, "clusters/a");
        assert_eq!(config.import.new_storage_path.as_deref(), Some("clusters/b"));
        assert_eq!(config.import.namespaces, vec!["default", "apps"]);
        assert_eq!(config.import.values.get("image.tag").map(String::as_str), Some("v2"));
        assert_eq!(config.install.timeout_secs, 60);
        assert_eq!(config.install.concurrency, 2);
    }

    #[test]
    fn test_export_flags_apply() {
        let cli = Cli::parse_from([
            "releasemanager",
            "export",
            "--release-name",
            "mgr",
            "--namespaces",
            "apps,ops",
            "--dry-run",
        ]);

        let mut config = ManagerConfig::default();
        cli.apply_to(&mut config).expect("apply");

        assert!(config.dry_run);
        assert_eq!(config.manager_release_name(), Some("mgr"));
        assert_eq!(config.export.namespaces, vec!["apps", "ops"]);
    }

    #[test]
    fn test_malformed_override_rejected() {
        let cli = Cli::parse_from(["releasemanager", "import", "--set", "novalue"]);
        let mut config = ManagerConfig::default();
        assert!(cli.apply_to(&mut config).is_err());
    }

    #[test]
    fn test_transfer_force() {
        let cli = Cli::parse_from(["releasemanager", "transfer", "--force"]);
        let mut config = ManagerConfig::default();
        cli.apply_to(&mut config).expect("apply");
        assert!(config.transfer.force);
        assert!(!config.import.force);
    }
}
