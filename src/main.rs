//! Release Manager CLI entrypoint.
//!
//! This is the main entrypoint for the releasemanager command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use release_manager::backend::{self, Backend};
use release_manager::cli::{Cli, Commands, OutputFormatter, StateCommands};
use release_manager::cluster::HelmClient;
use release_manager::config::{find_config_file, ConfigParser, ConfigValidator, ManagerConfig};
use release_manager::error::Result;
use release_manager::state::{ReleaseStore, StateManager};
use release_manager::workflow::{Exporter, Importer, Transferer};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    if let Commands::Validate { warnings } = &cli.command {
        return cmd_validate(&cli, *warnings, &formatter);
    }

    let config = load_config(&cli)?;
    let backend = backend::from_config(&config.backend).await?;

    match &cli.command {
        Commands::Export { .. } => cmd_export(backend, &config, &formatter).await,
        Commands::Import { .. } => cmd_import(backend, &config, &formatter).await,
        Commands::Transfer { .. } => cmd_transfer(backend, &config, &formatter).await,
        Commands::State { command } => cmd_state(backend, &config, command, &formatter).await,
        Commands::Releases => cmd_releases(backend, &config, &formatter).await,
        Commands::Validate { .. } => Ok(()),
    }
}

/// Export deployed releases.
async fn cmd_export(
    backend: Arc<dyn Backend>,
    config: &ManagerConfig,
    formatter: &OutputFormatter,
) -> Result<()> {
    let helm = Arc::new(HelmClient::from_config(&config.install));
    let summary = Exporter::new(backend, helm, config).run().await?;
    emit(&formatter.format_export(&summary));
    Ok(())
}

/// Import stored releases.
async fn cmd_import(
    backend: Arc<dyn Backend>,
    config: &ManagerConfig,
    formatter: &OutputFormatter,
) -> Result<()> {
    let helm = Arc::new(HelmClient::from_config(&config.install));
    let run = Importer::new(backend, helm, config).run().await?;
    emit(&formatter.format_deploy_run(&run));
    Ok(())
}

/// Transfer stored releases.
async fn cmd_transfer(
    backend: Arc<dyn Backend>,
    config: &ManagerConfig,
    formatter: &OutputFormatter,
) -> Result<()> {
    let helm = Arc::new(HelmClient::from_config(&config.install));
    let run = Transferer::new(backend, helm, config).run().await?;
    emit(&formatter.format_deploy_run(&run));
    Ok(())
}

/// State management commands.
async fn cmd_state(
    backend: Arc<dyn Backend>,
    config: &ManagerConfig,
    command: &StateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let state = StateManager::new(backend, &config.backend.storage_path);

    match command {
        StateCommands::Show => {
            let info = state.read_optional().await?;
            emit(&formatter.format_state(&state.path(), info.as_ref()));
        }
        StateCommands::Remove => {
            if config.dry_run {
                warn!("Dry run: not removing {}", state.path());
                emit(&formatter.success(&format!("Would remove state {}", state.path())));
            } else {
                state.remove().await?;
                emit(&formatter.success(&format!("Removed state {}", state.path())));
            }
        }
    }

    Ok(())
}

/// List stored releases.
async fn cmd_releases(
    backend: Arc<dyn Backend>,
    config: &ManagerConfig,
    formatter: &OutputFormatter,
) -> Result<()> {
    let store = ReleaseStore::new(
        backend,
        &config.backend.storage_path,
        config.retrieval_concurrency,
    );
    let mut releases = store.stored_releases().await?;
    releases.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    emit(&formatter.format_releases(&releases));
    Ok(())
}

/// Validate configuration.
fn cmd_validate(cli: &Cli, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let config = load_unvalidated(cli)?;

    match ConfigValidator::new().validate(&config) {
        Ok(result) => {
            emit(&formatter.format_validation(&result, show_warnings));
            Ok(())
        }
        Err(e) => {
            emit(&formatter.error(&e.to_string()));
            Err(e)
        }
    }
}

/// Resolves the configuration file, if any.
fn resolve_config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|dir| find_config_file(dir))
    })
}

/// Loads configuration from file, `.env`, environment and flags.
fn load_unvalidated(cli: &Cli) -> Result<ManagerConfig> {
    let config_file = resolve_config_path(cli);
    match &config_file {
        Some(path) => debug!("Loading configuration from: {}", path.display()),
        None => debug!("No configuration file found; using defaults"),
    }

    let parser = ConfigParser::new().with_base_path(
        config_file
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;

    let mut config = parser.load(config_file.as_deref())?;
    cli.apply_to(&mut config)?;
    Ok(config)
}

/// Loads and validates configuration.
fn load_config(cli: &Cli) -> Result<ManagerConfig> {
    let config = load_unvalidated(cli)?;
    ConfigValidator::new().validate(&config)?;

    if config.dry_run {
        info!("Dry run: no backend writes or installs will be performed");
    }
    Ok(config)
}

/// Writes command output to stdout.
fn emit(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", text.trim_end());
}
