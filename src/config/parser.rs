//! Configuration parser for loading the manager configuration.
//!
//! Configuration comes from an optional YAML file, then environment
//! variables, then command-line flags (applied by the binary). The parsed
//! value is built once and handed to each component.

use crate::error::{ConfigError, ReleaseManagerError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ManagerConfig;

/// Environment variable overriding `backend.storage_path`.
pub const ENV_STORAGE_PATH: &str = "RELEASEMANAGER_STORAGE_PATH";

/// Environment variable overriding `backend.bucket`.
pub const ENV_BUCKET: &str = "RELEASEMANAGER_BUCKET";

/// Environment variable overriding `backend.region`.
pub const ENV_REGION: &str = "RELEASEMANAGER_REGION";

/// Environment variable overriding `export.release_name`.
pub const ENV_RELEASE_NAME: &str = "RELEASEMANAGER_RELEASE_NAME";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ManagerConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ReleaseManagerError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ReleaseManagerError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string. Blank input yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ManagerConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(ManagerConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            ReleaseManagerError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads the file at `path` if given, otherwise starts from defaults,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a given file cannot be read or parsed.
    pub fn load(&self, path: Option<&Path>) -> Result<ManagerConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => ManagerConfig::default(),
        };

        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut ManagerConfig) {
        if let Ok(path) = std::env::var(ENV_STORAGE_PATH) {
            debug!("Overriding backend.storage_path from environment");
            config.backend.storage_path = path;
        }

        if let Ok(bucket) = std::env::var(ENV_BUCKET) {
            debug!("Overriding backend.bucket from environment");
            config.backend.bucket = Some(bucket);
        }

        if let Ok(region) = std::env::var(ENV_REGION) {
            debug!("Overriding backend.region from environment");
            config.backend.region = Some(region);
        }

        if let Ok(name) = std::env::var(ENV_RELEASE_NAME) {
            debug!("Overriding export.release_name from environment");
            config.export.release_name = Some(name);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ReleaseManagerError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Parses a `KEY=VALUE` override as given on the command line.
///
/// # Errors
///
/// Returns an error if there is no `=` or the key is empty.
pub fn parse_override(raw: &str) -> std::result::Result<(String, String), ConfigError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidOverride {
            raw: raw.to_string(),
        }),
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["releasemanager.yaml", "releasemanager.yml"];

/// Finds the configuration file in the start directory or its parents,
/// falling back to the user configuration directory.
///
/// Returns `None` when no file exists anywhere; running without a file is valid.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    let user_config = dirs::config_dir()?.join("releasemanager").join("config.yaml");
    if user_config.exists() {
        info!("Found configuration file: {}", user_config.display());
        return Some(user_config);
    }

    debug!("No configuration file found, using defaults");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    #[test]
    fn test_parse_empty_config() {
        let parser = ConfigParser::new();
        let config = parser.parse_yaml("", None).expect("empty config should parse");
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
backend:
  kind: s3
  storage_path: cluster-a
  bucket: release-snapshots
  region: eu-west-1
export:
  release_name: releasemanager
  namespaces: [default, apps]
import:
  namespaces: [default]
  exclude_namespaces: [kube-system]
  target_namespace: restored
  values:
    image.tag: v2
  new_storage_path: cluster-b
install:
  timeout_secs: 120
  concurrency: 3
dry_run: true
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).expect("config should parse");

        assert_eq!(config.backend.kind, BackendKind::S3);
        assert_eq!(config.backend.storage_path, "cluster-a");
        assert_eq!(config.export.namespaces.len(), 2);
        assert_eq!(config.import.values.get("image.tag").map(String::as_str), Some("v2"));
        assert_eq!(config.import.new_storage_path.as_deref(), Some("cluster-b"));
        assert_eq!(config.install.concurrency, 3);
        assert_eq!(config.install.helm_binary, "helm");
        assert!(config.dry_run);
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let parser = ConfigParser::new();
        let result = parser.parse_yaml("backend: [unclosed", None);
        assert!(matches!(
            result,
            Err(ReleaseManagerError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_load_file_missing() {
        let parser = ConfigParser::new();
        let result = parser.load_file("/nonexistent/releasemanager.yaml");
        assert!(matches!(
            result,
            Err(ReleaseManagerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("image.tag=v1=beta").expect("valid override"),
            (String::from("image.tag"), String::from("v1=beta"))
        );
        assert_eq!(
            parse_override("flag=").expect("empty value is allowed"),
            (String::from("flag"), String::new())
        );
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=x").is_err());
    }
}
