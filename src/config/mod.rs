//! Configuration module for the release manager.
//!
//! This module handles all configuration-related functionality:
//! - Deserializing `releasemanager.yaml`
//! - Environment and `.env` overrides
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use self::spec::{
    BackendConfig, BackendKind, ExportConfig, ImportConfig, InstallConfig, ManagerConfig,
    TransferConfig, DEFAULT_DEPLOY_CONCURRENCY, DEFAULT_INSTALL_TIMEOUT_SECS,
    DEFAULT_RETRIEVAL_CONCURRENCY, VALUE_STORAGE_PATH,
};
pub use self::parser::{find_config_file, parse_override, ConfigParser, DEFAULT_CONFIG_FILES};
pub use self::validator::{ConfigValidator, ValidationError, ValidationResult};
