//! Configuration validation.
//!
//! Range checks are declared on the config types with `validator`; the
//! cross-field rules that depend on the chosen backend or workflow live here.

use crate::error::{ConfigError, ReleaseManagerError, Result};
use tracing::{debug, warn};
use validator::Validate;

use super::spec::{BackendKind, ManagerConfig};

/// Validator for manager configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, serde::Serialize)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationResult {
    /// Returns true when no errors were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a manager configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &ManagerConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if let Err(errors) = config.validate() {
            result.error("config", errors.to_string());
        }

        Self::validate_backend(config, &mut result);
        Self::validate_import(config, &mut result);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if result.is_valid() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ReleaseManagerError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    /// Validates backend configuration.
    fn validate_backend(config: &ManagerConfig, result: &mut ValidationResult) {
        let backend = &config.backend;

        if backend.storage_path.trim().is_empty() {
            result.error("backend.storage_path", "Storage path cannot be empty");
        }

        if backend.kind == BackendKind::S3
            && backend.bucket.as_ref().is_none_or(|b| b.trim().is_empty())
        {
            result.error(
                "backend.bucket",
                "S3 bucket name is required when using the s3 backend",
            );
        }
    }

    /// Validates import configuration.
    fn validate_import(config: &ManagerConfig, result: &mut ValidationResult) {
        let import = &config.import;

        for key in import.values.keys() {
            if key.split('.').any(str::is_empty) {
                result.error(
                    "import.values",
                    format!("Value override key '{key}' has an empty segment"),
                );
            }
        }

        for namespace in &import.namespaces {
            if import.exclude_namespaces.contains(namespace) {
                result.warnings.push(format!(
                    "Namespace '{namespace}' is both included and excluded; it will be included"
                ));
            }
        }

        if !import.namespaces.is_empty() && !import.exclude_namespaces.is_empty() {
            result.warnings.push(String::from(
                "Both namespace allow-list and exclude-list set; the exclude-list is ignored",
            ));
        }

        if let Some(path) = &import.new_storage_path
            && path == &config.backend.storage_path
        {
            result.warnings.push(format!(
                "New storage path '{path}' equals the current storage path"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::new().validate(&ManagerConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_s3_requires_bucket() {
        let mut config = ManagerConfig::default();
        config.backend.kind = BackendKind::S3;

        let result = ConfigValidator::new().validate(&config);
        assert!(matches!(
            result,
            Err(ReleaseManagerError::Config(ConfigError::ValidationError { field: Some(ref f), .. })) if f == "backend.bucket"
        ));

        config.backend.bucket = Some(String::from("snapshots"));
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = ManagerConfig::default();
        config.install.concurrency = 0;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_overlapping_namespaces_warn_only() {
        let mut config = ManagerConfig::default();
        config.import.namespaces = vec![String::from("default")];
        config.import.exclude_namespaces = vec![String::from("default")];

        let result = ConfigValidator::new()
            .validate(&config)
            .expect("overlap is not an error");
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_empty_override_segment_rejected() {
        let mut config = ManagerConfig::default();
        config
            .import
            .values
            .insert(String::from("image..tag"), String::from("v1"));
        assert!(ConfigValidator::new().validate(&config).is_err());
    }
}
