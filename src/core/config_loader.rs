//! Configuration file loader for credential-stager
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::StageError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".credential-stager.yaml";

/// AWS region names such as us-east-1 or us-gov-west-1
const REGION_PATTERN: &str = r"^[a-z]{2}(-gov)?-[a-z]+-\d+$";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Home directory holding the global config (skipped when `None`)
    pub home_dir: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<ConfigLayer>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field name (e.g., "remotePath")
    pub field: String,
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.credential-stager.yaml)
    /// 4. Global config (~/.credential-stager.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<StagerConfig, StageError> {
        let mut layers: Vec<ConfigLayer> = Vec::new();

        if let Some(home_dir) = &options.home_dir {
            if let Some(global) = Self::load_config_file(&home_dir.join(CONFIG_FILENAME)).await? {
                layers.push(global);
            }
        }

        let project_file = options.project_path.join(CONFIG_FILENAME);
        if let Some(project) = Self::load_config_file(&project_file).await? {
            layers.push(project);
        }

        if let Some(env_layer) = Self::load_env_config(&options.env)? {
            layers.push(env_layer);
        }

        if let Some(cli_layer) = options.cli_args {
            layers.push(cli_layer);
        }

        Ok(Self::merge_layers(layers))
    }

    /// Load one YAML layer; a missing file is not an error
    async fn load_config_file(file_path: &Path) -> Result<Option<ConfigLayer>, StageError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            StageError::ConfigError(format!(
                "Failed to read config file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let layer: ConfigLayer = serde_yaml::from_str(&content).map_err(|e| {
            StageError::ConfigError(format!(
                "Failed to parse YAML config {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %file_path.display(), "loaded config layer");
        Ok(Some(layer))
    }

    /// Load configuration from STAGER_* environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Result<Option<ConfigLayer>, StageError> {
        let layer = ConfigLayer {
            local_path: env.get("STAGER_LOCAL_PATH").cloned(),
            remote_path: env.get("STAGER_REMOTE_PATH").cloned(),
            overwrite: env
                .get("STAGER_OVERWRITE")
                .map(|v| Self::parse_bool("STAGER_OVERWRITE", v))
                .transpose()?,
            region: env.get("STAGER_REGION").cloned(),
            rsync: env
                .get("STAGER_RSYNC")
                .map(|v| Self::parse_bool("STAGER_RSYNC", v))
                .transpose()?,
            credentials_file: None,
            remote_home: env.get("STAGER_REMOTE_HOME").cloned(),
        };

        if layer.is_empty() { Ok(None) } else { Ok(Some(layer)) }
    }

    fn parse_bool(name: &str, value: &str) -> Result<bool, StageError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(StageError::ConfigError(format!(
                "{} must be a boolean, got '{}'",
                name, other
            ))),
        }
    }

    /// Merge layers over the defaults, later layers winning
    fn merge_layers(layers: Vec<ConfigLayer>) -> StagerConfig {
        let mut config = StagerConfig::default();
        for layer in layers {
            layer.apply_to(&mut config);
        }
        config
    }

    /// Validate configuration
    pub fn validate(config: &StagerConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (field, value) in [
            ("localPath", &config.local_path),
            ("remotePath", &config.remote_path),
            ("credentialsFile", &config.credentials_file),
        ] {
            if value.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("{} must not be empty", field),
                });
            }
        }

        if config.credentials_file.contains('/') || config.credentials_file.contains('\\') {
            errors.push(ConfigValidationError {
                field: "credentialsFile".to_string(),
                message: "credentialsFile must be a file name, not a path".to_string(),
            });
        }

        if config.remote_path.split('/').any(|part| part == "..") {
            warnings.push(ConfigValidationWarning {
                field: "remotePath".to_string(),
                message: format!("remotePath '{}' escapes its parent", config.remote_path),
                suggestion: Some("Use a path below the remote home directory".to_string()),
            });
        }

        if let Some(region) = &config.region {
            let region_regex = Regex::new(REGION_PATTERN).unwrap();
            if !region_regex.is_match(region) {
                warnings.push(ConfigValidationWarning {
                    field: "region".to_string(),
                    message: format!("Unknown region format: {}", region),
                    suggestion: Some("Expected something like us-east-1".to_string()),
                });
            }
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_env_config() {
        let mut env = HashMap::new();
        env.insert("STAGER_REMOTE_PATH".to_string(), "bench/.aws".to_string());
        env.insert("STAGER_OVERWRITE".to_string(), "true".to_string());
        env.insert("STAGER_RSYNC".to_string(), "0".to_string());

        let layer = ConfigLoader::load_env_config(&env).unwrap().unwrap();

        assert_eq!(layer.remote_path.as_deref(), Some("bench/.aws"));
        assert_eq!(layer.overwrite, Some(true));
        assert_eq!(layer.rsync, Some(false));
        assert!(layer.local_path.is_none());
    }

    #[test]
    fn test_load_env_config_empty() {
        let env = HashMap::new();
        assert!(ConfigLoader::load_env_config(&env).unwrap().is_none());
    }

    #[test]
    fn test_load_env_config_rejects_bad_bool() {
        let mut env = HashMap::new();
        env.insert("STAGER_OVERWRITE".to_string(), "maybe".to_string());

        let result = ConfigLoader::load_env_config(&env);
        assert!(matches!(result, Err(StageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_load_priority() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            home.path().join(CONFIG_FILENAME),
            "localPath: /global/aws\nremotePath: global\nregion: eu-west-1\n",
        )
        .unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILENAME),
            "remotePath: project\n",
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert("STAGER_OVERWRITE".to_string(), "yes".to_string());

        let options = ConfigLoadOptions {
            project_path: project.path().to_path_buf(),
            home_dir: Some(home.path().to_path_buf()),
            cli_args: Some(ConfigLayer {
                region: Some("us-west-2".to_string()),
                ..Default::default()
            }),
            env,
        };

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(config.local_path, "/global/aws");
        assert_eq!(config.remote_path, "project");
        assert!(config.overwrite);
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
    }

    #[tokio::test]
    async fn test_load_without_files_gives_defaults() {
        let project = TempDir::new().unwrap();
        let options = ConfigLoadOptions {
            project_path: project.path().to_path_buf(),
            ..Default::default()
        };

        let config = ConfigLoader::load(options).await.unwrap();
        assert_eq!(config, StagerConfig::default());
    }

    #[tokio::test]
    async fn test_load_malformed_yaml() {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join(CONFIG_FILENAME), "overwrite: [oops\n").unwrap();

        let options = ConfigLoadOptions {
            project_path: project.path().to_path_buf(),
            ..Default::default()
        };

        let result = ConfigLoader::load(options).await;
        assert!(matches!(result, Err(StageError::ConfigError(_))));
    }

    #[test]
    fn test_validate_defaults() {
        let result = ConfigLoader::validate(&StagerConfig::default());
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_empty_remote_path() {
        let config = StagerConfig {
            remote_path: "  ".to_string(),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "remotePath");
    }

    #[test]
    fn test_validate_credentials_file_with_separator() {
        let config = StagerConfig {
            credentials_file: "sub/credentials".to_string(),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "credentialsFile");
    }

    #[test]
    fn test_validate_warnings() {
        let config = StagerConfig {
            remote_path: "../shared/.aws".to_string(),
            region: Some("Virginia".to_string()),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);

        let govcloud = StagerConfig {
            region: Some("us-gov-west-1".to_string()),
            ..Default::default()
        };
        assert!(ConfigLoader::validate(&govcloud).warnings.is_empty());
    }

    #[test]
    fn test_format_validation_result() {
        let result = ConfigValidationResult {
            valid: false,
            errors: vec![ConfigValidationError {
                field: "localPath".to_string(),
                message: "localPath must not be empty".to_string(),
            }],
            warnings: vec![ConfigValidationWarning {
                field: "region".to_string(),
                message: "Unknown region format: mars".to_string(),
                suggestion: Some("Expected something like us-east-1".to_string()),
            }],
        };

        let formatted = ConfigLoader::format_validation_result(&result);

        assert!(formatted.contains("❌ Configuration has errors"));
        assert!(formatted.contains("[localPath]"));
        assert!(formatted.contains("🟡 Warnings:"));
        assert!(formatted.contains("Suggestion: Expected"));
    }
}
