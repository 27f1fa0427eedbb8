//! Locating and reading the local AWS credential files

use super::AwsCredentials;
use super::ini::IniDocument;
use crate::core::config::StagerConfig;
use crate::core::error::StageError;
use secrecy::SecretString;
use std::path::PathBuf;
use tokio::fs;

/// Section read from the credentials file
pub const CREDENTIALS_SECTION: &str = "default";

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";

/// Finds the credential files on the local machine and reads them
///
/// # Examples
///
/// ```no_run
/// use credential_stager::{CredentialLocator, StagerConfig};
///
/// # async fn demo() -> Result<(), credential_stager::StageError> {
/// let locator = CredentialLocator::new(&StagerConfig::default());
/// locator.check_prerequisites()?;
/// let credentials = locator.credentials().await?;
/// println!("{}", credentials.access_key_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialLocator {
    local_path: String,
    credentials_file: String,
}

impl CredentialLocator {
    pub fn new(config: &StagerConfig) -> Self {
        Self {
            local_path: config.local_path.clone(),
            credentials_file: config.credentials_file.clone(),
        }
    }

    /// Expanded, absolute path of the local credential directory
    ///
    /// `~` and `$VAR` references are expanded; a relative result is taken
    /// relative to the current directory.
    pub fn resolve_local_path(&self) -> Result<PathBuf, StageError> {
        let expanded = shellexpand::full(&self.local_path).map_err(|e| {
            StageError::ConfigError(format!("Cannot expand '{}': {}", self.local_path, e))
        })?;

        let path = PathBuf::from(expanded.as_ref());
        if path.is_absolute() {
            return Ok(path);
        }

        let cwd = std::env::current_dir().map_err(|e| {
            StageError::ConfigError(format!("Cannot determine current directory: {}", e))
        })?;
        Ok(cwd.join(path))
    }

    /// Verifies that the local credential directory exists
    ///
    /// # Errors
    ///
    /// `StageError::ResourceNotFound` when the resolved path is missing.
    pub fn check_prerequisites(&self) -> Result<(), StageError> {
        let local_path = self.resolve_local_path()?;
        if !local_path.exists() {
            return Err(StageError::ResourceNotFound { path: local_path });
        }
        Ok(())
    }

    /// Reads the configured credentials file
    pub async fn credentials(&self) -> Result<AwsCredentials, StageError> {
        self.credentials_from(&self.credentials_file).await
    }

    /// Reads `[default]` from `<local path>/<file_name>`
    ///
    /// The file looks like:
    ///
    /// ```text
    /// [default]
    /// aws_access_key_id = {access_key}
    /// aws_secret_access_key = {secret_access_key}
    /// ```
    pub async fn credentials_from(&self, file_name: &str) -> Result<AwsCredentials, StageError> {
        let path = self.resolve_local_path()?.join(file_name);

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StageError::CredentialsRead {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let document = IniDocument::parse(&content).map_err(|e| StageError::CredentialsParse {
            path: path.clone(),
            line: e.line,
            message: e.message,
        })?;

        // A [DEFAULT]-only file still counts as missing the section
        if !document.has_section(CREDENTIALS_SECTION) {
            return Err(StageError::CredentialLookup {
                path: path.clone(),
                section: CREDENTIALS_SECTION.to_string(),
                key: ACCESS_KEY_ID.to_string(),
            });
        }

        let lookup = |key: &str| {
            document
                .get(CREDENTIALS_SECTION, key)
                .map(str::to_string)
                .ok_or_else(|| StageError::CredentialLookup {
                    path: path.clone(),
                    section: CREDENTIALS_SECTION.to_string(),
                    key: key.to_string(),
                })
        };

        let access_key_id = lookup(ACCESS_KEY_ID)?;
        let secret_access_key = SecretString::from(lookup(SECRET_ACCESS_KEY)?);

        tracing::debug!(path = %path.display(), "read AWS credentials");

        Ok(AwsCredentials {
            access_key_id,
            secret_access_key,
        })
    }
}
