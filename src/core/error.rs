//! Error handling for credential staging
//!
//! This module provides the error type shared by the locator, the installer
//! and the remote machine implementations, with error codes and recovery
//! guidance for the CLI.

use crate::security::CommandError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for credential staging operations
#[derive(Error, Debug)]
pub enum StageError {
    // Local resource errors
    #[error("AWS credential files were not found at {}", path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("Failed to read credentials file {}: {message}", path.display())]
    CredentialsRead { path: PathBuf, message: String },

    #[error("Malformed credentials file {} at line {line}: {message}", path.display())]
    CredentialsParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Credentials file {} has no '{key}' in section [{section}]", path.display())]
    CredentialLookup {
        path: PathBuf,
        section: String,
        key: String,
    },

    // Remote state errors
    #[error("File {path} already exists on VM {vm}.")]
    AlreadyInstalled { vm: String, path: String },

    #[error("[{vm}] Remote command `{command}` failed: {message}")]
    RemoteCommand {
        vm: String,
        command: String,
        message: String,
    },

    #[error("[{vm}] Transfer of {source_path} to {destination} failed: {message}")]
    Transfer {
        vm: String,
        source_path: String,
        destination: String,
        message: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Local command execution errors
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl StageError {
    /// Check if this error is recoverable by re-running with different input
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::CredentialsParse { .. } | Self::CredentialLookup { .. }
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::ResourceNotFound { .. } => vec![
                "Run `aws configure` to create ~/.aws/credentials",
                "Point --local-path at the directory holding the credential files",
            ],
            Self::CredentialsRead { .. } => {
                vec!["Check the file permissions of the credentials file"]
            }
            Self::CredentialsParse { .. } => vec![
                "Fix the reported line in the credentials file",
                "Each entry must look like `key = value` inside a [section]",
            ],
            Self::CredentialLookup { .. } => vec![
                "Add a [default] section with aws_access_key_id and aws_secret_access_key",
            ],
            Self::AlreadyInstalled { .. } => vec![
                "Pass --overwrite to replace the existing files",
                "Run `credential-stager uninstall` first",
            ],
            Self::RemoteCommand { .. } => vec![
                "Check that the VM is reachable over SSH",
                "Check the remote user's permissions on the target path",
            ],
            Self::Transfer { .. } => vec![
                "Check that scp (or rsync with --rsync) is installed on both ends",
                "Check free space on the VM",
            ],
            Self::ConfigError(_) => vec!["Check .credential-stager.yaml for syntax errors"],
            Self::Command(_) => vec!["Check that the required local tools are on PATH"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            Self::CredentialsRead { .. } => "CREDENTIALS_READ",
            Self::CredentialsParse { .. } => "CREDENTIALS_PARSE",
            Self::CredentialLookup { .. } => "CREDENTIAL_LOOKUP",
            Self::AlreadyInstalled { .. } => "ALREADY_INSTALLED",
            Self::RemoteCommand { .. } => "REMOTE_COMMAND",
            Self::Transfer { .. } => "TRANSFER_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Command(_) => "COMMAND_ERROR",
        }
    }
}
