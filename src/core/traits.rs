//! Core traits and types for credential staging
//!
//! This module defines the remote machine capability consumed by the
//! installer, together with the small value types it exchanges.

use crate::core::error::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Remote command results
// ============================================================================

/// Captured result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of asking the remote machine whether a path exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathProbe {
    Exists,
    Absent,
    /// The probe itself could not be answered (connection failure, etc.)
    Error(String),
}

// ============================================================================
// Transfers
// ============================================================================

/// How a local path is pushed to the remote machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Whole-path copy (scp -r)
    Copy,
    /// Directory sync; the source carries a trailing separator (rsync -a)
    Sync,
}

impl TransferMode {
    pub fn from_rsync_flag(rsync: bool) -> Self {
        if rsync { Self::Sync } else { Self::Copy }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

// ============================================================================
// Remote paths
// ============================================================================

/// Quote `path` for the remote shell
///
/// A leading `~`, `$HOME` or `${HOME}` is rewritten to `"$HOME"` and left
/// outside the quotes so the remote shell still expands it; the remainder
/// is quoted as a single word.
pub fn quote_remote_path(path: &str) -> String {
    let home_relative = ["~", "$HOME", "${HOME}"].iter().find_map(|prefix| {
        path.strip_prefix(prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    });

    match home_relative {
        Some("") => "\"$HOME\"".to_string(),
        Some(rest) => format!("\"$HOME\"/{}", shell_words::quote(&rest[1..])),
        None => shell_words::quote(path).into_owned(),
    }
}

// ============================================================================
// Remote Machine Trait
// ============================================================================

/// A virtual machine that can run commands and receive files
///
/// `execute` returns `Ok` for any command that ran, whatever its exit code;
/// `Err` is reserved for transport failures.
#[async_trait]
pub trait RemoteMachine: Send + Sync {
    /// Display name used in logs and errors
    fn name(&self) -> &str;

    /// Login user on the remote machine
    fn user_name(&self) -> &str;

    /// Address used to connect to the machine
    fn connection_ip(&self) -> &str;

    /// Run a shell command on the remote machine
    async fn execute(&self, command: &str) -> Result<CommandOutput, StageError>;

    /// Push a local file or directory to `destination`
    async fn push(
        &self,
        source: &str,
        destination: &str,
        mode: TransferMode,
    ) -> Result<(), StageError>;

    /// Remove a remote file or directory; an absent path is not an error
    async fn remove(&self, path: &str) -> Result<(), StageError>;

    /// Check whether `path` exists on the remote machine
    ///
    /// The default implementation runs `test -e`: exit 0 means present,
    /// exit 1 absent, anything else (including transport errors) is reported
    /// as `PathProbe::Error`.
    async fn probe_path(&self, path: &str) -> PathProbe {
        let command = format!("test -e {}", quote_remote_path(path));
        match self.execute(&command).await {
            Ok(output) if output.exit_code == 0 => PathProbe::Exists,
            Ok(output) if output.exit_code == 1 => PathProbe::Absent,
            Ok(output) => PathProbe::Error(format!(
                "`{}` exited with status {}: {}",
                command,
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) => PathProbe::Error(e.to_string()),
        }
    }
}
