//! SSH-backed remote machine
//!
//! Commands run through `ssh`, transfers through `scp -r` or `rsync -a`.
//! All three run non-interactively (`BatchMode=yes`), so a missing key
//! fails fast instead of prompting.

use crate::core::error::StageError;
use crate::core::traits::{CommandOutput, RemoteMachine, TransferMode, quote_remote_path};
use crate::security::SafeCommandExecutor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Connection details for a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshHost {
    /// Friendly name for logs and errors
    pub name: String,

    /// Hostname or IP address
    pub address: String,

    /// SSH username
    pub user: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to SSH private key (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl SshHost {
    pub fn new(address: &str, user: &str) -> Self {
        Self {
            name: address.to_string(),
            address: address.to_string(),
            user: user.to_string(),
            port: 22,
            identity_file: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_identity_file(mut self, key: &str) -> Self {
        self.identity_file = Some(key.to_string());
        self
    }

    /// `user@host`
    pub fn connection_string(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    /// `user@host:path`, bracketing IPv6 literals
    pub fn remote_target(&self, path: &str) -> String {
        if self.address.contains(':') {
            format!("{}@[{}]:{}", self.user, self.address, path)
        } else {
            format!("{}@{}:{}", self.user, self.address, path)
        }
    }

    fn identity_path(&self) -> Option<String> {
        self.identity_file
            .as_deref()
            .map(|key| shellexpand::tilde(key).into_owned())
    }

    /// Arguments for `ssh` running `remote_command`
    pub fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = self.identity_path() {
            args.push("-i".to_string());
            args.push(key);
        }
        args.push(self.connection_string());
        args.push(remote_command.to_string());
        args
    }

    /// Arguments for `scp -r source user@host:destination`
    pub fn scp_args(&self, source: &str, destination: &str) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-P".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = self.identity_path() {
            args.push("-i".to_string());
            args.push(key);
        }
        args.push(source.to_string());
        args.push(self.remote_target(destination));
        args
    }

    /// Arguments for `rsync -a -e "ssh ..." source user@host:destination`
    pub fn rsync_args(&self, source: &str, destination: &str) -> Vec<String> {
        let mut transport = vec![
            "ssh".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = self.identity_path() {
            transport.push("-i".to_string());
            transport.push(key);
        }

        vec![
            "-a".to_string(),
            "-e".to_string(),
            shell_words::join(&transport),
            source.to_string(),
            self.remote_target(destination),
        ]
    }
}

/// A VM reached over SSH
#[derive(Debug, Clone)]
pub struct SshMachine {
    host: SshHost,
    executor: SafeCommandExecutor,
}

impl SshMachine {
    pub fn new(host: SshHost, executor: SafeCommandExecutor) -> Self {
        Self { host, executor }
    }

    pub fn host(&self) -> &SshHost {
        &self.host
    }

    /// Remote command deleting `path`; succeeds when the path is absent
    pub fn remove_command(path: &str) -> String {
        format!("rm -rf {}", quote_remote_path(path))
    }

    async fn run_local(&self, program: &str, args: &[String]) -> Result<CommandOutput, StageError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.executor.execute(program, &args).await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl RemoteMachine for SshMachine {
    fn name(&self) -> &str {
        &self.host.name
    }

    fn user_name(&self) -> &str {
        &self.host.user
    }

    fn connection_ip(&self) -> &str {
        &self.host.address
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, StageError> {
        tracing::debug!(vm = %self.host.name, command, "running remote command");
        self.run_local("ssh", &self.host.ssh_args(command)).await
    }

    async fn push(
        &self,
        source: &str,
        destination: &str,
        mode: TransferMode,
    ) -> Result<(), StageError> {
        let (program, args) = match mode {
            TransferMode::Copy => ("scp", self.host.scp_args(source, destination)),
            TransferMode::Sync => ("rsync", self.host.rsync_args(source, destination)),
        };

        let output = self.run_local(program, &args).await?;
        if !output.success() {
            return Err(StageError::Transfer {
                vm: self.host.name.clone(),
                source_path: source.to_string(),
                destination: destination.to_string(),
                message: format!(
                    "{} exited with status {}: {}",
                    program,
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StageError> {
        let command = Self::remove_command(path);
        let output = self.execute(&command).await?;
        if !output.success() {
            return Err(StageError::RemoteCommand {
                vm: self.host.name.clone(),
                command,
                message: format!(
                    "exit status {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }
        Ok(())
    }
}
