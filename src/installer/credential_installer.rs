//! Installing, removing and detecting credential files on a remote machine

use super::copy_decision::{LocalIdentity, is_copy_needed};
use crate::core::config::StagerConfig;
use crate::core::error::StageError;
use crate::core::traits::{PathProbe, RemoteMachine, TransferMode, quote_remote_path};
use crate::credentials::CredentialLocator;

/// What `install` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The local credential files were pushed
    Pushed {
        source: String,
        destination: String,
        mode: TransferMode,
    },
    /// Source and destination are the same directory on the same machine
    SkippedSameLocation,
}

/// Stages the local AWS credential files onto remote machines
///
/// Holds the resolved configuration and the local identity snapshot; every
/// operation takes the target machine explicitly, so one installer can serve
/// any number of machines.
#[derive(Debug, Clone)]
pub struct CredentialInstaller {
    config: StagerConfig,
    identity: LocalIdentity,
    locator: CredentialLocator,
}

impl CredentialInstaller {
    pub fn new(config: StagerConfig, identity: LocalIdentity) -> Self {
        let locator = CredentialLocator::new(&config);
        Self {
            config,
            identity,
            locator,
        }
    }

    pub fn config(&self) -> &StagerConfig {
        &self.config
    }

    pub fn locator(&self) -> &CredentialLocator {
        &self.locator
    }

    pub fn check_prerequisites(&self) -> Result<(), StageError> {
        self.locator.check_prerequisites()
    }

    /// Copies the credential files to `vm`
    ///
    /// # Errors
    ///
    /// - `StageError::AlreadyInstalled` if the destination exists and
    ///   overwrite is disabled; nothing is transferred in that case.
    /// - `StageError::RemoteCommand` if the existence probe or the parent
    ///   directory creation fails.
    /// - Whatever the machine's `push` reports.
    pub async fn install(&self, vm: &dyn RemoteMachine) -> Result<InstallOutcome, StageError> {
        let local_path = self.locator.resolve_local_path()?;
        let local_path = local_path.to_string_lossy().into_owned();
        let remote_path = self.config.remote_path.as_str();

        match vm.probe_path(remote_path).await {
            PathProbe::Absent => {}
            PathProbe::Exists => {
                let err = StageError::AlreadyInstalled {
                    vm: vm.name().to_string(),
                    path: remote_path.to_string(),
                };
                if !self.config.overwrite {
                    return Err(err);
                }
                tracing::info!("{} Overwriting.", err);
            }
            PathProbe::Error(message) => {
                return Err(StageError::RemoteCommand {
                    vm: vm.name().to_string(),
                    command: format!("test -e {}", quote_remote_path(remote_path)),
                    message,
                });
            }
        }

        if let Some(parent) = remote_parent(remote_path) {
            let command = format!("mkdir -p {}", quote_remote_path(parent));
            let output = vm.execute(&command).await?;
            if !output.success() {
                return Err(StageError::RemoteCommand {
                    vm: vm.name().to_string(),
                    command,
                    message: format!(
                        "exit status {}: {}",
                        output.exit_code,
                        output.stderr.trim()
                    ),
                });
            }
        }

        if !is_copy_needed(
            &self.identity,
            vm.user_name(),
            vm.connection_ip(),
            &local_path,
            remote_path,
            self.config.remote_home.as_deref(),
        ) {
            tracing::info!(
                vm = vm.name(),
                path = %local_path,
                "credentials already in place on the same machine, skipping copy"
            );
            return Ok(InstallOutcome::SkippedSameLocation);
        }

        let mode = TransferMode::from_rsync_flag(self.config.rsync);
        let source = match mode {
            TransferMode::Sync => format!("{}/", local_path.trim_end_matches('/')),
            TransferMode::Copy => local_path,
        };

        tracing::info!(
            vm = vm.name(),
            %source,
            destination = remote_path,
            %mode,
            "pushing AWS credentials"
        );
        vm.push(&source, remote_path, mode).await?;

        Ok(InstallOutcome::Pushed {
            source,
            destination: remote_path.to_string(),
            mode,
        })
    }

    /// Deletes the credential files from `vm`
    pub async fn uninstall(&self, vm: &dyn RemoteMachine) -> Result<(), StageError> {
        tracing::info!(vm = vm.name(), path = %self.config.remote_path, "removing AWS credentials");
        vm.remove(&self.config.remote_path).await
    }

    /// Whether the credential directory is present on `vm`
    ///
    /// Probe failures of any kind count as "not installed".
    pub async fn is_installed(&self, vm: &dyn RemoteMachine) -> bool {
        let command = format!("test -d {}", quote_remote_path(&self.config.remote_path));
        match vm.execute(&command).await {
            Ok(output) => output.success(),
            Err(e) => {
                tracing::debug!(vm = vm.name(), error = %e, "installed-check failed");
                false
            }
        }
    }
}

/// Directory part of a remote path, everything before the last `/`
///
/// Trailing separators on that part are dropped unless it is the root, so
/// `bench/.aws/` yields `bench/.aws` and `/aws` yields `/`.
fn remote_parent(path: &str) -> Option<&str> {
    let head = &path[..path.rfind('/')? + 1];
    match head.trim_end_matches('/') {
        "" => Some(head),
        trimmed => Some(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::CommandOutput;
    use crate::remote::SshMachine;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Execute(String),
        Push(String, String, TransferMode),
        Remove(String),
    }

    /// Records every call and answers `execute` from a script
    struct FakeMachine {
        user: String,
        ip: String,
        responses: Mutex<VecDeque<Result<CommandOutput, StageError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeMachine {
        fn new(responses: Vec<Result<CommandOutput, StageError>>) -> Self {
            Self {
                user: "perfkit".to_string(),
                ip: "10.0.0.9".to_string(),
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn at(mut self, user: &str, ip: &str) -> Self {
            self.user = user.to_string();
            self.ip = ip.to_string();
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn pushes(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Push(..)))
                .collect()
        }
    }

    fn exit(code: i32) -> Result<CommandOutput, StageError> {
        Ok(CommandOutput {
            exit_code: code,
            ..Default::default()
        })
    }

    #[async_trait]
    impl RemoteMachine for FakeMachine {
        fn name(&self) -> &str {
            "fake-vm"
        }
        fn user_name(&self) -> &str {
            &self.user
        }
        fn connection_ip(&self) -> &str {
            &self.ip
        }
        async fn execute(&self, command: &str) -> Result<CommandOutput, StageError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Execute(command.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| exit(0))
        }
        async fn push(
            &self,
            source: &str,
            destination: &str,
            mode: TransferMode,
        ) -> Result<(), StageError> {
            self.calls.lock().unwrap().push(Call::Push(
                source.to_string(),
                destination.to_string(),
                mode,
            ));
            Ok(())
        }
        async fn remove(&self, path: &str) -> Result<(), StageError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Remove(path.to_string()));
            Ok(())
        }
    }

    /// Runs commands through a local `sh` whose `HOME` is a temp dir
    #[cfg(unix)]
    struct ShellMachine {
        home: TempDir,
        cwd: TempDir,
        pushes: Mutex<Vec<String>>,
    }

    #[cfg(unix)]
    impl ShellMachine {
        fn new() -> Self {
            Self {
                home: TempDir::new().unwrap(),
                cwd: TempDir::new().unwrap(),
                pushes: Mutex::new(Vec::new()),
            }
        }
    }

    #[cfg(unix)]
    #[async_trait]
    impl RemoteMachine for ShellMachine {
        fn name(&self) -> &str {
            "shell-vm"
        }
        fn user_name(&self) -> &str {
            "perfkit"
        }
        fn connection_ip(&self) -> &str {
            "10.0.0.9"
        }
        async fn execute(&self, command: &str) -> Result<CommandOutput, StageError> {
            let mut cmd = tokio::process::Command::new("sh");
            cmd.arg("-c")
                .arg(command)
                .env("HOME", self.home.path())
                .current_dir(self.cwd.path());
            let output = cmd.output().await.unwrap();

            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
            })
        }
        async fn push(
            &self,
            _source: &str,
            destination: &str,
            _mode: TransferMode,
        ) -> Result<(), StageError> {
            self.pushes.lock().unwrap().push(destination.to_string());
            Ok(())
        }
        async fn remove(&self, path: &str) -> Result<(), StageError> {
            let output = self.execute(&SshMachine::remove_command(path)).await?;
            assert!(output.success(), "rm failed: {}", output.stderr);
            Ok(())
        }
    }

    fn installer(dir: &TempDir, remote_path: &str, overwrite: bool, rsync: bool) -> CredentialInstaller {
        let config = StagerConfig {
            local_path: dir.path().to_string_lossy().into_owned(),
            remote_path: remote_path.to_string(),
            overwrite,
            rsync,
            ..Default::default()
        };
        CredentialInstaller::new(config, LocalIdentity::new("perfkit", ["10.0.0.1"]))
    }

    fn local(dir: &TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_install_fresh_machine() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(1)]);

        let outcome = installer(&dir, ".aws", false, false)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InstallOutcome::Pushed {
                source: local(&dir),
                destination: ".aws".to_string(),
                mode: TransferMode::Copy,
            }
        );
        assert_eq!(
            vm.calls(),
            vec![
                Call::Execute("test -e .aws".to_string()),
                Call::Push(local(&dir), ".aws".to_string(), TransferMode::Copy),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_existing_without_overwrite_fails_before_transfer() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(0)]);

        let result = installer(&dir, ".aws", false, false).install(&vm).await;

        match result {
            Err(StageError::AlreadyInstalled { vm: name, path }) => {
                assert_eq!(name, "fake-vm");
                assert_eq!(path, ".aws");
            }
            other => panic!("expected AlreadyInstalled, got {:?}", other),
        }
        assert!(vm.pushes().is_empty());
        assert_eq!(vm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_install_existing_with_overwrite_proceeds() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(0), exit(0)]);

        installer(&dir, "bench/.aws", true, false)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(
            vm.calls(),
            vec![
                Call::Execute("test -e bench/.aws".to_string()),
                Call::Execute("mkdir -p bench".to_string()),
                Call::Push(local(&dir), "bench/.aws".to_string(), TransferMode::Copy),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_home_relative_path_is_left_to_remote_shell() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(1)]);

        installer(&dir, "~/.aws", false, false)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(
            vm.calls(),
            vec![
                Call::Execute("test -e \"$HOME\"/.aws".to_string()),
                Call::Execute("mkdir -p \"$HOME\"".to_string()),
                Call::Push(local(&dir), "~/.aws".to_string(), TransferMode::Copy),
            ]
        );
    }

    #[tokio::test]
    async fn test_install_existing_home_relative_path_without_overwrite_fails() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(0)]);

        let result = installer(&dir, "$HOME/.aws", false, false).install(&vm).await;

        assert!(matches!(result, Err(StageError::AlreadyInstalled { .. })));
        assert_eq!(
            vm.calls(),
            vec![Call::Execute("test -e \"$HOME\"/.aws".to_string())]
        );
    }

    #[tokio::test]
    async fn test_install_trailing_separator_creates_the_directory_itself() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(1)]);

        installer(&dir, "bench/.aws/", false, false)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(vm.calls()[1], Call::Execute("mkdir -p bench/.aws".to_string()));
    }

    #[test]
    fn test_remote_parent() {
        assert_eq!(remote_parent(".aws"), None);
        assert_eq!(remote_parent("bench/.aws"), Some("bench"));
        assert_eq!(remote_parent("bench/.aws/"), Some("bench/.aws"));
        assert_eq!(remote_parent("bench//.aws"), Some("bench"));
        assert_eq!(remote_parent("/aws"), Some("/"));
        assert_eq!(remote_parent("~/.aws"), Some("~"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_home_relative_path_against_a_real_shell() {
        let dir = TempDir::new().unwrap();
        let vm = ShellMachine::new();
        let remote_aws = vm.home.path().join(".aws");
        std::fs::create_dir(&remote_aws).unwrap();
        let installer = installer(&dir, "~/.aws", false, false);

        assert!(installer.is_installed(&vm).await);
        assert!(matches!(
            installer.install(&vm).await,
            Err(StageError::AlreadyInstalled { .. })
        ));
        assert!(vm.pushes.lock().unwrap().is_empty());

        installer.uninstall(&vm).await.unwrap();
        assert!(!remote_aws.exists());
        assert!(!installer.is_installed(&vm).await);

        installer.install(&vm).await.unwrap();
        assert_eq!(*vm.pushes.lock().unwrap(), vec!["~/.aws".to_string()]);
        assert!(!vm.cwd.path().join("~").exists());
    }

    #[tokio::test]
    async fn test_is_installed_home_relative_path() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(0)]);

        assert!(installer(&dir, "~/.aws", false, false).is_installed(&vm).await);
        assert_eq!(
            vm.calls(),
            vec![Call::Execute("test -d \"$HOME\"/.aws".to_string())]
        );
    }

    #[tokio::test]
    async fn test_install_probe_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(255)]);

        let result = installer(&dir, ".aws", true, false).install(&vm).await;

        assert!(matches!(result, Err(StageError::RemoteCommand { .. })));
        assert!(vm.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_install_mkdir_failure() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![
            exit(1),
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: "mkdir: Permission denied".to_string(),
                exit_code: 1,
            }),
        ]);

        let result = installer(&dir, "/etc/aws/.aws", false, false)
            .install(&vm)
            .await;

        match result {
            Err(StageError::RemoteCommand { command, message, .. }) => {
                assert_eq!(command, "mkdir -p /etc/aws");
                assert!(message.contains("Permission denied"));
            }
            other => panic!("expected RemoteCommand, got {:?}", other),
        }
        assert!(vm.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_install_rsync_uses_trailing_separator() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(1)]);

        installer(&dir, ".aws", false, true)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(
            vm.pushes(),
            vec![Call::Push(
                format!("{}/", local(&dir)),
                ".aws".to_string(),
                TransferMode::Sync
            )]
        );
    }

    #[tokio::test]
    async fn test_install_same_location_skips_push() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(1)]).at("perfkit", "10.0.0.1");

        let outcome = installer(&dir, &local(&dir), false, false)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(outcome, InstallOutcome::SkippedSameLocation);
        assert!(vm.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_install_same_machine_other_user_pushes() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![exit(1)]).at("ubuntu", "10.0.0.1");

        installer(&dir, &local(&dir), false, false)
            .install(&vm)
            .await
            .unwrap();

        assert_eq!(vm.pushes().len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_removes_once() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![]);

        installer(&dir, "bench/.aws", false, false)
            .uninstall(&vm)
            .await
            .unwrap();

        assert_eq!(vm.calls(), vec![Call::Remove("bench/.aws".to_string())]);
    }

    #[tokio::test]
    async fn test_is_installed() {
        let dir = TempDir::new().unwrap();
        let installer = installer(&dir, ".aws", false, false);

        let vm = FakeMachine::new(vec![exit(0)]);
        assert!(installer.is_installed(&vm).await);
        assert_eq!(vm.calls(), vec![Call::Execute("test -d .aws".to_string())]);

        let vm = FakeMachine::new(vec![exit(1)]);
        assert!(!installer.is_installed(&vm).await);
    }

    #[tokio::test]
    async fn test_is_installed_suppresses_transport_errors() {
        let dir = TempDir::new().unwrap();
        let vm = FakeMachine::new(vec![Err(StageError::RemoteCommand {
            vm: "fake-vm".to_string(),
            command: "test -d .aws".to_string(),
            message: "Connection timed out".to_string(),
        })]);

        assert!(!installer(&dir, ".aws", false, false).is_installed(&vm).await);
    }

    #[test]
    fn test_check_prerequisites_delegates_to_locator() {
        let dir = TempDir::new().unwrap();
        assert!(installer(&dir, ".aws", false, false).check_prerequisites().is_ok());

        let missing = CredentialInstaller::new(
            StagerConfig {
                local_path: "/nonexistent/aws".to_string(),
                ..Default::default()
            },
            LocalIdentity::default(),
        );
        assert!(matches!(
            missing.check_prerequisites(),
            Err(StageError::ResourceNotFound { .. })
        ));
    }
}
