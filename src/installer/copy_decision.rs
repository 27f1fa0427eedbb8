//! Deciding whether a credential transfer can be skipped
//!
//! When the "remote" machine is this machine, logged in as the same user, and
//! the destination resolves to the local credential directory itself, pushing
//! would copy the directory onto itself.

use crate::security::SafeCommandExecutor;
use std::collections::{HashMap, HashSet};

/// Who and where the local operator is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIdentity {
    pub user: String,
    pub addresses: HashSet<String>,
}

impl LocalIdentity {
    pub fn new<I, S>(user: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user: user.into(),
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot the local user and IP addresses
    ///
    /// Addresses come from `hostname --all-ip-addresses`; if that fails only
    /// `localhost` will be treated as local.
    pub async fn discover(executor: &SafeCommandExecutor) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let user = Self::user_from_env(&env);

        let addresses = match executor.execute("hostname", &["--all-ip-addresses"]).await {
            Ok(output) if output.status.success() => {
                Self::parse_addresses(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!(
                    status = ?output.status.code(),
                    "hostname --all-ip-addresses failed; only localhost counts as local"
                );
                HashSet::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot list local addresses; only localhost counts as local");
                HashSet::new()
            }
        };

        tracing::debug!(user = %user, addresses = ?addresses, "discovered local identity");
        Self { user, addresses }
    }

    fn user_from_env(env: &HashMap<String, String>) -> String {
        env.get("USER")
            .filter(|u| !u.is_empty())
            .or_else(|| env.get("USERNAME"))
            .cloned()
            .unwrap_or_default()
    }

    fn parse_addresses(stdout: &str) -> HashSet<String> {
        stdout.split_whitespace().map(str::to_string).collect()
    }

    pub fn is_local_address(&self, ip: &str) -> bool {
        ip == "localhost" || self.addresses.contains(ip)
    }
}

/// Path the remote destination is compared against
///
/// The default destination `.aws` is relative to the remote home, which is
/// assumed to be `/home/<user>` unless `remote_home` says otherwise. Any
/// other destination is compared as written.
pub fn comparison_remote_path(
    remote_path: &str,
    remote_user: &str,
    remote_home: Option<&str>,
) -> String {
    if remote_path != ".aws" {
        return remote_path.to_string();
    }

    match remote_home {
        Some(home) => format!("{}/{}", home.trim_end_matches('/'), remote_path),
        None => format!("/home/{}/{}", remote_user, remote_path),
    }
}

/// Returns false only when source and destination are the same place
pub fn is_copy_needed(
    identity: &LocalIdentity,
    remote_user: &str,
    remote_ip: &str,
    local_path: &str,
    remote_path: &str,
    remote_home: Option<&str>,
) -> bool {
    if !identity.is_local_address(remote_ip) {
        return true;
    }

    let full_remote_path = comparison_remote_path(remote_path, remote_user, remote_home);
    !(identity.user == remote_user && local_path == full_remote_path)
}
