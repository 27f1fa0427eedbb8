//! Configuration structures and types for credential-stager
//!
//! `ConfigLayer` is what a single source (YAML file, environment, CLI)
//! contributes; every field is optional. `StagerConfig` is the resolved,
//! read-only configuration threaded through the locator and the installer.

use serde::{Deserialize, Serialize};

/// Default local directory holding the AWS credential files
pub const DEFAULT_LOCAL_PATH: &str = "~/.aws";

/// Default destination on the remote machine, relative to the remote home
pub const DEFAULT_REMOTE_PATH: &str = ".aws";

/// Default credentials file name inside the local directory
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials";

/// Resolved configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagerConfig {
    /// Path where the AWS credential files can be found on the local machine
    pub local_path: String,

    /// Path where the AWS credential files will be written on remote machines
    pub remote_path: String,

    /// Replace an existing remote destination during installation
    pub overwrite: bool,

    /// Region for the S3 bucket (informational)
    pub region: Option<String>,

    /// Push with rsync directory-sync semantics instead of a plain copy
    pub rsync: bool,

    /// Name of the credentials file inside `local_path`
    pub credentials_file: String,

    /// Home directory of the remote user, used when comparing the default
    /// remote path against the local one
    pub remote_home: Option<String>,
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            local_path: DEFAULT_LOCAL_PATH.to_string(),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
            overwrite: false,
            region: None,
            rsync: false,
            credentials_file: DEFAULT_CREDENTIALS_FILE.to_string(),
            remote_home: None,
        }
    }
}

/// Partial configuration contributed by one source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none", rename = "localPath")]
    pub local_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "remotePath")]
    pub remote_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsync: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "credentialsFile")]
    pub credentials_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "remoteHome")]
    pub remote_home: Option<String>,
}

impl ConfigLayer {
    /// True when the layer sets nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay every field set in `self` onto `target`
    pub fn apply_to(self, target: &mut StagerConfig) {
        if let Some(local_path) = self.local_path {
            target.local_path = local_path;
        }
        if let Some(remote_path) = self.remote_path {
            target.remote_path = remote_path;
        }
        if let Some(overwrite) = self.overwrite {
            target.overwrite = overwrite;
        }
        if self.region.is_some() {
            target.region = self.region;
        }
        if let Some(rsync) = self.rsync {
            target.rsync = rsync;
        }
        if let Some(credentials_file) = self.credentials_file {
            target.credentials_file = credentials_file;
        }
        if self.remote_home.is_some() {
            target.remote_home = self.remote_home;
        }
    }
}
