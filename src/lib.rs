pub mod core;
pub mod credentials;
pub mod installer;
pub mod remote;
pub mod security;

pub use self::core::*;
pub use credentials::{AwsCredentials, CredentialLocator, looks_like_access_key_id};
pub use installer::{CredentialInstaller, InstallOutcome, LocalIdentity};
pub use remote::{SshHost, SshMachine};
pub use security::{CommandError, SafeCommandExecutor, SecretMasker};
