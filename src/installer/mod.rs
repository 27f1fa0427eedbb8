pub mod copy_decision;
pub mod credential_installer;

pub use copy_decision::{LocalIdentity, comparison_remote_path, is_copy_needed};
pub use credential_installer::{CredentialInstaller, InstallOutcome};
