//! AWS shared credentials on the local machine

pub mod ini;
pub mod locator;

pub use ini::{IniDocument, IniError};
pub use locator::CredentialLocator;

use regex::Regex;
use secrecy::SecretString;

/// Access key pair read from the credentials file
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

/// Heuristic check for long-term (AKIA) or temporary (ASIA) access key ids
///
/// Only used to warn; a mismatch never blocks installation.
pub fn looks_like_access_key_id(access_key_id: &str) -> bool {
    let pattern = Regex::new(r"^(AKIA|ASIA)[A-Z0-9]{16}$").unwrap();
    pattern.is_match(access_key_id)
}
