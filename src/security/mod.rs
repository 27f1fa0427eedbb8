pub mod command_executor;
pub mod secret_masker;

pub use command_executor::{CommandError, SafeCommandExecutor};
pub use secret_masker::SecretMasker;
