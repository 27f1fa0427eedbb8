pub mod ssh;

pub use ssh::{SshHost, SshMachine};
