//! Logging setup shared by the rustydump crates.

pub mod config;
pub mod fs;
pub mod init;
pub mod retention;
pub mod targets;

pub use config::LoggingConfig;
pub use init::{apply, init, init_console, LoggingGuards};
pub use retention::{run_retention, RetentionReport};
