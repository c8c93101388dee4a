//! Logger setup.
//!
//! The engine only emits through the `log` macros. The `kernelrun` CLI calls
//! [`init_logging`] to route them to `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
