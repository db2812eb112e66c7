//! Logging utilities.
//!
//! Everything in the engine logs through the `log` facade. This module only
//! installs the `env_logger` backend, once, for binaries and tools.

mod init;

pub use init::{init_logging, LoggingConfig};
