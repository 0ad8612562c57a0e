//! Utility modules for maven-steps

pub mod logging;

pub use logging::{init_default, init_for_cli, init_from_env, init_logging, LoggingConfig};
