#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Rollout Log
//!
//! Installs a global `tracing` subscriber for rollout services.
//!
//! ```rust,ignore
//! let _guard = rollout_log::init_with(rollout_log::Config::from_env())?;
//! tracing::info!(partition = "stb/firmware_rule", "ready");
//! ```

mod builder;
pub mod config;

use std::sync::OnceLock;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, Format};

/// Errors raised while installing the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The filter directives do not parse.
    #[error("invalid filter: {0}")]
    Filter(String),

    /// A global subscriber could not be installed.
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

static TEST_INIT: OnceLock<()> = OnceLock::new();

/// Initialize with default configuration
pub fn init() -> Result<LoggerGuard, LogError> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> Result<LoggerGuard, LogError> {
    LoggerBuilder::from_config(config).build()
}

/// Pick a configuration from the environment and build profile.
pub fn auto_init() -> Result<LoggerGuard, LogError> {
    if std::env::var(config::ENV_LOG).is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize for tests. Safe to call from every test; only the first call
/// in a process installs anything.
pub fn init_test() -> LoggerGuard {
    let mut guard = None;
    TEST_INIT.get_or_init(|| {
        if !tracing::dispatcher::has_been_set() {
            guard = init_with(Config::test()).ok();
        }
    });
    guard.unwrap_or_else(LoggerGuard::noop)
}
