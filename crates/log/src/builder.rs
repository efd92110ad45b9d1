//! Subscriber installation.

use tracing_subscriber::fmt::writer::{BoxMakeWriter, TestWriter};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::LogError;
use crate::config::{Config, Format};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard returned by initialization.
///
/// Inactive when another subscriber was already installed.
#[derive(Debug)]
#[must_use = "dropping the guard is harmless but usually unintended"]
pub struct LoggerGuard {
    active: bool,
}

impl LoggerGuard {
    pub(crate) fn noop() -> Self {
        Self { active: false }
    }

    /// Returns `true` when this call installed the global subscriber.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build the subscriber and install it globally.
    ///
    /// Fails when the filter does not parse or a global subscriber is
    /// already set.
    pub fn build(self) -> Result<LoggerGuard, LogError> {
        let Config {
            level,
            format,
            ansi,
            target,
            test_writer,
        } = self.config;

        let filter = EnvFilter::try_new(&level)
            .map_err(|e| LogError::Filter(format!("{level}: {e}")))?;
        let writer = if test_writer {
            BoxMakeWriter::new(TestWriter::new())
        } else {
            BoxMakeWriter::new(std::io::stderr)
        };
        let registry = Registry::default().with(filter);

        let installed = match format {
            Format::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_ansi(ansi)
                        .with_target(target)
                        .with_writer(writer),
                )
                .try_init(),
            Format::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_ansi(ansi)
                        .with_target(target)
                        .with_writer(writer),
                )
                .try_init(),
            Format::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_target(target)
                        .with_writer(writer),
                )
                .try_init(),
        };
        installed.map_err(|e| LogError::Init(e.to_string()))?;

        tracing::debug!(%format, level = %level, "logger installed");
        Ok(LoggerGuard { active: true })
    }
}
