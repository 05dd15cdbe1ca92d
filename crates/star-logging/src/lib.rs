//! Logging setup for the STAR network simulator
//!
//! Wraps `tracing-subscriber` so the CLI, the tests and any embedding
//! program configure output the same way.
//!
//! # Quick Start
//!
//! ```ignore
//! use star_logging::{LogConfig, StarSubscriberBuilder};
//!
//! // Compact console output at `info`
//! let _guard = StarSubscriberBuilder::new().try_init()?;
//!
//! // Development mode with pretty output
//! let _guard = StarSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```
//!
//! `RUST_LOG` always takes precedence over the configured level.

pub mod config;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, LogConfig, RotationStrategy};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter {0:?}: {1}")]
    InvalidFilter(String, String),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install global subscriber: {0}")]
    Init(String),
}

/// Keeps the non-blocking file writer alive; drop it last
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builder for configuring and initializing the tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct StarSubscriberBuilder {
    config: LogConfig,
}

impl StarSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console_format(mut self, format: ConsoleFormat) -> Self {
        self.config.console.format = format;
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.config.default_level).map_err(|e| {
                LoggingError::InvalidFilter(self.config.default_level.clone(), e.to_string())
            }),
        }
    }

    fn console_layer(&self) -> Option<BoxedLayer> {
        let console = &self.config.console;
        if !console.enabled {
            return None;
        }
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true);
        Some(match console.format {
            ConsoleFormat::Pretty => layer.pretty().boxed(),
            ConsoleFormat::Compact => layer.compact().boxed(),
            ConsoleFormat::Json => layer.json().with_current_span(true).boxed(),
        })
    }

    fn file_layer(&self) -> Result<Option<(BoxedLayer, WorkerGuard)>, LoggingError> {
        let Some(file) = &self.config.file else {
            return Ok(None);
        };
        std::fs::create_dir_all(&file.directory)?;
        let appender = match file.rotation {
            RotationStrategy::Daily => rolling::daily(&file.directory, &file.prefix),
            RotationStrategy::Hourly => rolling::hourly(&file.directory, &file.prefix),
            RotationStrategy::Never => {
                rolling::never(&file.directory, format!("{}.log", file.prefix))
            }
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed();
        Ok(Some((layer, guard)))
    }

    /// Build the subscriber without installing it
    pub fn build(self) -> Result<(impl Subscriber + Send + Sync, LoggingGuard), LoggingError> {
        let filter = self.filter()?;
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = LoggingGuard::default();

        if let Some(console) = self.console_layer() {
            layers.push(console);
        }
        if let Some((file, file_guard)) = self.file_layer()? {
            layers.push(file);
            guard._file = Some(file_guard);
        }

        let subscriber = Registry::default().with(layers).with(filter);
        Ok((subscriber, guard))
    }

    /// Install the subscriber globally.
    ///
    /// Fails if a global subscriber has already been set. Keep the returned
    /// guard alive for as long as file output is needed.
    pub fn try_init(self) -> Result<LoggingGuard, LoggingError> {
        let (subscriber, guard) = self.build()?;
        subscriber
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
        Ok(guard)
    }
}

/// Install the testing configuration, ignoring an already installed
/// subscriber
pub fn init_testing() {
    let _ = StarSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = StarSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert_eq!(builder.config().console.format, ConsoleFormat::Compact);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = StarSubscriberBuilder::new()
            .with_level("trace")
            .with_console_format(ConsoleFormat::Json)
            .with_console(false);
        assert_eq!(builder.config().default_level, "trace");
        assert_eq!(builder.config().console.format, ConsoleFormat::Json);
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_build_scoped_subscriber() {
        let (subscriber, _guard) = StarSubscriberBuilder::new()
            .with_config(LogConfig::testing())
            .build()
            .unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(node = 1, "scoped warning");
        });
    }

    #[test]
    fn test_file_output_creates_directory() {
        let dir = std::env::temp_dir().join(format!("star-logging-{}", std::process::id()));
        let (subscriber, guard) = StarSubscriberBuilder::new()
            .with_console(false)
            .with_file_output(FileConfig {
                directory: dir.clone(),
                prefix: "test".to_string(),
                rotation: RotationStrategy::Never,
            })
            .build()
            .unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("to file");
        });
        drop(guard);
        assert!(dir.join("test.log").exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
