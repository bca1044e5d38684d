//! Tracing subscriber setup
//!
//! This module provides utilities for initializing and configuring tracing subscribers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kvreliable::observability::subscriber::{init_subscriber, SubscriberConfig, OutputFormat};
//!
//! // Initialize with default configuration
//! init_subscriber(SubscriberConfig::default())?;
//!
//! // Initialize with custom configuration
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! init_subscriber(config)?;
//! ```

use crate::error::{KvError, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format
    Json,
    /// Compact JSON format
    JsonCompact,
}

/// Configuration for tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Log level
    pub log_level: tracing::Level,
    /// Output format
    pub output_format: OutputFormat,
    /// Log file path (optional). When set, logs go to the file instead of stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    /// Create a new builder for SubscriberConfig
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Create a debug configuration
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Create a production configuration
    pub fn production(log_file: PathBuf) -> Self {
        Self {
            log_level: tracing::Level::WARN,
            output_format: OutputFormat::Json,
            log_file: Some(log_file),
        }
    }
}

/// Builder for SubscriberConfig
#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    /// Set the log level
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(KvError::Configuration(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    /// Set the output format
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Set the log file path
    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            log_file: self.log_file,
        }
    }
}

/// Initialize tracing subscriber with the given configuration
///
/// Returns the file writer's guard when `log_file` is set; keep it alive for as
/// long as logs should be flushed. Re-initialization is not an error.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>> {
    let level = config.log_level.as_str().to_lowercase();
    let filter = format!("kvreliable={level}");

    match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path.file_name().ok_or_else(|| {
                KvError::Configuration(format!("Invalid log file path: {}", path.display()))
            })?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            try_init(config.output_format, &filter, writer)?;
            Ok(Some(guard))
        }
        None => {
            try_init(config.output_format, &filter, std::io::stdout)?;
            Ok(None)
        }
    }
}

fn try_init<W>(format: OutputFormat, filter: &str, writer: W) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer);

    let init_result = match format {
        OutputFormat::Json => builder
            .with_thread_ids(true)
            .with_thread_names(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => builder.json().flatten_event(true).try_init(),
        OutputFormat::Text => builder.try_init(),
    };

    // Handle the case where tracing is already initialized
    match init_result {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(KvError::Configuration(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        }
    }
}

/// Initialize tracing subscriber with default configuration
pub fn init_default() -> Result<Option<WorkerGuard>> {
    init_subscriber(SubscriberConfig::default())
}

/// Initialize tracing subscriber from environment variables
///
/// Supported environment variables:
/// - `KVRELIABLE_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
/// - `KVRELIABLE_LOG_FORMAT`: Output format (text, json, json-compact)
/// - `KVRELIABLE_LOG_FILE`: Log file path
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    init_subscriber(config_from_env()?)
}

fn config_from_env() -> Result<SubscriberConfig> {
    let mut builder = SubscriberConfig::builder();

    if let Ok(level) = std::env::var("KVRELIABLE_LOG_LEVEL") {
        builder = builder.log_level_str(&level)?;
    }

    if let Ok(format) = std::env::var("KVRELIABLE_LOG_FORMAT") {
        let output_format = match format.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "json-compact" => OutputFormat::JsonCompact,
            "text" => OutputFormat::Text,
            _ => {
                return Err(KvError::Configuration(format!(
                    "Invalid log format: {format}. Valid options: text, json, json-compact"
                )));
            }
        };
        builder = builder.output_format(output_format);
    }

    if let Ok(file_path) = std::env::var("KVRELIABLE_LOG_FILE") {
        builder = builder.log_file(PathBuf::from(file_path));
    }

    Ok(builder.build())
}
