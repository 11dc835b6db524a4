//! # Observability
//!
//! Centralized tracing setup for the design studio client.
//!
//! Crates in this workspace are **log producers**. They use the standard
//! `tracing` macros and never configure a subscriber themselves. The binary
//! calls [`init_with_config`] once at startup and decides where output goes:
//!
//! - compact, human readable lines on stderr
//! - optionally, structured JSONL appended to a file (one object per line)
//!
//! `RUST_LOG` always wins over the configured default level.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "studio".into(),
//!         default_level: "debug".into(),
//!         ..Default::default()
//!     });
//!
//!     tracing::info!("ready");
//! }
//! ```

mod file_sink;
mod json_layer;

use std::io;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_sink::{FileLogWriter, FileWriterFactory};
pub use json_layer::{JsonLayer, LogLine};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info", "studio_relay=trace").
    /// Overridden by `RUST_LOG`.
    pub default_level: String,

    /// Append structured JSONL to this file when set.
    pub log_path: Option<PathBuf>,

    /// Emit compact lines on stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize the global subscriber.
///
/// If the JSONL file cannot be opened, logging falls back to stderr only and
/// the failure is reported once through the fallback subscriber. Calling this
/// twice is harmless; the second call leaves the first subscriber in place.
pub fn init_with_config(config: LogConfig) {
    if let Err(e) = try_init_with_config(&config) {
        let fallback = LogConfig {
            log_path: None,
            also_stderr: true,
            ..config.clone()
        };
        if try_init_with_config(&fallback).is_ok() {
            tracing::warn!(
                error = %e,
                log_path = ?config.log_path,
                "could not open log file, logging to stderr only"
            );
        }
    }
}

/// Initialize the global subscriber, reporting file and registration errors.
pub fn try_init_with_config(config: &LogConfig) -> io::Result<()> {
    let file_layer = match &config.log_path {
        Some(path) => {
            let writer = FileLogWriter::new(path)?;
            let layer = JsonLayer::new(
                config.service_name.clone(),
                FileWriterFactory::new(writer),
            );
            Some(layer.with_filter(env_filter(&config.default_level)))
        }
        None => None,
    };

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        log_path = ?config.log_path,
        "observability initialized"
    );
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
