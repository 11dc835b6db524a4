//! Logging initialization.
//!
//! Thin wrapper over the workspace `observability` crate so the binary only
//! has to pick a level and, optionally, a JSONL file.

use std::path::PathBuf;

/// Initialize logging for the `studio` binary.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(observability::LogConfig {
        service_name: "studio".into(),
        default_level: level.into(),
        log_path,
        also_stderr: true,
    });
}
