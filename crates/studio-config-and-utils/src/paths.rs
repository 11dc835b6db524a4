//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Directory name under the user's home.
const BASE_DIR_NAME: &str = ".design-studio";

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.design-studio)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.design-studio`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the config file path (config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the cached session prompt path (prompt.json).
    pub fn prompt_cache_file(&self) -> PathBuf {
        self.base_dir.join("prompt.json")
    }

    /// Get the logs directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (logs/studio.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("studio.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
