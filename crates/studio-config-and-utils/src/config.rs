//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Backend WebSocket endpoint used when nothing else is configured.
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8080/api/ws";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVEL_ENV: &str = "STUDIO_LOG_LEVEL";
const RELAY_URL_ENV: &str = "STUDIO_RELAY_URL";

/// Main client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Backend WebSocket endpoint.
    pub relay_url: String,
    /// First reconnect delay in milliseconds; doubles on each failed attempt.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Give up after this many consecutive failed reconnects.
    /// `None` keeps reconnecting forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Also write JSONL logs under the logs directory.
    pub log_to_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            relay_url: DEFAULT_RELAY_URL.to_string(),
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
            max_reconnect_attempts: None,
            log_to_file: false,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(level) = non_empty(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
        if let Some(url) = non_empty(RELAY_URL_ENV) {
            self.relay_url = url;
        }
    }

    /// The relay URL, parsed and checked for a WebSocket scheme.
    pub fn relay_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.relay_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(CoreError::Config(format!(
                "relay_url must use ws:// or wss://, got {}://",
                other
            ))),
        }
    }
}
