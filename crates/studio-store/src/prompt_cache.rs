//! On-disk cache of the last submitted prompt.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::StoreResult;

/// Prompt used when nothing has been cached yet.
pub const DEFAULT_PROMPT: &str = "I'm looking for inspiration for a red Victorian dress with lace and floral patterns, suitable for a royal ball in the 1800s.";

#[derive(Debug, Serialize, Deserialize)]
struct CachedPrompt {
    prompt: String,
    saved_at: DateTime<Utc>,
}

/// JSON file holding the prompt of the most recent session.
#[derive(Debug, Clone)]
pub struct PromptCache {
    path: PathBuf,
}

impl PromptCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached prompt, or [`DEFAULT_PROMPT`] when there is none or the
    /// file cannot be read.
    pub fn load(&self) -> String {
        match self.try_load() {
            Ok(Some(prompt)) => prompt,
            Ok(None) => DEFAULT_PROMPT.to_string(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable prompt cache");
                DEFAULT_PROMPT.to_string()
            }
        }
    }

    /// The cached prompt, `None` if nothing is cached.
    pub fn try_load(&self) -> StoreResult<Option<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cached: CachedPrompt = serde_json::from_str(&content)?;
        debug!(saved_at = %cached.saved_at, "Loaded cached prompt");
        Ok(Some(cached.prompt))
    }

    pub fn save(&self, prompt: &str) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let cached = CachedPrompt {
            prompt: prompt.to_string(),
            saved_at: Utc::now(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&cached)?)?;
        Ok(())
    }

    /// Forget the cached prompt. Clearing an empty cache is not an error.
    pub fn clear(&self) -> StoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let cache = PromptCache::new(dir.path().join("prompt.json"));

        assert!(cache.try_load().unwrap().is_none());
        assert_eq!(cache.load(), DEFAULT_PROMPT);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = PromptCache::new(dir.path().join("nested").join("prompt.json"));

        cache.save("a linen summer suit").unwrap();
        assert_eq!(cache.load(), "a linen summer suit");

        cache.save("").unwrap();
        assert_eq!(cache.try_load().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompt.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = PromptCache::new(&path);
        assert!(cache.try_load().is_err());
        assert_eq!(cache.load(), DEFAULT_PROMPT);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = PromptCache::new(dir.path().join("prompt.json"));

        cache.save("coat").unwrap();
        cache.clear().unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.load(), DEFAULT_PROMPT);
    }
}
