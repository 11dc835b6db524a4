//! Cached prompt commands.

use anyhow::Result;
use serde_json::json;
use studio_config_and_utils::Paths;
use studio_store::PromptCache;

use crate::output::{self, OutputFormat};

/// Show the prompt the next `design` run starts with.
pub fn prompt_show(paths: &Paths, format: &OutputFormat) -> Result<()> {
    let cache = PromptCache::new(paths.prompt_cache_file());
    let cached = cache.try_load().ok().flatten();
    let is_default = cached.is_none();
    let prompt = cached.unwrap_or_else(|| cache.load());

    let text = if is_default {
        format!("{}\n(default prompt)", prompt)
    } else {
        prompt.clone()
    };
    output::print(
        &text,
        &json!({"prompt": prompt, "default": is_default}),
        format,
    );
    Ok(())
}

/// Forget the cached prompt.
pub fn prompt_clear(paths: &Paths, format: &OutputFormat) -> Result<()> {
    PromptCache::new(paths.prompt_cache_file()).clear()?;
    output::print_success("Cached prompt cleared", format);
    Ok(())
}
