//! Configuration commands.

use anyhow::{Context, Result};
use serde_json::json;
use studio_config_and_utils::{Config, Paths};

use crate::output::{self, OutputFormat};

/// Write the effective configuration to the config file. An existing file
/// is left alone unless `force` is set.
pub fn config_init(
    config: &Config,
    paths: &Paths,
    force: bool,
    format: &OutputFormat,
) -> Result<()> {
    let path = paths.config_file();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    config
        .save(paths)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    output::print_success(&format!("Wrote {}", path.display()), format);
    Ok(())
}

/// Show the effective configuration and where files live.
pub fn config_show(config: &Config, paths: &Paths, format: &OutputFormat) -> Result<()> {
    if *format == OutputFormat::Json {
        let value = json!({
            "config": config,
            "paths": {
                "base_dir": paths.base_dir(),
                "config_file": paths.config_file(),
                "prompt_cache_file": paths.prompt_cache_file(),
                "log_file": paths.log_file(),
            },
        });
        output::print("", &value, format);
        return Ok(());
    }

    let attempts = config
        .max_reconnect_attempts
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unlimited".to_string());

    output::print_heading("Configuration");
    output::print_row("Relay URL", &config.relay_url);
    output::print_row("Log level", &config.log_level);
    output::print_row(
        "Reconnect delay",
        &format!(
            "{} ms, doubling up to {} ms",
            config.reconnect_base_delay_ms, config.reconnect_max_delay_ms
        ),
    );
    output::print_row("Reconnect attempts", &attempts);
    output::print_row("Log to file", &config.log_to_file.to_string());

    output::print_heading("Paths");
    output::print_row("Base dir", &paths.base_dir().display().to_string());
    output::print_row("Config file", &paths.config_file().display().to_string());
    output::print_row("Prompt cache", &paths.prompt_cache_file().display().to_string());
    output::print_row("Log file", &paths.log_file().display().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_writes_the_effective_config() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("studio"));
        let config = Config {
            relay_url: "wss://studio.example.com/api/ws".to_string(),
            max_reconnect_attempts: Some(3),
            ..Default::default()
        };

        config_init(&config, &paths, false, &OutputFormat::Json).unwrap();
        assert_eq!(Config::load_from_file(&paths.config_file()).unwrap(), config);
    }

    #[test]
    fn init_keeps_an_existing_file_without_force() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let original = Config {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        original.save(&paths).unwrap();

        let result = config_init(&Config::default(), &paths, false, &OutputFormat::Json);
        assert!(result.is_err());
        assert_eq!(Config::load_from_file(&paths.config_file()).unwrap(), original);

        config_init(&Config::default(), &paths, true, &OutputFormat::Json).unwrap();
        assert_eq!(
            Config::load_from_file(&paths.config_file()).unwrap(),
            Config::default()
        );
    }
}
