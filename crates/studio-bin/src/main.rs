//! Design Studio CLI - stream a multi-agent design session to the terminal.

mod commands;
mod output;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use studio_config_and_utils::{init_logging, Config, Paths};
use tracing::debug;

/// Design Studio CLI - start design sessions and inspect their output.
#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Client for the design studio generation backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Backend WebSocket URL. Overrides the config file and STUDIO_RELAY_URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Base directory for config, cache and logs. Defaults to ~/.design-studio
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a design session and stream its output
    Design {
        /// Prompt to send. Defaults to the last submitted prompt
        prompt: Option<String>,

        /// Write inline artifacts into this directory when the session ends
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,

        /// Seconds to wait for the connection to open
        #[arg(long, default_value = "15")]
        connect_timeout: u64,
    },

    /// Manage the cached prompt
    Prompt {
        #[command(subcommand)]
        command: PromptCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum PromptCommands {
    /// Show the prompt the next session starts with
    Show,
    /// Forget the cached prompt
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };

    let mut config = Config::load(&paths)?;
    if let Some(url) = cli.url {
        config.relay_url = url;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    let log_path = if config.log_to_file {
        paths.ensure_dirs()?;
        Some(paths.log_file())
    } else {
        None
    };
    init_logging(&config.log_level, log_path);
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    match cli.command {
        Commands::Design {
            prompt,
            artifacts_dir,
            connect_timeout,
        } => {
            let options = commands::DesignOptions {
                prompt,
                artifacts_dir,
                connect_timeout: Duration::from_secs(connect_timeout),
            };
            commands::design(&config, &paths, options, &cli.format).await
        }
        Commands::Prompt { command } => match command {
            PromptCommands::Show => commands::prompt_show(&paths, &cli.format),
            PromptCommands::Clear => commands::prompt_clear(&paths, &cli.format),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_show(&config, &paths, &cli.format),
            ConfigCommands::Init { force } => {
                commands::config_init(&config, &paths, force, &cli.format)
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
