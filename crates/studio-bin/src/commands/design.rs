//! The `design` command: run one generation and stream its output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use studio_config_and_utils::{Config, Paths};
use studio_protocol::ArtifactEntry;
use studio_relay::{ReadyState, RelayClient, RelayConfig};
use studio_session::{SessionController, SessionPhase};
use studio_store::{Bucket, PromptCache, Store};
use tracing::{info, warn};

use crate::output::{self, OutputFormat};
use crate::render;

/// Options for one `design` run.
#[derive(Debug, Clone)]
pub struct DesignOptions {
    /// Prompt to send; the cached prompt when `None`.
    pub prompt: Option<String>,
    /// Write inline artifacts here.
    pub artifacts_dir: Option<PathBuf>,
    pub connect_timeout: Duration,
}

/// Tracks how much of each bucket has been printed.
struct Printer {
    format: OutputFormat,
    logs: usize,
    artifacts: usize,
}

impl Printer {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            logs: 0,
            artifacts: 0,
        }
    }

    fn flush(&mut self, store: &Store) {
        let logs = store.logs();
        for entry in logs.iter().skip(self.logs) {
            output::print(&render::log_line(entry), &render::log_record(entry), &self.format);
        }
        self.logs = logs.len();

        let artifacts = store.artifacts();
        for (index, artifact) in artifacts.iter().enumerate().skip(self.artifacts) {
            output::print(
                &render::artifact_line(index, artifact),
                &render::artifact_record(artifact),
                &self.format,
            );
        }
        self.artifacts = artifacts.len();
    }

    fn print_state(&self, store: &Store) {
        let state = store.state();
        if state.is_empty() {
            return;
        }
        if self.format == OutputFormat::Text {
            output::print_heading("State");
        }
        output::print(
            &render::state_text(&state),
            &render::state_record(&state),
            &self.format,
        );
    }
}

/// Start a generation, print its log entries and artifacts as they arrive,
/// then print the final state.
pub async fn design(
    config: &Config,
    paths: &Paths,
    options: DesignOptions,
    format: &OutputFormat,
) -> Result<()> {
    let url = config.relay_url()?;
    let relay = RelayClient::new(RelayConfig {
        url: url.to_string(),
        reconnect_base_delay_ms: config.reconnect_base_delay_ms,
        reconnect_max_delay_ms: config.reconnect_max_delay_ms,
        max_reconnect_attempts: config.max_reconnect_attempts,
    });

    let cache = PromptCache::new(paths.prompt_cache_file());
    let store = Store::with_prompt(cache.load());
    let prompt = options
        .prompt
        .unwrap_or_else(|| store.prompt().as_str().to_string());
    let controller = SessionController::with_prompt_cache(relay.clone(), store.clone(), cache);

    let ingestion = controller.spawn_ingestion();
    let result = run_session(&controller, prompt, options.connect_timeout, format).await;

    relay.shutdown();
    if let Err(e) = ingestion.await {
        warn!(error = %e, "Ingestion task ended abnormally");
    }
    result?;

    if let Some(dir) = &options.artifacts_dir {
        let written = write_artifacts(dir, &store.artifacts())?;
        output::print_success(
            &format!("Wrote {} artifact(s) to {}", written, dir.display()),
            format,
        );
    }
    Ok(())
}

async fn run_session(
    controller: &SessionController,
    prompt: String,
    connect_timeout: Duration,
    format: &OutputFormat,
) -> Result<()> {
    let relay = controller.relay();
    let mut ready = relay.watch_ready_state();
    let opened = tokio::time::timeout(
        connect_timeout,
        ready.wait_for(|state| matches!(state, ReadyState::Open | ReadyState::Failed)),
    )
    .await
    .map(|result| result.is_ok())
    .unwrap_or(false);
    if !opened || !relay.is_open() {
        anyhow::bail!("Could not connect to {}", relay.config().url);
    }

    controller.start(prompt)?;
    info!("Waiting for the design to finish");

    let store = controller.store();
    let mut logs = store.subscribe(Bucket::Logs);
    let mut artifacts = store.subscribe(Bucket::Artifacts);
    let mut phase = controller.watch_phase();
    let mut printer = Printer::new(*format);

    loop {
        printer.flush(store);
        if *phase.borrow_and_update() == SessionPhase::Idle {
            break;
        }
        tokio::select! {
            _ = logs.changed() => {}
            _ = artifacts.changed() => {}
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; leaving the session unfinished");
                printer.flush(store);
                break;
            }
        }
    }

    printer.print_state(store);
    if relay.ready_state() == ReadyState::Failed {
        anyhow::bail!("Connection to {} failed permanently", relay.config().url);
    }
    Ok(())
}

/// File name for an artifact: its own file name when it has one, otherwise
/// a numbered name with an extension from the MIME type.
fn artifact_file_name(index: usize, artifact: &ArtifactEntry) -> String {
    let own = artifact
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty());
    if let Some(name) = own {
        return name.to_string();
    }

    let extension = match artifact.mime_type.as_deref() {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("video/mp4") => "mp4",
        Some("text/csv") => "csv",
        Some("text/markdown") => "md",
        Some("text/plain") => "txt",
        _ => "bin",
    };
    format!("artifact-{}.{}", index + 1, extension)
}

/// Decode and write every inline artifact into `dir`. URL-only artifacts
/// are skipped. Returns the number of files written.
fn write_artifacts(dir: &Path, artifacts: &[ArtifactEntry]) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = 0;
    for (index, artifact) in artifacts.iter().enumerate() {
        let bytes = match artifact.decode_content() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(e) => {
                warn!(index, error = %e, "Skipping artifact with undecodable content");
                continue;
            }
        };
        let path = dir.join(artifact_file_name(index, artifact));
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}
