//! Plain-text and JSON renderings of bucket contents.

use serde_json::{json, Value};
use studio_protocol::{ArtifactEntry, LogEntry, LogPayload, MediaKind, MediaSource, StateSnapshot};

const MAX_RESPONSE_CHARS: usize = 200;

fn truncate(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    let mut short: String = text.chars().take(max).collect();
    short.push_str("...");
    short
}

/// One line for a log entry.
pub fn log_line(entry: &LogEntry) -> String {
    match entry.payload() {
        Ok(LogPayload::FunctionCall(call)) => {
            format!("[call] {}({})", call.function_name, call.arguments)
        }
        Ok(LogPayload::FunctionResponse(response)) => format!(
            "[result] {} -> {}",
            response.function_name,
            truncate(response.response.to_string(), MAX_RESPONSE_CHARS)
        ),
        Ok(LogPayload::TextResponse(text)) => format!("[{}] {}", text.author, text.text),
        Ok(LogPayload::Other) | Err(_) => format!("[{}] {}", entry.event, entry.data),
    }
}

pub fn log_record(entry: &LogEntry) -> Value {
    json!({
        "type": "log",
        "event": entry.event.as_str(),
        "data": entry.data,
    })
}

fn kind_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
        MediaKind::Table => "table",
        MediaKind::Other => "file",
    }
}

/// One line for an artifact. `index` is its position in the artifact list.
pub fn artifact_line(index: usize, artifact: &ArtifactEntry) -> String {
    let label = artifact
        .label()
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index + 1));
    let source = match artifact.media_source() {
        Some(MediaSource::Inline { mime_type, content }) => {
            format!("inline {}, {} base64 chars", mime_type, content.len())
        }
        Some(MediaSource::Url(url)) => url.to_string(),
        None => "no source".to_string(),
    };
    format!(
        "[artifact] {} / {} ({}) {}",
        artifact.section(),
        label,
        kind_name(artifact.media_kind()),
        source
    )
}

pub fn artifact_record(artifact: &ArtifactEntry) -> Value {
    json!({
        "type": "artifact",
        "section": artifact.section(),
        "label": artifact.label(),
        "mime_type": artifact.mime_type,
        "caption": artifact.caption,
        "source": artifact.media_source().map(|source| source.to_string()),
    })
}

/// Markdown sections, one per state key.
pub fn state_text(state: &StateSnapshot) -> String {
    state
        .iter()
        .map(|(key, value)| format!("## {}\n{}", key, value.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn state_record(state: &StateSnapshot) -> Value {
    json!({"type": "state", "state": state})
}
