//! Stream protocol messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolResult;

/// Event discriminator carried in the `event` field of every inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    FunctionCall,
    FunctionResponse,
    TextResponse,
    /// Reserved tag for snapshot updates (`"state"`).
    State,
    Artifact,
    /// Any tag outside the known set, kept verbatim.
    Unknown(String),
}

impl EventKind {
    /// Map a wire tag to its kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "function_call" => Self::FunctionCall,
            "function_response" => Self::FunctionResponse,
            "text_response" => Self::TextResponse,
            "state" => Self::State,
            "artifact" => Self::Artifact,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::FunctionCall => "function_call",
            Self::FunctionResponse => "function_response",
            Self::TextResponse => "text_response",
            Self::State => "state",
            Self::Artifact => "artifact",
            Self::Unknown(tag) => tag,
        }
    }

    /// Agent step events: the kinds that carry a finality marker.
    pub fn is_agent_step(&self) -> bool {
        matches!(
            self,
            Self::FunctionCall | Self::FunctionResponse | Self::TextResponse
        )
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw frame received from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// The classified kind of this frame.
    pub fn kind(&self) -> EventKind {
        EventKind::from_tag(&self.event)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A message sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Kick off a new generation for `prompt`.
    StartDesign { prompt: String },
}

impl OutboundMessage {
    pub fn start_design(prompt: impl Into<String>) -> Self {
        Self::StartDesign {
            prompt: prompt.into(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One entry of the agent log, stored exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub event: EventKind,
    pub data: Value,
}

impl LogEntry {
    pub fn new(event: EventKind, data: Value) -> Self {
        Self { event, data }
    }

    /// The `is_final` marker; absent or non-boolean reads as `false`.
    pub fn is_final(&self) -> bool {
        self.data
            .get("is_final")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Decode the payload according to the entry's kind.
    pub fn payload(&self) -> ProtocolResult<LogPayload> {
        let payload = match &self.event {
            EventKind::FunctionCall => {
                LogPayload::FunctionCall(serde_json::from_value(self.data.clone())?)
            }
            EventKind::FunctionResponse => {
                LogPayload::FunctionResponse(serde_json::from_value(self.data.clone())?)
            }
            EventKind::TextResponse => {
                LogPayload::TextResponse(serde_json::from_value(self.data.clone())?)
            }
            EventKind::State | EventKind::Artifact | EventKind::Unknown(_) => LogPayload::Other,
        };
        Ok(payload)
    }
}

/// Typed view of a log entry's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum LogPayload {
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
    TextResponse(TextResponse),
    /// Unknown tags keep their raw `data` only.
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub function_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub function_name: String,
    #[serde(default)]
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    pub author: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}
