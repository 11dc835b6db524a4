//! Routing of inbound frames to state buckets.

use crate::{
    ArtifactEntry, EventKind, InboundMessage, LogEntry, ProtocolError, ProtocolResult, StateDelta,
};

/// Where a frame belongs and the value to apply there.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Append to the log bucket.
    Log(LogEntry),
    /// Merge into the state snapshot.
    State(StateDelta),
    /// Append to the artifact bucket.
    Artifact(ArtifactEntry),
}

impl Classification {
    /// `Some(is_final)` for agent step events, `None` for everything else
    /// (state, artifacts and unknown tags never move the busy flag).
    pub fn finality(&self) -> Option<bool> {
        match self {
            Self::Log(entry) if entry.event.is_agent_step() => Some(entry.is_final()),
            Self::Log(_) | Self::State(_) | Self::Artifact(_) => None,
        }
    }
}

/// Classify one frame. Pure: the same input always yields the same output
/// and nothing is mutated.
pub fn classify(message: InboundMessage) -> ProtocolResult<Classification> {
    let kind = message.kind();
    match kind {
        EventKind::FunctionCall | EventKind::FunctionResponse | EventKind::TextResponse => {
            Ok(Classification::Log(LogEntry::new(kind, message.data)))
        }
        EventKind::State => Ok(Classification::State(StateDelta::from_value(message.data)?)),
        EventKind::Artifact => {
            if !message.data.is_object() {
                return Err(ProtocolError::malformed(
                    &message.event,
                    "data must be an object",
                ));
            }
            let artifact: ArtifactEntry = serde_json::from_value(message.data).map_err(|e| {
                ProtocolError::malformed(&message.event, e.to_string())
            })?;
            Ok(Classification::Artifact(artifact))
        }
        EventKind::Unknown(_) => Ok(Classification::Log(LogEntry::new(kind, message.data))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(event: &str, data: serde_json::Value) -> InboundMessage {
        InboundMessage::new(event, data)
    }

    #[test]
    fn agent_steps_become_log_entries_unmodified() {
        let data = json!({"function_name": "search", "arguments": {"q": "lace"}, "extra": [1]});
        let result = classify(msg("function_call", data.clone())).unwrap();
        assert_eq!(
            result,
            Classification::Log(LogEntry::new(EventKind::FunctionCall, data))
        );
    }

    #[test]
    fn artifact_becomes_artifact_entry() {
        let result = classify(msg(
            "artifact",
            json!({"mime_type": "image/png", "content": "AAAA", "section_name": "Moodboard"}),
        ))
        .unwrap();

        let Classification::Artifact(artifact) = result else {
            panic!("expected artifact");
        };
        assert_eq!(artifact.mime_type.as_deref(), Some("image/png"));
        assert_eq!(artifact.section(), "Moodboard");
    }

    #[test]
    fn state_becomes_delta() {
        let result = classify(msg("state", json!({"brief": "# Brief"}))).unwrap();
        let Classification::State(delta) = result else {
            panic!("expected state");
        };
        assert_eq!(delta.0["brief"], "# Brief");
    }

    #[test]
    fn unknown_tags_are_logged_not_dropped() {
        let result = classify(msg("agent_transfer", json!({"to": "stylist"}))).unwrap();
        assert_eq!(
            result,
            Classification::Log(LogEntry::new(
                EventKind::Unknown("agent_transfer".to_string()),
                json!({"to": "stylist"})
            ))
        );
        assert_eq!(result.finality(), None);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            classify(msg("artifact", json!("not an object"))),
            Err(ProtocolError::MalformedFrame { .. })
        ));
        assert!(matches!(
            classify(msg("artifact", json!({"url": 7}))),
            Err(ProtocolError::MalformedFrame { .. })
        ));
        assert!(matches!(
            classify(msg("state", json!([]))),
            Err(ProtocolError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn finality_only_for_agent_steps() {
        let final_text = classify(msg(
            "text_response",
            json!({"author": "agent", "text": "done", "is_final": true}),
        ))
        .unwrap();
        assert_eq!(final_text.finality(), Some(true));

        let no_marker = classify(msg("function_response", json!({"function_name": "f"}))).unwrap();
        assert_eq!(no_marker.finality(), Some(false));

        let artifact = classify(msg("artifact", json!({"url": "u", "is_final": true}))).unwrap();
        assert_eq!(artifact.finality(), None);

        let state = classify(msg("state", json!({"is_final": "true"}))).unwrap();
        assert_eq!(state.finality(), None);
    }

    #[test]
    fn classification_is_deterministic() {
        let frame = msg("text_response", json!({"author": "a", "text": "t"}));
        assert_eq!(classify(frame.clone()).unwrap(), classify(frame).unwrap());
    }
}
