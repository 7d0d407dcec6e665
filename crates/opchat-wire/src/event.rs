//! Typed events carried by the response stream

use serde::Deserialize;
use serde_json::Value;

/// One decoded record from the response stream.
///
/// The `type` discriminator uses the backend's dotted names. Unknown fields
/// are ignored everywhere except the delta payload, which is kept as raw
/// JSON because the fragment can arrive under several nestings (see
/// [`delta_fragment`]).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// Backend assigned (or re-confirmed) the caller's user identity.
    #[serde(rename = "session")]
    Session {
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Backend minted or resolved the conversation thread.
    #[serde(rename = "thread")]
    Thread {
        thread_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename = "thread.run.created")]
    RunCreated {
        #[serde(default)]
        run_id: Option<String>,
    },
    #[serde(rename = "thread.run.in_progress")]
    RunInProgress,
    #[serde(rename = "thread.run.step.in_progress")]
    RunStepInProgress,
    #[serde(rename = "thread.message.created")]
    MessageCreated {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "thread.message.in_progress")]
    MessageInProgress,
    /// Incremental text fragment of the assistant's in-progress reply.
    #[serde(rename = "thread.message.delta")]
    MessageDelta {
        #[serde(flatten)]
        payload: Value,
    },
    /// The assistant message is final; carries the server-side ids.
    #[serde(rename = "thread.message.completed")]
    MessageCompleted {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        run_id: Option<String>,
    },
    #[serde(rename = "thread.run.completed")]
    RunCompleted,
    /// Terminal marker; nothing follows on the stream.
    #[serde(rename = "done")]
    Done,
    /// Server-reported turn failure; the message is surfaced verbatim.
    #[serde(rename = "error")]
    Error { message: String },
}

impl StreamEvent {
    /// Check if this event ends the turn (done or error).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    /// Check if this event is a pure liveness signal (run/message lifecycle
    /// markers that carry no text and must not be treated as errors when
    /// absent).
    pub fn is_liveness(&self) -> bool {
        matches!(
            self,
            StreamEvent::RunCreated { .. }
                | StreamEvent::RunInProgress
                | StreamEvent::RunStepInProgress
                | StreamEvent::MessageCreated { .. }
                | StreamEvent::MessageInProgress
        )
    }
}

/// Known nestings of the delta text fragment, in priority order.
///
/// Which shape a given delta uses depends on the backend's emission path.
/// Adding support for a new shape is a one-line addition here.
const FRAGMENT_PATHS: &[&str] = &[
    "/data/delta/content/0/text/value",
    "/delta/content/0/text/value",
    "/data/delta/text",
    "/delta/text",
    "/content",
];

/// Extract the text fragment from a delta payload.
///
/// Tries each known shape in order and returns the first non-empty match,
/// or `None` when no shape carries text (such deltas are ignored).
pub fn delta_fragment(payload: &Value) -> Option<&str> {
    FRAGMENT_PATHS
        .iter()
        .filter_map(|path| payload.pointer(path))
        .filter_map(Value::as_str)
        .find(|fragment| !fragment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StreamEvent {
        serde_json::from_str(json).expect("event should parse")
    }

    #[test]
    fn test_parse_session() {
        let event = parse(r#"{"type":"session","userId":"u1"}"#);
        assert_eq!(
            event,
            StreamEvent::Session {
                user_id: Some("u1".into())
            }
        );
    }

    #[test]
    fn test_parse_session_without_user() {
        let event = parse(r#"{"type":"session"}"#);
        assert_eq!(event, StreamEvent::Session { user_id: None });
    }

    #[test]
    fn test_parse_thread() {
        let event = parse(r#"{"type":"thread","threadId":"t1","userId":"u1"}"#);
        assert_eq!(
            event,
            StreamEvent::Thread {
                thread_id: "t1".into(),
                user_id: Some("u1".into())
            }
        );
    }

    #[test]
    fn test_parse_dotted_lifecycle_names() {
        assert!(matches!(
            parse(r#"{"type":"thread.run.created","runId":"r1"}"#),
            StreamEvent::RunCreated { run_id: Some(ref r) } if r == "r1"
        ));
        assert_eq!(
            parse(r#"{"type":"thread.run.in_progress"}"#),
            StreamEvent::RunInProgress
        );
        assert_eq!(
            parse(r#"{"type":"thread.run.step.in_progress"}"#),
            StreamEvent::RunStepInProgress
        );
        assert_eq!(
            parse(r#"{"type":"thread.message.in_progress"}"#),
            StreamEvent::MessageInProgress
        );
    }

    #[test]
    fn test_parse_completed_carries_ids() {
        let event = parse(r#"{"type":"thread.message.completed","id":"m1","runId":"r1"}"#);
        assert_eq!(
            event,
            StreamEvent::MessageCompleted {
                id: Some("m1".into()),
                run_id: Some("r1".into())
            }
        );
    }

    #[test]
    fn test_parse_error_event() {
        let event = parse(r#"{"type":"error","message":"rate limited"}"#);
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "rate limited".into()
            }
        );
        assert!(event.is_terminal());
    }

    #[test]
    fn test_liveness_markers() {
        assert!(parse(r#"{"type":"thread.message.created"}"#).is_liveness());
        assert!(parse(r#"{"type":"thread.run.in_progress"}"#).is_liveness());
        assert!(!parse(r#"{"type":"done"}"#).is_liveness());
    }

    #[test]
    fn test_fragment_assistants_shape() {
        let payload = serde_json::json!({
            "data": { "delta": { "content": [ { "text": { "value": "Hel" } } ] } }
        });
        assert_eq!(delta_fragment(&payload), Some("Hel"));
    }

    #[test]
    fn test_fragment_flat_shapes() {
        let payload = serde_json::json!({ "delta": { "text": "lo" } });
        assert_eq!(delta_fragment(&payload), Some("lo"));

        let payload = serde_json::json!({ "content": "!" });
        assert_eq!(delta_fragment(&payload), Some("!"));
    }

    #[test]
    fn test_fragment_priority_skips_empty_match() {
        // An empty string at a higher-priority path falls through to the
        // next shape that carries text.
        let payload = serde_json::json!({
            "delta": { "content": [ { "text": { "value": "" } } ], "text": "world" }
        });
        assert_eq!(delta_fragment(&payload), Some("world"));
    }

    #[test]
    fn test_fragment_none_when_no_shape_matches() {
        let payload = serde_json::json!({ "unrelated": true });
        assert_eq!(delta_fragment(&payload), None);
    }

    #[test]
    fn test_delta_event_keeps_raw_payload() {
        let event = parse(r#"{"type":"thread.message.delta","delta":{"text":"hi"}}"#);
        match event {
            StreamEvent::MessageDelta { payload } => {
                assert_eq!(delta_fragment(&payload), Some("hi"));
            }
            other => panic!("expected delta, got {:?}", other),
        }
    }
}
