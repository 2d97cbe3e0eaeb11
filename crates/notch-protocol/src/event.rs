//! Inbound event payloads.
//!
//! Hook payloads arrive over HTTP from the hook script. The script sends
//! camelCase field names, but some installations forward the assistant's
//! native snake_case payload untouched, so every field accepts both
//! spellings. All fields are optional: missing data degrades to empty or
//! unknown values, never to a parse error.

use serde::Deserialize;
use serde_json::Value;

use notch_core::{HookEventType, SessionId};

/// Session id used when a payload carries none.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Raw hook event payload as delivered to `POST /hook`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookPayload {
    /// Hook event name (e.g. "PreToolUse")
    #[serde(rename = "eventType", alias = "hook_event_name", default)]
    pub event_type: String,

    /// Session identifier
    #[serde(rename = "sessionId", alias = "session_id", default)]
    pub session_id: String,

    /// Working directory of the session
    #[serde(default)]
    pub cwd: String,

    /// Process id of the assistant process, injected by the hook script
    #[serde(default)]
    pub pid: Option<u32>,

    /// Tool name for tool events
    #[serde(rename = "tool", alias = "tool_name", default)]
    pub tool_name: String,

    /// Tool input object
    #[serde(rename = "toolInput", alias = "tool_input", default)]
    pub tool_input: Option<Value>,

    /// Tool result/output object or string
    #[serde(
        rename = "toolOutput",
        alias = "toolResult",
        alias = "tool_output",
        alias = "tool_result",
        alias = "tool_response",
        default
    )]
    pub tool_result: Option<Value>,

    /// Path to the session transcript JSONL file
    #[serde(rename = "transcriptPath", alias = "transcript_path", default)]
    pub transcript_path: Option<String>,

    /// Inline transcript content (JSONL), if the sender embeds it
    #[serde(default)]
    pub transcript: Option<String>,

    /// Permission mode reported by the assistant
    #[serde(rename = "permissionMode", alias = "permission_mode", default)]
    pub permission_mode: Option<String>,

    /// Sender-side timestamp (informational only)
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HookPayload {
    /// Parses the hook event type; unknown names yield `None`.
    pub fn event(&self) -> Option<HookEventType> {
        HookEventType::from_event_name(&self.event_type)
    }

    /// Returns the session id, substituting a default for empty ids.
    pub fn session(&self) -> SessionId {
        if self.session_id.is_empty() {
            SessionId::new(DEFAULT_SESSION_ID)
        } else {
            SessionId::new(&self.session_id)
        }
    }

    /// Extracts a human-readable message from the tool input.
    ///
    /// Notification events carry their text in `toolInput.message` (or
    /// `toolInput.title`); plain-string inputs are used verbatim.
    /// Returns `None` when no non-empty message is present.
    pub fn notification_message(&self) -> Option<String> {
        let input = self.tool_input.as_ref()?;
        let message = match input {
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    map.get("title")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                })
                .map(str::to_string),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        message
    }

    /// Returns the transcript to read for token usage, if any.
    pub fn transcript_source(&self) -> Option<TranscriptSource> {
        if let Some(path) = self.transcript_path.as_ref().filter(|p| !p.is_empty()) {
            return Some(TranscriptSource::Path(path.clone()));
        }
        self.transcript
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| TranscriptSource::Inline(t.clone()))
    }
}

/// Where a session transcript can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptSource {
    /// Path to a JSONL file on disk
    Path(String),
    /// JSONL content carried inline in the payload
    Inline(String),
}

/// Payload for `POST /pin` and `POST /unpin`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PinPayload {
    #[serde(rename = "sessionId", alias = "session_id", default)]
    pub session_id: String,

    #[serde(default)]
    pub cwd: String,

    #[serde(default)]
    pub timestamp: Option<String>,
}

/// An ingress event: the `(event_type, payload)` pair delivered to the
/// registry's single event-handling entry point.
#[derive(Debug, Clone)]
pub enum IngressEvent {
    /// Lifecycle hook event
    Hook(Box<HookPayload>),
    /// Pin a project path so its sessions survive pruning
    Pin(PinPayload),
    /// Clear all pinned paths
    Unpin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hook_payload_camel_case() {
        let payload: HookPayload = serde_json::from_value(json!({
            "eventType": "PreToolUse",
            "sessionId": "s1",
            "cwd": "/home/user/proj",
            "tool": "Bash",
            "toolInput": {"command": "ls"},
            "permissionMode": "plan",
            "pid": 4242
        }))
        .expect("parses");

        assert_eq!(payload.event(), Some(HookEventType::PreToolUse));
        assert_eq!(payload.session().as_str(), "s1");
        assert_eq!(payload.tool_name, "Bash");
        assert_eq!(payload.permission_mode.as_deref(), Some("plan"));
        assert_eq!(payload.pid, Some(4242));
    }

    #[test]
    fn test_hook_payload_snake_case_aliases() {
        let payload: HookPayload = serde_json::from_value(json!({
            "hook_event_name": "PostToolUse",
            "session_id": "s2",
            "tool_name": "Bash",
            "tool_response": {"exitCode": 1},
            "transcript_path": "/tmp/t.jsonl"
        }))
        .expect("parses");

        assert_eq!(payload.event(), Some(HookEventType::PostToolUse));
        assert_eq!(payload.session().as_str(), "s2");
        assert_eq!(payload.tool_name, "Bash");
        assert!(payload.tool_result.is_some());
        assert_eq!(
            payload.transcript_source(),
            Some(TranscriptSource::Path("/tmp/t.jsonl".to_string()))
        );
    }

    #[test]
    fn test_hook_payload_empty_object() {
        let payload: HookPayload = serde_json::from_value(json!({})).expect("parses");
        assert_eq!(payload.event(), None);
        assert_eq!(payload.session().as_str(), DEFAULT_SESSION_ID);
        assert!(payload.transcript_source().is_none());
    }

    #[test]
    fn test_unknown_event_name_yields_none() {
        let payload: HookPayload = serde_json::from_value(json!({
            "eventType": "SomethingNew",
            "sessionId": "s1"
        }))
        .expect("parses");
        assert_eq!(payload.event(), None);
    }

    #[test]
    fn test_notification_message_from_object() {
        let payload: HookPayload = serde_json::from_value(json!({
            "eventType": "Notification",
            "sessionId": "s1",
            "toolInput": {"message": "Hello"}
        }))
        .expect("parses");
        assert_eq!(payload.notification_message().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_notification_message_title_fallback() {
        let payload: HookPayload = serde_json::from_value(json!({
            "toolInput": {"title": "Heads up"}
        }))
        .expect("parses");
        assert_eq!(payload.notification_message().as_deref(), Some("Heads up"));
    }

    #[test]
    fn test_notification_message_empty() {
        let payload: HookPayload =
            serde_json::from_value(json!({"toolInput": {}})).expect("parses");
        assert_eq!(payload.notification_message(), None);

        let payload: HookPayload = serde_json::from_value(json!({})).expect("parses");
        assert_eq!(payload.notification_message(), None);
    }

    #[test]
    fn test_inline_transcript_source() {
        let payload: HookPayload = serde_json::from_value(json!({
            "transcript": "{\"type\":\"assistant\"}"
        }))
        .expect("parses");
        assert!(matches!(
            payload.transcript_source(),
            Some(TranscriptSource::Inline(_))
        ));
    }

    #[test]
    fn test_transcript_path_preferred_over_inline() {
        let payload: HookPayload = serde_json::from_value(json!({
            "transcriptPath": "/tmp/t.jsonl",
            "transcript": "{}"
        }))
        .expect("parses");
        assert!(matches!(
            payload.transcript_source(),
            Some(TranscriptSource::Path(_))
        ));
    }

    #[test]
    fn test_pin_payload() {
        let payload: PinPayload = serde_json::from_value(json!({
            "sessionId": "s1",
            "cwd": "/home/user/proj"
        }))
        .expect("parses");
        assert_eq!(payload.cwd, "/home/user/proj");
    }
}
