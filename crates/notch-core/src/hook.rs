//! Hook event types from Claude Code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Types of lifecycle hook events from Claude Code.
///
/// This is a closed set: events with unrecognized names are dropped at
/// the boundary instead of flowing into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEventType {
    /// Before a tool is executed
    PreToolUse,

    /// After a tool completes execution
    PostToolUse,

    /// Claude finished responding
    Stop,

    /// A subagent finished responding
    SubagentStop,

    /// A new session started (or resumed)
    SessionStart,

    /// A session ended
    SessionEnd,

    /// Informational notification
    Notification,

    /// The user submitted a prompt
    UserPromptSubmit,
}

impl HookEventType {
    /// Parses from a hook event name string.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "PreToolUse" => Some(Self::PreToolUse),
            "PostToolUse" => Some(Self::PostToolUse),
            "Stop" => Some(Self::Stop),
            "SubagentStop" => Some(Self::SubagentStop),
            "SessionStart" => Some(Self::SessionStart),
            "SessionEnd" => Some(Self::SessionEnd),
            "Notification" => Some(Self::Notification),
            "UserPromptSubmit" => Some(Self::UserPromptSubmit),
            _ => None,
        }
    }

    /// Returns true for events that end the current tool / turn.
    pub fn is_stop_event(&self) -> bool {
        matches!(self, Self::Stop | Self::SubagentStop)
    }
}

impl fmt::Display for HookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::Notification => "Notification",
            Self::UserPromptSubmit => "UserPromptSubmit",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_event_parsing() {
        assert_eq!(
            HookEventType::from_event_name("PreToolUse"),
            Some(HookEventType::PreToolUse)
        );
        assert_eq!(
            HookEventType::from_event_name("SubagentStop"),
            Some(HookEventType::SubagentStop)
        );
        assert_eq!(HookEventType::from_event_name("SomethingElse"), None);
        assert_eq!(HookEventType::from_event_name(""), None);
    }

    #[test]
    fn test_stop_event_classification() {
        assert!(HookEventType::Stop.is_stop_event());
        assert!(HookEventType::SubagentStop.is_stop_event());
        assert!(!HookEventType::PostToolUse.is_stop_event());
    }
}
