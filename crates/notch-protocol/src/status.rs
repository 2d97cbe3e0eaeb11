//! Serializable snapshots of registry state.
//!
//! These DTOs back the `/status` and `/sessions` queries and are the
//! only view of session state presentation consumers receive.

use serde::{Deserialize, Serialize};

use notch_core::Session;

/// Snapshot of a session's active tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveToolSnapshot {
    pub tool_name: String,
    pub display_name: String,
    pub category: String,
    pub attention: String,
    pub elapsed_seconds: f64,
}

/// Snapshot of one tracked session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub project_name: String,
    pub project_path: String,
    pub is_active: bool,
    pub context_percent: f64,
    pub permission_mode: String,
    pub active_tool: Option<ActiveToolSnapshot>,
}

impl SessionSnapshot {
    /// Builds a snapshot from the domain entity.
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.session_id.as_str().to_string(),
            project_name: session.project_name.clone(),
            project_path: session.project_path.clone(),
            is_active: session.is_active,
            context_percent: round1(session.context_percent),
            permission_mode: session.permission_mode.clone(),
            active_tool: session.active_tool.as_ref().map(|tool| ActiveToolSnapshot {
                tool_name: tool.tool_name.clone(),
                display_name: tool.display_name.clone(),
                category: tool.category.clone(),
                attention: tool.attention.clone(),
                elapsed_seconds: round1(tool.elapsed_seconds()),
            }),
        }
    }
}

/// Full daemon status, as served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: String,
    pub is_idle: bool,
    pub session_count: usize,
    pub sessions: Vec<SessionSnapshot>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
