//! Session domain entities and value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::config::ToolInfo;

/// Tool name of the synthetic grace-period placeholder.
///
/// A session whose active tool carries this name is "thinking" between
/// real tool calls; it must never be recorded to usage statistics.
pub const THINKING_TOOL: &str = "_thinking";

/// Maximum number of entries kept in a session's recent-tool timeline.
pub const RECENT_TOOLS_CAP: usize = 10;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Unique identifier for a Claude Code session.
///
/// Wraps the opaque id string provided by the assistant's hook payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened display form (first 8 characters).
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// A tool currently (or recently) executing within a session, with its
/// resolved display metadata.
///
/// Replaced wholesale on every transition; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTool {
    pub tool_name: String,
    pub started_at: DateTime<Utc>,
    pub description: String,
    pub category: String,
    pub display_name: String,
    pub color: String,
    pub pattern: String,
    pub attention: String,
}

impl ActiveTool {
    /// Creates an ActiveTool from resolved config info, started now.
    pub fn from_info(info: &ToolInfo) -> Self {
        Self {
            tool_name: info.tool_name.clone(),
            started_at: Utc::now(),
            description: info.description.clone(),
            category: info.category.clone(),
            display_name: info.display_name.clone(),
            color: info.color.clone(),
            pattern: info.pattern.clone(),
            attention: info.attention.clone(),
        }
    }

    /// Creates the synthetic grace-period placeholder.
    ///
    /// `verb` is the filler verb shown as the display name; the rest of
    /// the display metadata comes from the thinking category.
    pub fn thinking(verb: &str, info: &ToolInfo) -> Self {
        Self {
            tool_name: THINKING_TOOL.to_string(),
            started_at: Utc::now(),
            description: String::new(),
            category: info.category.clone(),
            display_name: verb.to_string(),
            color: info.color.clone(),
            pattern: info.pattern.clone(),
            attention: info.attention.clone(),
        }
    }

    /// Returns true if this is the synthetic thinking placeholder.
    pub fn is_thinking(&self) -> bool {
        self.tool_name == THINKING_TOOL
    }

    /// Elapsed time since this tool started, in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
    }
}

/// Token usage statistics for a session.
///
/// Overwritten wholesale on each transcript read: the transcript carries
/// running totals, so the latest snapshot wins and values are never
/// accumulated across reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TokenStats {
    /// Input plus output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Total tokens relevant for cost (includes cache creation).
    pub fn total_cost_tokens(&self) -> u64 {
        self.total_tokens().saturating_add(self.cache_creation_tokens)
    }
}

/// Opaque reference to the terminal window hosting a session's process.
///
/// Resolved best-effort for click-to-focus; never required for tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalWindow(u64);

impl TerminalWindow {
    pub fn new(handle: u64) -> Self {
        Self(handle)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

// ============================================================================
// Domain Entity
// ============================================================================

/// A tracked Claude Code session.
///
/// Created lazily on the first event carrying an unseen session id,
/// mutated by every subsequent event for that id, and removed by the
/// stale-session pruning sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub session_id: SessionId,

    /// Working directory of the session's project
    pub project_path: String,

    /// Display name derived from the project path
    pub project_name: String,

    /// When the session started
    pub start_time: DateTime<Utc>,

    /// Last activity timestamp (non-decreasing)
    pub last_activity: DateTime<Utc>,

    /// Tool currently executing, if any
    pub active_tool: Option<ActiveTool>,

    /// Recently started tools, newest first, capped
    pub recent_tools: Vec<ActiveTool>,

    /// Whether the session is actively working
    pub is_active: bool,

    /// Permission mode reported by the assistant
    pub permission_mode: String,

    /// Latest token usage snapshot
    pub token_stats: TokenStats,

    /// Tokens counted against the context window
    pub context_tokens: u64,

    /// Context window usage, clamped to [0, 100]
    pub context_percent: f64,

    /// Terminal window for click-to-focus, if resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_window: Option<TerminalWindow>,

    /// When the transcript was last read for token usage (throttle state)
    #[serde(skip)]
    pub last_token_read: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a new session from its id and working directory.
    pub fn new(session_id: SessionId, cwd: &str) -> Self {
        let project_path = if cwd.is_empty() {
            "Unknown".to_string()
        } else {
            cwd.to_string()
        };
        let project_name = derive_project_name(&project_path);
        let now = Utc::now();

        Self {
            session_id,
            project_path,
            project_name,
            start_time: now,
            last_activity: now,
            active_tool: None,
            recent_tools: Vec::new(),
            is_active: true,
            permission_mode: "normal".to_string(),
            token_stats: TokenStats::default(),
            context_tokens: 0,
            context_percent: 0.0,
            terminal_window: None,
            last_token_read: None,
        }
    }

    /// Display name for the session.
    pub fn display_name(&self) -> &str {
        if !self.project_name.is_empty() {
            &self.project_name
        } else {
            "Unknown"
        }
    }

    /// One-line status text combining activity and project.
    pub fn status_text(&self) -> String {
        match &self.active_tool {
            Some(tool) => format!("{} - {}", tool.display_name, self.display_name()),
            None => format!("Idle - {}", self.display_name()),
        }
    }

    /// Updates `last_activity` to now, keeping it non-decreasing.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Prepends a tool to the recent-tools timeline, enforcing the cap.
    pub fn push_recent_tool(&mut self, tool: ActiveTool) {
        self.recent_tools.insert(0, tool);
        self.recent_tools.truncate(RECENT_TOOLS_CAP);
    }

    /// Returns true if the session has had no activity for longer than
    /// `timeout_secs`.
    pub fn is_stale_at(&self, timeout_secs: u64) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_activity);
        idle.num_seconds() > timeout_secs as i64
    }
}

/// Derives a project display name from the final path component.
fn derive_project_name(project_path: &str) -> String {
    if project_path == "Unknown" {
        return "Unknown".to_string();
    }
    Path::new(project_path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "Unknown".to_string())
}
