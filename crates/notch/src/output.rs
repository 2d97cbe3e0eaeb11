//! Plain-text rendering of daemon snapshots.

use notch_protocol::{SessionSnapshot, StatusSnapshot};

/// Renders the full status snapshot.
pub fn render_status(status: &StatusSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "notchd: {} ({} session{}{})\n",
        status.status,
        status.session_count,
        if status.session_count == 1 { "" } else { "s" },
        if status.is_idle { ", idle" } else { "" },
    ));
    for session in &status.sessions {
        out.push_str(&render_session_line(session));
        out.push('\n');
    }
    out
}

/// Renders the display-session list.
pub fn render_sessions(sessions: &[SessionSnapshot]) -> String {
    if sessions.is_empty() {
        return "no sessions to display\n".to_string();
    }
    let mut out = String::new();
    for session in sessions {
        out.push_str(&render_session_line(session));
        out.push('\n');
    }
    out
}

fn render_session_line(session: &SessionSnapshot) -> String {
    let activity = match &session.active_tool {
        Some(tool) => format!("{} ({:.0}s)", tool.display_name, tool.elapsed_seconds),
        None => "idle".to_string(),
    };
    let marker = if session.is_active { ">" } else { "-" };
    format!(
        "{} {:<20} {:<24} ctx {:>5.1}%  [{}] {}",
        marker,
        session.project_name,
        activity,
        session.context_percent,
        session.permission_mode,
        short_id(&session.session_id),
    )
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
