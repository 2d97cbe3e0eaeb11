//! Registry actor - owns all session state and applies hook events.
//!
//! The RegistryActor is the single owner of session state in the system.
//! It receives commands via an mpsc channel, applies them sequentially on
//! one task, and publishes `StateEvent`s via broadcast. Because every
//! mutation happens inline on this task, the actor needs no locks, and an
//! event is always fully applied before the next one is dequeued.
//!
//! Two timers live inside the actor's select loop rather than on separate
//! tasks: the single-flight grace-period timer (rearmed in place whenever
//! a grace period starts, disarmed when a real tool preempts it) and the
//! periodic stale-session sweep.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are logged but don't panic

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use notch_core::{ActiveTool, HookEventType, NotchConfig, Session, SessionId, TokenStats};
use notch_protocol::{HookPayload, IngressEvent, PinPayload, SessionSnapshot, StatusSnapshot};

use super::commands::{RegistryCommand, StateEvent};
use crate::settings::UserSettings;
use crate::stats::UsageStats;
use crate::{focus, transcript};

/// Assumed context window size in tokens.
pub const CONTEXT_WINDOW_SIZE: u64 = 200_000;

/// Minimum time between transcript reads for one session.
pub const TOKEN_READ_COOLDOWN: Duration = Duration::from_secs(5);

/// How often the stale-session sweep runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Tool that always means the user is being asked something.
const ATTENTION_TOOL: &str = "AskUserQuestion";

/// Substrings in stderr that indicate a failed Bash command. Checked
/// only when no non-zero exit code settles the question first. Stdout
/// is never scanned: normal output routinely contains the word "error"
/// (grep results, test summaries) and would flood false positives.
const STDERR_ERROR_MARKERS: &[&str] = &[
    "command not found",
    "No such file or directory",
    "Permission denied",
    "Traceback (most recent call last)",
];

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all session state.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Sender clone handed to background transcript reads so their
    /// results re-enter the actor as `ApplyTokenUsage` commands
    sender: mpsc::Sender<RegistryCommand>,

    /// Event publisher for presentation subscribers
    events: broadcast::Sender<StateEvent>,

    /// Design configuration (immutable lookup tables)
    config: Arc<NotchConfig>,

    /// User settings (timeouts, click-to-focus)
    settings: Arc<UserSettings>,

    /// Persistent usage statistics
    stats: UsageStats,

    /// All tracked sessions, keyed by session id
    sessions: HashMap<SessionId, Session>,

    /// Project paths exempt from stale pruning
    pinned_paths: HashSet<String>,

    /// Last hook activity across all sessions, for idle detection
    last_activity_time: chrono::DateTime<Utc>,

    /// Filler verbs for the grace-period display text
    fun_verbs: Vec<String>,

    /// Grace period duration
    grace_period: Duration,

    /// Session the single-flight grace timer currently targets
    grace_target: Option<SessionId>,

    /// When the grace timer fires; `None` while disarmed
    grace_deadline: Option<Instant>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        sender: mpsc::Sender<RegistryCommand>,
        events: broadcast::Sender<StateEvent>,
        config: Arc<NotchConfig>,
        settings: Arc<UserSettings>,
        stats: UsageStats,
    ) -> Self {
        let fun_verbs = config.fun_verbs();
        let grace_period = config.grace_period();
        Self {
            receiver,
            sender,
            events,
            config,
            settings,
            stats,
            sessions: HashMap::new(),
            pinned_paths: HashSet::new(),
            last_activity_time: Utc::now(),
            fun_verbs,
            grace_period,
            grace_target: None,
            grace_deadline: None,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// The grace timer and the cleanup interval are multiplexed into the
    /// same loop so all state mutation stays on this one task.
    pub async fn run(mut self) {
        info!("registry actor starting");

        let mut cleanup = interval(CLEANUP_INTERVAL);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let grace = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(grace);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        self.handle_command(cmd);
                        if let Some(deadline) = self.grace_deadline {
                            grace.as_mut().reset(deadline);
                        }
                    }
                    None => break,
                },
                () = grace.as_mut(), if self.grace_deadline.is_some() => {
                    self.grace_deadline = None;
                    self.on_grace_expired();
                }
                _ = cleanup.tick() => {
                    self.cleanup_stale_sessions();
                }
            }
        }

        info!(sessions = self.sessions.len(), "registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Event(event) => self.handle_event(event),
            RegistryCommand::GetStatus { respond_to } => {
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(self.status_snapshot());
            }
            RegistryCommand::GetDisplaySessions { respond_to } => {
                let _ = respond_to.send(self.display_sessions());
            }
            RegistryCommand::CleanupStale => self.cleanup_stale_sessions(),
            RegistryCommand::ApplyTokenUsage { session_id, stats } => {
                self.apply_token_usage(&session_id, stats);
            }
        }
    }

    // ========================================================================
    // Event Entry Point
    // ========================================================================

    /// Applies one ingress event. The single mutation entry point.
    fn handle_event(&mut self, event: IngressEvent) {
        match event {
            IngressEvent::Hook(payload) => self.handle_hook(*payload),
            IngressEvent::Pin(payload) => self.handle_pin(payload),
            IngressEvent::Unpin => self.handle_unpin(),
        }
    }

    /// Handles a lifecycle hook event.
    fn handle_hook(&mut self, payload: HookPayload) {
        let Some(event) = payload.event() else {
            debug!(event = %payload.event_type, "ignoring unrecognized hook event");
            return;
        };
        let session_id = payload.session();

        debug!(
            event = %event,
            session = %session_id,
            tool = %payload.tool_name,
            "hook event"
        );

        self.last_activity_time = Utc::now();

        self.get_or_create_session(&session_id, &payload.cwd);
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.touch();
            if let Some(mode) = payload.permission_mode.as_deref() {
                if !mode.is_empty() {
                    session.permission_mode = mode.to_string();
                }
            }
        }

        match event {
            HookEventType::PreToolUse => self.on_pre_tool_use(&session_id, &payload),
            HookEventType::PostToolUse => self.on_post_tool_use(&session_id, &payload),
            HookEventType::Stop | HookEventType::SubagentStop => self.on_stop(&session_id),
            HookEventType::SessionStart => self.on_session_start(&session_id, &payload),
            HookEventType::SessionEnd => self.on_session_end(&session_id),
            HookEventType::Notification => self.on_notification(&session_id, &payload),
            HookEventType::UserPromptSubmit => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.is_active = true;
                }
            }
        }

        self.maybe_read_transcript(&session_id, &payload);

        self.publish(StateEvent::SessionUpdated {
            session_id: session_id.clone(),
        });
        self.publish(StateEvent::ActivityChanged);
    }

    // ========================================================================
    // Per-Event Handlers
    // ========================================================================

    /// PreToolUse: a real tool is starting.
    fn on_pre_tool_use(&mut self, session_id: &SessionId, payload: &HookPayload) {
        // Real tool preempts any pending grace transition, for any session
        self.cancel_grace();

        let tool_name = if payload.tool_name.is_empty() {
            "unknown"
        } else {
            payload.tool_name.as_str()
        };

        if tool_name == ATTENTION_TOOL {
            self.publish(StateEvent::AttentionNeeded {
                session_id: session_id.clone(),
            });
        }

        let info = self.config.tool_info(tool_name);
        let tool = ActiveTool::from_info(&info);

        if let Some(session) = self.sessions.get_mut(session_id) {
            session.active_tool = Some(tool.clone());
            session.push_recent_tool(tool);
            session.is_active = true;
        }

        self.publish(StateEvent::ToolStarted {
            session_id: session_id.clone(),
            tool_name: tool_name.to_string(),
        });
    }

    /// PostToolUse: the tool finished; record it and enter the grace state.
    fn on_post_tool_use(&mut self, session_id: &SessionId, payload: &HookPayload) {
        let outgoing = self
            .sessions
            .get(session_id)
            .and_then(|s| s.active_tool.clone());

        if let Some(tool) = &outgoing {
            self.publish(StateEvent::ToolEnded {
                session_id: session_id.clone(),
                tool_name: tool.tool_name.clone(),
            });
        }

        if payload.tool_name == "Bash" {
            if let Some(result) = &payload.tool_result {
                if bash_error_detected(result) {
                    self.publish(StateEvent::ErrorDetected {
                        session_id: session_id.clone(),
                        tool_name: "Bash".to_string(),
                    });
                }
            }
        }

        // The synthetic thinking placeholder never counts as tool usage
        if let Some(tool) = &outgoing {
            if !tool.is_thinking() {
                self.stats
                    .record_tool_use(&tool.tool_name, &tool.category, tool.elapsed_seconds());
            }
        }

        self.start_grace(session_id);
    }

    /// Stop / SubagentStop: the turn ended.
    fn on_stop(&mut self, session_id: &SessionId) {
        let outgoing = self
            .sessions
            .get(session_id)
            .and_then(|s| s.active_tool.clone());

        if let Some(tool) = &outgoing {
            self.publish(StateEvent::ToolEnded {
                session_id: session_id.clone(),
                tool_name: tool.tool_name.clone(),
            });
        }

        self.start_grace(session_id);

        if let Some(session) = self.sessions.get_mut(session_id) {
            session.is_active = false;
        }
    }

    /// SessionStart: reset the clock and optionally resolve the terminal.
    fn on_session_start(&mut self, session_id: &SessionId, payload: &HookPayload) {
        let window = if self.settings.click_to_focus() {
            payload.pid.and_then(focus::find_window_for_pid)
        } else {
            None
        };

        if let Some(session) = self.sessions.get_mut(session_id) {
            session.start_time = Utc::now();
            session.is_active = true;
            if window.is_some() {
                session.terminal_window = window;
            }
        }
    }

    /// SessionEnd: mark inactive; the pruning sweep removes it later.
    fn on_session_end(&mut self, session_id: &SessionId) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.is_active = false;
        }
        self.publish(StateEvent::SessionEnded {
            session_id: session_id.clone(),
        });
        self.stats.increment_session_count();
    }

    /// Notification: forward the message if there is one.
    fn on_notification(&mut self, session_id: &SessionId, payload: &HookPayload) {
        if let Some(message) = payload.notification_message() {
            self.publish(StateEvent::NotificationReceived {
                session_id: session_id.clone(),
                message,
            });
        }
    }

    // ========================================================================
    // Pin / Unpin
    // ========================================================================

    fn handle_pin(&mut self, payload: PinPayload) {
        if payload.cwd.is_empty() {
            return;
        }
        info!(path = %payload.cwd, "pinned project");
        self.pinned_paths.insert(payload.cwd);
        self.publish(StateEvent::ActivityChanged);
    }

    fn handle_unpin(&mut self) {
        info!("unpinned all projects");
        self.pinned_paths.clear();
        self.publish(StateEvent::ActivityChanged);
    }

    // ========================================================================
    // Grace Period ("Thinking" State)
    // ========================================================================

    /// Puts the session into the synthetic thinking state and (re)arms
    /// the shared grace timer at it.
    ///
    /// Only one grace transition is in flight system-wide: arming for a
    /// new session retargets the single timer.
    fn start_grace(&mut self, session_id: &SessionId) {
        let verb = self
            .fun_verbs
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Thinking".to_string());

        let info = self.config.thinking_info();
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.active_tool = Some(ActiveTool::thinking(&verb, &info));
        }

        self.grace_target = Some(session_id.clone());
        self.grace_deadline = Some(Instant::now() + self.grace_period);
    }

    /// Disarms the grace timer without touching session state.
    fn cancel_grace(&mut self) {
        self.grace_target = None;
        self.grace_deadline = None;
    }

    /// Grace timer fired: clear the thinking placeholder if it is still
    /// showing.
    ///
    /// A real tool event may have raced ahead of the timer, in which
    /// case the session no longer holds the placeholder and this no-ops.
    pub(crate) fn on_grace_expired(&mut self) {
        let Some(session_id) = self.grace_target.take() else {
            return;
        };
        self.grace_deadline = None;

        let cleared = match self.sessions.get_mut(&session_id) {
            Some(session)
                if session
                    .active_tool
                    .as_ref()
                    .is_some_and(ActiveTool::is_thinking) =>
            {
                session.active_tool = None;
                true
            }
            _ => false,
        };

        if cleared {
            self.publish(StateEvent::SessionUpdated {
                session_id: session_id.clone(),
            });
            self.publish(StateEvent::ActivityChanged);
        }
    }

    // ========================================================================
    // Token / Context Update
    // ========================================================================

    /// Kicks off a throttled background transcript read for this session.
    fn maybe_read_transcript(&mut self, session_id: &SessionId, payload: &HookPayload) {
        let Some(source) = payload.transcript_source() else {
            return;
        };
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };

        let now = Utc::now();
        if let Some(last) = session.last_token_read {
            let cooldown = chrono::Duration::from_std(TOKEN_READ_COOLDOWN)
                .unwrap_or_else(|_| chrono::Duration::seconds(5));
            if now.signed_duration_since(last) < cooldown {
                return;
            }
        }
        session.last_token_read = Some(now);

        transcript::spawn_usage_read(source, session_id.clone(), self.sender.clone());
    }

    /// Applies a token usage snapshot marshalled back from a transcript
    /// read. Latest snapshot wins; values are never accumulated.
    fn apply_token_usage(&mut self, session_id: &SessionId, stats: TokenStats) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            // Session pruned while the read was in flight
            return;
        };

        session.token_stats = stats;
        session.context_tokens = stats.total_tokens();
        session.context_percent =
            (session.context_tokens as f64 / CONTEXT_WINDOW_SIZE as f64 * 100.0).min(100.0);

        debug!(
            session = %session_id,
            context_tokens = session.context_tokens,
            context_percent = session.context_percent,
            "token usage updated"
        );

        self.publish(StateEvent::SessionUpdated {
            session_id: session_id.clone(),
        });
    }

    // ========================================================================
    // Pruning, Queries
    // ========================================================================

    /// Removes sessions that are stale, inactive, idle, and not pinned.
    pub(crate) fn cleanup_stale_sessions(&mut self) {
        let timeout = self.settings.activity_timeout();

        let to_remove: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| {
                s.is_stale_at(timeout)
                    && !s.is_active
                    && s.active_tool.is_none()
                    && !self.pinned_paths.contains(&s.project_path)
            })
            .map(|s| s.session_id.clone())
            .collect();

        for session_id in to_remove {
            debug!(session = %session_id, "removing stale session");
            self.sessions.remove(&session_id);
        }
    }

    /// Sessions worth displaying: active, running a tool, or pinned,
    /// excluding stale ones; sorted by last activity descending.
    fn display_sessions(&self) -> Vec<SessionSnapshot> {
        let timeout = self.settings.activity_timeout();

        let mut display: Vec<&Session> = self
            .sessions
            .values()
            .filter(|s| {
                (s.is_active
                    || s.active_tool.is_some()
                    || self.pinned_paths.contains(&s.project_path))
                    && !s.is_stale_at(timeout)
            })
            .collect();
        display.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        display.into_iter().map(SessionSnapshot::from_session).collect()
    }

    /// Full serializable status snapshot for the `/status` endpoint.
    fn status_snapshot(&self) -> StatusSnapshot {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        StatusSnapshot {
            status: "running".to_string(),
            is_idle: self.is_idle(),
            session_count: sessions.len(),
            sessions: sessions
                .into_iter()
                .map(SessionSnapshot::from_session)
                .collect(),
        }
    }

    /// True when no hook event has arrived for the idle timeout.
    fn is_idle(&self) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_activity_time);
        idle.num_seconds() > self.settings.idle_timeout() as i64
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn get_or_create_session(&mut self, session_id: &SessionId, cwd: &str) {
        if self.sessions.contains_key(session_id) {
            return;
        }
        let session = Session::new(session_id.clone(), cwd);
        info!(
            session = %session_id,
            project = %session.project_name,
            total = self.sessions.len() + 1,
            "session created"
        );
        self.sessions.insert(session_id.clone(), session);
    }

    fn publish(&self, event: StateEvent) {
        // Ignore lagging/absent subscribers
        if let Err(err) = self.events.send(event) {
            debug!(error = %err, "no event subscribers");
        }
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    #[cfg(test)]
    fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(&SessionId::new(id))
    }
}

// ============================================================================
// Bash Error Heuristic
// ============================================================================

/// Decides whether a Bash tool result looks like a failure.
///
/// Priority order, short-circuiting:
/// 1. Structured object with a non-zero numeric `exitCode` - error.
/// 2. Exit code zero or absent - scan stderr for known failure markers.
/// 3. Unstructured string results carry no exit code; no heuristic is
///    applied at all (free-form output is too noisy to scan safely).
fn bash_error_detected(result: &Value) -> bool {
    let Value::Object(map) = result else {
        return false;
    };

    if let Some(code) = map.get("exitCode").and_then(Value::as_i64) {
        if code != 0 {
            return true;
        }
    }

    match map.get("stderr").and_then(Value::as_str) {
        Some(stderr) => STDERR_ERROR_MARKERS
            .iter()
            .any(|marker| stderr.contains(marker)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notch_core::THINKING_TOOL;
    use serde_json::json;

    fn test_stats() -> (UsageStats, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let stats = UsageStats::with_path(dir.path().join("session_stats.json"));
        (stats, dir)
    }

    fn create_actor() -> (RegistryActor, broadcast::Receiver<StateEvent>, tempfile::TempDir) {
        let (tx, rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(64);
        let config = Arc::new(NotchConfig::builtin().expect("builtin config"));
        let settings = Arc::new(UserSettings::default());
        let (stats, dir) = test_stats();
        let actor = RegistryActor::new(rx, tx, event_tx, config, settings, stats);
        (actor, event_rx, dir)
    }

    fn hook(fields: Value) -> IngressEvent {
        let payload: HookPayload = serde_json::from_value(fields).expect("payload parses");
        IngressEvent::Hook(Box::new(payload))
    }

    fn drain(rx: &mut broadcast::Receiver<StateEvent>) -> Vec<StateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_pre_tool_use_creates_session_with_tool() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse",
            "sessionId": "s1",
            "cwd": "/test/project",
            "tool": "Read"
        })));

        let session = actor.session("s1").expect("session created");
        let tool = session.active_tool.as_ref().expect("tool active");
        assert_eq!(tool.tool_name, "Read");
        assert_eq!(tool.category, "read");
        assert!(!tool.attention.is_empty());
        assert_eq!(session.project_name, "project");
        assert!(session.is_active);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            StateEvent::ToolStarted { tool_name, .. } if tool_name == "Read"
        )));
        assert!(events.iter().any(|e| matches!(e, StateEvent::SessionUpdated { .. })));
        assert!(events.contains(&StateEvent::ActivityChanged));
    }

    #[tokio::test]
    async fn test_post_tool_use_enters_grace_with_fun_verb() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        drain(&mut rx);
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        let session = actor.session("s1").expect("session");
        let tool = session.active_tool.as_ref().expect("thinking placeholder");
        assert_eq!(tool.tool_name, THINKING_TOOL);
        assert!(actor.fun_verbs.contains(&tool.display_name));
        assert!(actor.grace_deadline.is_some());
        assert_eq!(actor.grace_target.as_ref().map(|s| s.as_str()), Some("s1"));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            StateEvent::ToolEnded { tool_name, .. } if tool_name == "Read"
        )));
    }

    #[tokio::test]
    async fn test_replayed_post_tool_use_without_active_tool() {
        let (mut actor, mut rx, _dir) = create_actor();

        // PostToolUse for a session that never saw PreToolUse: must not
        // panic, must not emit ToolEnded, and must still arm the grace
        // timer.
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash"
        })));

        assert!(actor.grace_deadline.is_some());
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, StateEvent::ToolEnded { .. })));
    }

    #[tokio::test]
    async fn test_pre_tool_use_cancels_grace() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        assert!(actor.grace_deadline.is_some());

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash"
        })));
        assert!(actor.grace_deadline.is_none());
        assert!(actor.grace_target.is_none());

        let session = actor.session("s1").expect("session");
        assert_eq!(
            session.active_tool.as_ref().map(|t| t.tool_name.as_str()),
            Some("Bash")
        );
    }

    #[tokio::test]
    async fn test_grace_expiry_clears_thinking() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        drain(&mut rx);

        actor.on_grace_expired();

        let session = actor.session("s1").expect("session");
        assert!(session.active_tool.is_none());
        assert!(actor.grace_target.is_none());

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, StateEvent::SessionUpdated { .. })));
    }

    #[tokio::test]
    async fn test_late_grace_expiry_is_noop_after_real_tool() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        // Simulate a late firing: a real tool raced ahead of the timer.
        // The session no longer holds the placeholder, so the expiry
        // must leave it alone.
        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash"
        })));
        actor.grace_target = Some(SessionId::new("s1"));
        drain(&mut rx);

        actor.on_grace_expired();

        let session = actor.session("s1").expect("session");
        assert_eq!(
            session.active_tool.as_ref().map(|t| t.tool_name.as_str()),
            Some("Bash")
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_grace_retargets_to_latest_session() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/a", "tool": "Read"
        })));
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s2", "cwd": "/b", "tool": "Bash"
        })));

        assert_eq!(actor.grace_target.as_ref().map(|s| s.as_str()), Some("s2"));

        // Only s2 is cleared on expiry; s1 keeps its placeholder until
        // some later transition.
        actor.on_grace_expired();
        assert!(actor.session("s2").expect("s2").active_tool.is_none());
        assert!(actor.session("s1").expect("s1").active_tool.is_some());
    }

    #[tokio::test]
    async fn test_stop_marks_inactive_and_enters_grace() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        actor.handle_event(hook(json!({
            "eventType": "Stop", "sessionId": "s1", "cwd": "/t"
        })));

        let session = actor.session("s1").expect("session");
        assert!(!session.is_active);
        assert!(session
            .active_tool
            .as_ref()
            .is_some_and(ActiveTool::is_thinking));
    }

    #[tokio::test]
    async fn test_subagent_stop_behaves_like_stop() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "SubagentStop", "sessionId": "s1", "cwd": "/t"
        })));

        let session = actor.session("s1").expect("session");
        assert!(!session.is_active);
        assert!(actor.grace_deadline.is_some());
    }

    #[tokio::test]
    async fn test_session_end_keeps_session_until_pruned() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "SessionStart", "sessionId": "s1", "cwd": "/t"
        })));
        drain(&mut rx);
        actor.handle_event(hook(json!({
            "eventType": "SessionEnd", "sessionId": "s1", "cwd": "/t"
        })));

        let session = actor.session("s1").expect("still present");
        assert!(!session.is_active);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, StateEvent::SessionEnded { .. })));
        assert_eq!(actor.stats.snapshot().session_count, 1);
    }

    #[tokio::test]
    async fn test_user_prompt_marks_active() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "Stop", "sessionId": "s1", "cwd": "/t"
        })));
        assert!(!actor.session("s1").expect("session").is_active);

        actor.handle_event(hook(json!({
            "eventType": "UserPromptSubmit", "sessionId": "s1", "cwd": "/t"
        })));
        assert!(actor.session("s1").expect("session").is_active);
    }

    #[tokio::test]
    async fn test_notification_emits_message() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "Notification",
            "sessionId": "s1",
            "cwd": "/t",
            "toolInput": {"message": "Hello"}
        })));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            StateEvent::NotificationReceived { message, .. } if message == "Hello"
        )));
    }

    #[tokio::test]
    async fn test_notification_without_message_is_silent() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "Notification",
            "sessionId": "s1",
            "cwd": "/t",
            "toolInput": {}
        })));

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, StateEvent::NotificationReceived { .. })));
    }

    #[tokio::test]
    async fn test_ask_user_question_needs_attention() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t",
            "tool": "AskUserQuestion"
        })));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, StateEvent::AttentionNeeded { .. })));
    }

    #[tokio::test]
    async fn test_permission_mode_saved() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t",
            "tool": "Read", "permissionMode": "plan"
        })));

        assert_eq!(actor.session("s1").expect("session").permission_mode, "plan");
    }

    #[tokio::test]
    async fn test_unrecognized_event_ignored() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "BrandNewEvent", "sessionId": "s1", "cwd": "/t"
        })));

        assert!(actor.session("s1").is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_recent_tools_capped_at_ten() {
        let (mut actor, _rx, _dir) = create_actor();

        for _ in 0..15 {
            actor.handle_event(hook(json!({
                "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
            })));
            actor.handle_event(hook(json!({
                "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash"
            })));
        }

        let session = actor.session("s1").expect("session");
        assert_eq!(session.recent_tools.len(), 10);
        assert_eq!(session.recent_tools[0].tool_name, "Bash");
    }

    #[tokio::test]
    async fn test_multiple_sessions_tracked_independently() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t/alpha", "tool": "Read"
        })));
        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s2", "cwd": "/t/beta", "tool": "Bash"
        })));

        assert_eq!(actor.sessions.len(), 2);
        assert_eq!(actor.session("s1").expect("s1").project_name, "alpha");
        assert_eq!(actor.session("s2").expect("s2").project_name, "beta");
    }

    // ------------------------------------------------------------------
    // Bash error heuristic
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_bash_nonzero_exit_code_fires_once() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash"
        })));
        drain(&mut rx);
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash",
            "toolOutput": {"exitCode": 1}
        })));

        let errors: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, StateEvent::ErrorDetected { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            StateEvent::ErrorDetected { tool_name, .. } if tool_name == "Bash"
        ));
    }

    #[tokio::test]
    async fn test_bash_zero_exit_ignores_stdout_error_text() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash",
            "toolOutput": {"exitCode": 0, "stdout": "error: this is fine"}
        })));

        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, StateEvent::ErrorDetected { .. })));
    }

    #[tokio::test]
    async fn test_bash_stderr_marker_without_exit_code() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash",
            "toolOutput": {"stderr": "bash: foo: command not found"}
        })));

        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, StateEvent::ErrorDetected { .. })));
    }

    #[tokio::test]
    async fn test_bash_string_result_skips_heuristics() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Bash",
            "toolOutput": "error: something exploded"
        })));

        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, StateEvent::ErrorDetected { .. })));
    }

    #[tokio::test]
    async fn test_non_bash_results_never_checked() {
        let (mut actor, mut rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read",
            "toolOutput": {"exitCode": 1}
        })));

        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, StateEvent::ErrorDetected { .. })));
    }

    #[test]
    fn test_bash_error_heuristic_direct() {
        assert!(bash_error_detected(&json!({"exitCode": 2})));
        assert!(!bash_error_detected(&json!({"exitCode": 0})));
        assert!(!bash_error_detected(&json!({})));
        assert!(bash_error_detected(
            &json!({"exitCode": 0, "stderr": "Permission denied"})
        ));
        assert!(bash_error_detected(
            &json!({"stderr": "Traceback (most recent call last):\n  ..."})
        ));
        assert!(!bash_error_detected(&json!({"stderr": "warning: deprecated"})));
        assert!(!bash_error_detected(&json!("command not found")));
        assert!(!bash_error_detected(&json!(null)));
    }

    // ------------------------------------------------------------------
    // Token usage
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_apply_token_usage_computes_context_percent() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        actor.apply_token_usage(
            &SessionId::new("s1"),
            TokenStats {
                input_tokens: 100_000,
                ..Default::default()
            },
        );

        let session = actor.session("s1").expect("session");
        assert!((session.context_percent - 50.0).abs() < 0.1);
        assert_eq!(session.context_tokens, 100_000);
    }

    #[tokio::test]
    async fn test_apply_token_usage_clamps_at_100() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        actor.apply_token_usage(
            &SessionId::new("s1"),
            TokenStats {
                input_tokens: 300_000,
                ..Default::default()
            },
        );

        let session = actor.session("s1").expect("session");
        assert!((session.context_percent - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_apply_token_usage_overwrites_not_accumulates() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        actor.apply_token_usage(
            &SessionId::new("s1"),
            TokenStats {
                input_tokens: 100,
                output_tokens: 50,
                cache_creation_tokens: 10,
                cache_read_tokens: 20,
            },
        );
        actor.apply_token_usage(
            &SessionId::new("s1"),
            TokenStats {
                input_tokens: 500,
                output_tokens: 150,
                cache_creation_tokens: 100,
                cache_read_tokens: 600,
            },
        );

        let stats = actor.session("s1").expect("session").token_stats;
        assert_eq!(stats.input_tokens, 500);
        assert_eq!(stats.output_tokens, 150);
        assert_eq!(stats.cache_creation_tokens, 100);
        assert_eq!(stats.cache_read_tokens, 600);
    }

    #[tokio::test]
    async fn test_apply_token_usage_for_pruned_session_is_noop() {
        let (mut actor, _rx, _dir) = create_actor();
        actor.apply_token_usage(&SessionId::new("gone"), TokenStats::default());
        assert!(actor.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_transcript_read_throttled() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read",
            "transcriptPath": "/nonexistent/t.jsonl"
        })));
        let first = actor.session("s1").expect("session").last_token_read;
        assert!(first.is_some());

        // Second event inside the cooldown window: timestamp unchanged,
        // no new read dispatched.
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read",
            "transcriptPath": "/nonexistent/t.jsonl"
        })));
        assert_eq!(actor.session("s1").expect("session").last_token_read, first);
    }

    // ------------------------------------------------------------------
    // Pruning and queries
    // ------------------------------------------------------------------

    fn age_session(actor: &mut RegistryActor, id: &str, secs: i64) {
        if let Some(session) = actor.sessions.get_mut(&SessionId::new(id)) {
            session.last_activity = Utc::now() - chrono::Duration::seconds(secs);
        }
    }

    #[tokio::test]
    async fn test_cleanup_removes_stale_inactive_sessions() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        if let Some(session) = actor.sessions.get_mut(&SessionId::new("s1")) {
            session.is_active = false;
            session.active_tool = None;
        }
        age_session(&mut actor, "s1", 9999);

        actor.cleanup_stale_sessions();
        assert!(actor.session("s1").is_none());
    }

    #[tokio::test]
    async fn test_cleanup_spares_active_sessions() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        if let Some(session) = actor.sessions.get_mut(&SessionId::new("s1")) {
            session.active_tool = None;
        }
        age_session(&mut actor, "s1", 9999);

        // Still is_active: not eligible
        actor.cleanup_stale_sessions();
        assert!(actor.session("s1").is_some());
    }

    #[tokio::test]
    async fn test_cleanup_spares_sessions_with_active_tool() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        if let Some(session) = actor.sessions.get_mut(&SessionId::new("s1")) {
            session.is_active = false;
        }
        age_session(&mut actor, "s1", 9999);

        actor.cleanup_stale_sessions();
        assert!(actor.session("s1").is_some());
    }

    #[tokio::test]
    async fn test_pinned_sessions_never_pruned() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t/proj", "tool": "Read"
        })));
        actor.handle_event(IngressEvent::Pin(PinPayload {
            session_id: "s1".to_string(),
            cwd: "/t/proj".to_string(),
            timestamp: None,
        }));
        if let Some(session) = actor.sessions.get_mut(&SessionId::new("s1")) {
            session.is_active = false;
            session.active_tool = None;
        }
        age_session(&mut actor, "s1", 9999);

        actor.cleanup_stale_sessions();
        assert!(actor.session("s1").is_some());
    }

    #[tokio::test]
    async fn test_unpin_clears_all_pins() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(IngressEvent::Pin(PinPayload {
            session_id: String::new(),
            cwd: "/t/proj".to_string(),
            timestamp: None,
        }));
        assert!(!actor.pinned_paths.is_empty());

        actor.handle_event(IngressEvent::Unpin);
        assert!(actor.pinned_paths.is_empty());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        let status = actor.status_snapshot();
        assert_eq!(status.status, "running");
        assert!(!status.is_idle);
        assert_eq!(status.session_count, 1);
        let tool = status.sessions[0].active_tool.as_ref().expect("tool");
        assert_eq!(tool.tool_name, "Read");
    }

    #[tokio::test]
    async fn test_status_snapshot_empty() {
        let (actor, _rx, _dir) = create_actor();
        let status = actor.status_snapshot();
        assert_eq!(status.session_count, 0);
        assert!(status.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_display_sessions_filters_and_sorts() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "old", "cwd": "/t/old", "tool": "Read"
        })));
        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "new", "cwd": "/t/new", "tool": "Read"
        })));
        // An idle session with no tool and no pin never displays
        actor.handle_event(hook(json!({
            "eventType": "SessionEnd", "sessionId": "done", "cwd": "/t/done"
        })));
        if let Some(session) = actor.sessions.get_mut(&SessionId::new("done")) {
            session.active_tool = None;
        }
        age_session(&mut actor, "old", 10);

        let display = actor.display_sessions();
        let ids: Vec<_> = display.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_display_sessions_excludes_stale() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        age_session(&mut actor, "s1", 9999);

        assert!(actor.display_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_idle_flag_follows_global_activity() {
        let (mut actor, _rx, _dir) = create_actor();
        assert!(!actor.is_idle());

        actor.last_activity_time = Utc::now() - chrono::Duration::seconds(9999);
        assert!(actor.is_idle());

        actor.handle_event(hook(json!({
            "eventType": "UserPromptSubmit", "sessionId": "s1", "cwd": "/t"
        })));
        assert!(!actor.is_idle());
    }

    #[tokio::test]
    async fn test_tool_usage_recorded_excludes_thinking() {
        let (mut actor, _rx, _dir) = create_actor();

        actor.handle_event(hook(json!({
            "eventType": "PreToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));
        // Session is now thinking; a replayed PostToolUse must not record
        // the placeholder as a tool use.
        actor.handle_event(hook(json!({
            "eventType": "PostToolUse", "sessionId": "s1", "cwd": "/t", "tool": "Read"
        })));

        let snapshot = actor.stats.snapshot();
        assert_eq!(snapshot.tool_counts.get("Read"), Some(&1));
        assert!(!snapshot.tool_counts.contains_key(THINKING_TOOL));
    }
}
