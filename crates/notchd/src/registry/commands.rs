//! Registry actor commands, errors, and published events.
//!
//! Message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: commands sent to the actor over mpsc
//! - `StateEvent`: notifications published to subscribers over broadcast
//! - `RegistryError`: errors surfaced to callers
//!
//! All types are designed for async message passing and follow the
//! panic-free policy.

use thiserror::Error;
use tokio::sync::oneshot;

use notch_core::{SessionId, TokenStats};
use notch_protocol::{IngressEvent, SessionSnapshot, StatusSnapshot};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Mutations flow through `Event`, the sole event-handling entry point;
/// queries carry a oneshot channel for the response.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Apply an ingress event (hook, pin, or unpin) to session state.
    ///
    /// Fire-and-forget: ingress adapters do not wait for the state
    /// transition to complete.
    Event(IngressEvent),

    /// Get the full status snapshot for the `/status` endpoint.
    GetStatus {
        respond_to: oneshot::Sender<StatusSnapshot>,
    },

    /// Get sessions worth displaying (active, running a tool, or pinned),
    /// sorted by last activity descending.
    GetDisplaySessions {
        respond_to: oneshot::Sender<Vec<SessionSnapshot>>,
    },

    /// Trigger a stale-session sweep outside the periodic timer.
    CleanupStale,

    /// Apply token usage read from a transcript in the background.
    ///
    /// Sent by the transcript reader task to marshal its result back
    /// onto the actor's execution context.
    ApplyTokenUsage {
        session_id: SessionId,
        stats: TokenStats,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur when talking to the registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The actor has shut down and its command channel is closed.
    #[error("registry channel closed")]
    ChannelClosed,
}

// ============================================================================
// Published State Events
// ============================================================================

/// Notifications published by the registry to presentation subscribers.
///
/// Broadcast after the originating event has been fully applied, so a
/// subscriber that queries state on receipt observes the new state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// A session's state changed.
    SessionUpdated { session_id: SessionId },

    /// A session ended.
    SessionEnded { session_id: SessionId },

    /// A tool started executing.
    ToolStarted {
        session_id: SessionId,
        tool_name: String,
    },

    /// A tool finished executing.
    ToolEnded {
        session_id: SessionId,
        tool_name: String,
    },

    /// Some activity happened somewhere; cheap hint to re-render.
    ActivityChanged,

    /// The assistant surfaced a notification message.
    NotificationReceived {
        session_id: SessionId,
        message: String,
    },

    /// A tool result looked like a failure.
    ErrorDetected {
        session_id: SessionId,
        tool_name: String,
    },

    /// The session is waiting on the user.
    AttentionNeeded { session_id: SessionId },
}
