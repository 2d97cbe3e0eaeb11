//! Session registry using the actor pattern.
//!
//! The registry is the central state machine for all tracked sessions.
//! It receives ingress events via a bounded mpsc channel, applies them
//! sequentially on one task, and publishes `StateEvent`s via broadcast:
//!
//! ```text
//! HTTP ingress ──RegistryCommand──▶ RegistryActor ──StateEvent──▶ subscribers
//!  (own task)      (mpsc, ordered)   (single task,    (broadcast)   (CLI, UI)
//!                                     owns sessions)
//! ```
//!
//! The grace-period timer and the stale-session sweep run inside the
//! actor's own select loop; the only background work is the transcript
//! read, whose result re-enters the actor as a command.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::{RegistryActor, CLEANUP_INTERVAL, CONTEXT_WINDOW_SIZE, TOKEN_READ_COOLDOWN};
pub use commands::{RegistryCommand, RegistryError, StateEvent};
pub use handle::RegistryHandle;

use crate::settings::UserSettings;
use crate::stats::UsageStats;
use notch_core::NotchConfig;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawns the registry actor and returns a handle for interaction.
pub fn spawn_registry(
    config: Arc<NotchConfig>,
    settings: Arc<UserSettings>,
    stats: UsageStats,
) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(
        cmd_rx,
        cmd_tx.clone(),
        event_tx.clone(),
        config,
        settings,
        stats,
    );
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
