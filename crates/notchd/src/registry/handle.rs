//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` is a cheap-to-clone handle for sending events to
//! the registry actor, querying snapshots, and subscribing to state
//! events. Ingress adapters and presentation consumers only ever see
//! this handle, never the actor itself.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use notch_protocol::{IngressEvent, SessionSnapshot, StatusSnapshot};

use super::commands::{RegistryCommand, RegistryError, StateEvent};

/// Handle for interacting with the registry actor.
///
/// All mutation goes through [`RegistryHandle::send_event`]; queries use
/// oneshot request/response channels and never observe a half-applied
/// event, because the actor processes one command at a time.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    events: broadcast::Sender<StateEvent>,
}

impl RegistryHandle {
    /// Creates a new registry handle.
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        events: broadcast::Sender<StateEvent>,
    ) -> Self {
        Self { sender, events }
    }

    /// Delivers an ingress event to the actor.
    ///
    /// This is the marshalling point between ingress threads and the
    /// core's single-consumer loop: the event is queued and applied in
    /// arrival order.
    pub async fn send_event(&self, event: IngressEvent) -> Result<(), RegistryError> {
        self.sender
            .send(RegistryCommand::Event(event))
            .await
            .map_err(|_| RegistryError::ChannelClosed)
    }

    /// Returns the full status snapshot.
    pub async fn status(&self) -> Result<StatusSnapshot, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryCommand::GetStatus { respond_to: tx })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Returns the sessions worth displaying, newest activity first.
    ///
    /// Returns an empty list if the actor has shut down.
    pub async fn display_sessions(&self) -> Vec<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RegistryCommand::GetDisplaySessions { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Triggers a stale-session sweep outside the periodic timer.
    ///
    /// Fire-and-forget: send errors are ignored (the actor may be
    /// shutting down).
    pub async fn cleanup_stale(&self) {
        let _ = self.sender.send(RegistryCommand::CleanupStale).await;
    }

    /// Subscribes to state events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Returns `true` if the actor's command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
