//! Notch Protocol - wire types shared by the daemon and clients.
//!
//! - `event` - lenient deserialization of inbound hook/pin payloads and
//!   the `IngressEvent` envelope handed to the registry
//! - `status` - serializable snapshots served by the status endpoints

pub mod event;
pub mod status;

pub use event::{
    HookPayload, IngressEvent, PinPayload, TranscriptSource, DEFAULT_SESSION_ID,
};
pub use status::{ActiveToolSnapshot, SessionSnapshot, StatusSnapshot};
