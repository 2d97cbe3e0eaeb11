//! Notch Daemon - session state machine and hook-event ingress
//!
//! This crate provides the daemon's building blocks:
//! - `registry` - the session state machine actor (the core of the system)
//! - `server` - HTTP ingress for hook events plus status queries
//! - `transcript` - throttled background token-usage reads
//! - `stats` - persistent usage statistics
//! - `settings` - user settings with typed getters
//! - `focus` - best-effort terminal window resolution
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        notchd                            │
//! │                                                          │
//! │  ┌──────────────┐  mpsc   ┌───────────────────────────┐  │
//! │  │ axum ingress │────────▶│       RegistryActor       │  │
//! │  │ /hook /pin.. │         │ (sessions, grace timer,   │  │
//! │  └──────────────┘         │  pruning, idle, errors)   │  │
//! │                           └─────────────┬─────────────┘  │
//! │  ┌──────────────┐  mpsc                 │ broadcast      │
//! │  │  transcript  │───────────────────────┤                │
//! │  │ reader tasks │                       ▼                │
//! │  └──────────────┘              StateEvent subscribers    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All session mutation happens on the actor's task; ingress handlers
//! and background reads only ever enqueue commands.

pub mod focus;
pub mod registry;
pub mod server;
pub mod settings;
pub mod stats;
pub mod transcript;
