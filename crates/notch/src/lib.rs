//! Notch CLI - client library for the notchd daemon.
//!
//! Provides the blocking HTTP client and plain-text rendering used by
//! the `notch` binary.

pub mod client;
pub mod output;

pub use client::{ClientError, NotchClient};
