//! HTTP client for the notchd daemon.
//!
//! Thin blocking wrapper over the daemon's local endpoints. Connection
//! failures are folded into one actionable error so every subcommand
//! can tell the user to start the daemon.

use std::time::Duration;

use serde_json::json;
use thiserror::Error;

use notch_protocol::{SessionSnapshot, StatusSnapshot};

/// Errors talking to the daemon.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon is unreachable.
    #[error("could not reach notchd at {url} - is the daemon running?")]
    Unreachable { url: String },

    /// The daemon answered with an unexpected status.
    #[error("daemon returned {status} for {url}")]
    BadStatus { url: String, status: u16 },

    /// The response body did not parse.
    #[error("failed to parse daemon response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Any other transport error.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Blocking client for one daemon instance.
pub struct NotchClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl NotchClient {
    /// Creates a client for a daemon listening on `port` at localhost.
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Checks daemon liveness.
    pub fn health(&self) -> Result<(), ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.get(&url)?;
        expect_ok(&url, response.status().as_u16())
    }

    /// Fetches the full status snapshot.
    pub fn status(&self) -> Result<StatusSnapshot, ClientError> {
        let url = format!("{}/status", self.base_url);
        let response = self.get(&url)?;
        expect_ok(&url, response.status().as_u16())?;
        Ok(serde_json::from_str(&response.text()?)?)
    }

    /// Fetches the sessions worth displaying.
    pub fn sessions(&self) -> Result<Vec<SessionSnapshot>, ClientError> {
        let url = format!("{}/sessions", self.base_url);
        let response = self.get(&url)?;
        expect_ok(&url, response.status().as_u16())?;
        Ok(serde_json::from_str(&response.text()?)?)
    }

    /// Pins a project path so its sessions survive pruning.
    pub fn pin(&self, cwd: &str) -> Result<(), ClientError> {
        let url = format!("{}/pin", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({"cwd": cwd}))
            .send()
            .map_err(|err| self.map_send_error(&url, err))?;
        expect_ok(&url, response.status().as_u16())
    }

    /// Clears all pinned project paths.
    pub fn unpin(&self) -> Result<(), ClientError> {
        let url = format!("{}/unpin", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({}))
            .send()
            .map_err(|err| self.map_send_error(&url, err))?;
        expect_ok(&url, response.status().as_u16())
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ClientError> {
        self.http
            .get(url)
            .send()
            .map_err(|err| self.map_send_error(url, err))
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> ClientError {
        if err.is_connect() || err.is_timeout() {
            ClientError::Unreachable {
                url: url.to_string(),
            }
        } else {
            ClientError::Transport(err)
        }
    }
}

fn expect_ok(url: &str, status: u16) -> Result<(), ClientError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(ClientError::BadStatus {
            url: url.to_string(),
            status,
        })
    }
}
