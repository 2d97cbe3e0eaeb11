//! User settings.
//!
//! Settings live in a small JSON file under the platform config dir,
//! separate from the design config. Loading is lenient: a missing file
//! or an out-of-range value falls back to the validated default, so the
//! daemon always starts with a sane configuration.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// Default HTTP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 27182;

const DEFAULT_IDLE_TIMEOUT: u64 = 15;
const DEFAULT_ACTIVITY_TIMEOUT: u64 = 60;

const IDLE_TIMEOUT_RANGE: (u64, u64) = (5, 120);
const ACTIVITY_TIMEOUT_RANGE: (u64, u64) = (10, 300);
const PORT_RANGE: (u64, u64) = (1024, 65535);

/// Raw settings file shape; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    idle_timeout: Option<Value>,
    #[serde(default)]
    activity_timeout: Option<Value>,
    #[serde(default)]
    server_port: Option<Value>,
    #[serde(default)]
    click_to_focus: Option<Value>,
}

/// Validated user settings with typed getters.
#[derive(Debug, Clone)]
pub struct UserSettings {
    idle_timeout: u64,
    activity_timeout: u64,
    server_port: u16,
    click_to_focus: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            activity_timeout: DEFAULT_ACTIVITY_TIMEOUT,
            server_port: DEFAULT_PORT,
            click_to_focus: false,
        }
    }
}

impl UserSettings {
    /// Loads settings from the default platform location.
    pub fn load() -> Self {
        Self::load_from(default_settings_path())
    }

    /// Loads settings from an explicit path, falling back to defaults
    /// for anything missing or invalid.
    pub fn load_from(path: PathBuf) -> Self {
        let mut settings = Self::default();

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                info!(path = %path.display(), "no settings file, using defaults");
                return settings;
            }
        };
        let parsed: RawSettings = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse settings, using defaults");
                return settings;
            }
        };

        settings.idle_timeout = validated_u64(
            "idle_timeout",
            parsed.idle_timeout,
            IDLE_TIMEOUT_RANGE,
            DEFAULT_IDLE_TIMEOUT,
        );
        settings.activity_timeout = validated_u64(
            "activity_timeout",
            parsed.activity_timeout,
            ACTIVITY_TIMEOUT_RANGE,
            DEFAULT_ACTIVITY_TIMEOUT,
        );
        settings.server_port =
            validated_u64("server_port", parsed.server_port, PORT_RANGE, DEFAULT_PORT as u64)
                as u16;
        settings.click_to_focus = match parsed.click_to_focus {
            Some(Value::Bool(b)) => b,
            Some(other) => {
                warn!(value = %other, "invalid click_to_focus, using default");
                false
            }
            None => false,
        };

        settings
    }

    /// Seconds of global inactivity before the overlay auto-hides.
    pub fn idle_timeout(&self) -> u64 {
        self.idle_timeout
    }

    /// Seconds of per-session inactivity before pruning eligibility.
    pub fn activity_timeout(&self) -> u64 {
        self.activity_timeout
    }

    /// HTTP port the hook server binds.
    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Whether to resolve terminal windows for click-to-focus.
    pub fn click_to_focus(&self) -> bool {
        self.click_to_focus
    }
}

fn validated_u64(key: &str, value: Option<Value>, range: (u64, u64), default: u64) -> u64 {
    match value {
        Some(value) => match value.as_u64() {
            Some(n) if (range.0..=range.1).contains(&n) => n,
            _ => {
                warn!(key, value = %value, "invalid setting, using default {default}");
                default
            }
        },
        None => default,
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notch")
        .join("settings.json")
}
