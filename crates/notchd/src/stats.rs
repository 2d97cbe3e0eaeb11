//! Persistent usage statistics.
//!
//! Tracks how often each tool runs and how long each category spends
//! working, across daemon restarts. The store is a small JSON file under
//! the platform data directory, written atomically (temp file + rename).
//! Load and save failures are logged and never affect session tracking.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Bump when the on-disk layout changes; mismatched files are reset.
const SCHEMA_VERSION: u32 = 1;

/// Stats older than this are discarded wholesale.
const PRUNE_AFTER_DAYS: i64 = 90;

/// On-disk statistics payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsData {
    pub schema_version: u32,
    #[serde(default)]
    pub tool_counts: HashMap<String, u64>,
    #[serde(default)]
    pub category_seconds: HashMap<String, f64>,
    #[serde(default)]
    pub session_count: u64,
    #[serde(default)]
    pub total_tool_uses: u64,
    /// Unix timestamp of the first recorded entry
    #[serde(default)]
    pub first_recorded: Option<i64>,
    /// Unix timestamp of the last update
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl Default for StatsData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tool_counts: HashMap::new(),
            category_seconds: HashMap::new(),
            session_count: 0,
            total_tool_uses: 0,
            first_recorded: None,
            last_updated: None,
        }
    }
}

/// File-backed usage statistics store.
pub struct UsageStats {
    path: PathBuf,
    data: StatsData,
}

impl UsageStats {
    /// Opens the store at the default platform location.
    pub fn open_default() -> Self {
        Self::with_path(default_stats_path())
    }

    /// Opens the store at an explicit path (used by tests).
    pub fn with_path(path: PathBuf) -> Self {
        let mut stats = Self {
            path,
            data: StatsData::default(),
        };
        stats.load();
        stats
    }

    fn load(&mut self) {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let data: StatsData = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "failed to load usage stats");
                return;
            }
        };
        if data.schema_version != SCHEMA_VERSION {
            warn!(
                found = data.schema_version,
                expected = SCHEMA_VERSION,
                "usage stats schema mismatch, resetting"
            );
            return;
        }
        self.data = data;
        self.prune_if_stale();
    }

    fn prune_if_stale(&mut self) {
        let Some(last_updated) = self.data.last_updated else {
            return;
        };
        let age_days = (Utc::now().timestamp() - last_updated) / 86_400;
        if age_days > PRUNE_AFTER_DAYS {
            info!(age_days, "usage stats older than {PRUNE_AFTER_DAYS} days, resetting");
            self.data = StatsData::default();
            self.save();
        }
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                error!(error = %err, "failed to create stats directory");
                return;
            }
        }
        let payload = match serde_json::to_string_pretty(&self.data) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "failed to serialize usage stats");
                return;
            }
        };
        let tmp = self.path.with_extension("tmp");
        if let Err(err) = fs::write(&tmp, payload) {
            error!(error = %err, "failed to write usage stats");
            return;
        }
        if let Err(err) = fs::rename(&tmp, &self.path) {
            error!(error = %err, "failed to replace usage stats file");
            let _ = fs::remove_file(&tmp);
        }
    }

    /// Records one completed tool use.
    pub fn record_tool_use(&mut self, tool_name: &str, category: &str, duration_seconds: f64) {
        let now = Utc::now().timestamp();

        *self.data.tool_counts.entry(tool_name.to_string()).or_insert(0) += 1;
        *self
            .data
            .category_seconds
            .entry(category.to_string())
            .or_insert(0.0) += duration_seconds.max(0.0);
        self.data.total_tool_uses += 1;
        self.data.last_updated = Some(now);
        if self.data.first_recorded.is_none() {
            self.data.first_recorded = Some(now);
        }

        debug!(tool = tool_name, category, duration_seconds, "tool use recorded");
        self.save();
    }

    /// Increments the completed-session counter.
    pub fn increment_session_count(&mut self) {
        let now = Utc::now().timestamp();
        self.data.session_count += 1;
        self.data.last_updated = Some(now);
        if self.data.first_recorded.is_none() {
            self.data.first_recorded = Some(now);
        }
        self.save();
    }

    /// Returns a copy of the current statistics.
    pub fn snapshot(&self) -> StatsData {
        self.data.clone()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn default_stats_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notch")
        .join("session_stats.json")
}
