//! Design configuration: tool categories, colors, animation patterns,
//! attention levels, and duration tiers.
//!
//! The config is static lookup data loaded once at startup. All lookups
//! fall back to configured defaults rather than failing, so an unknown
//! tool name can always be rendered; only the initial load is fallible.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Built-in default configuration, compiled into the binary.
const BUILTIN_CONFIG: &str = include_str!("../assets/notch-config.json");

// ============================================================================
// Raw config tables
// ============================================================================

/// Per-category display configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub color: String,
    pub pattern: String,
    #[serde(default = "default_intensity")]
    pub intensity: u8,
    pub attention: String,
    #[serde(default)]
    pub description: String,
}

fn default_intensity() -> u8 {
    2
}

/// Per-tool configuration (category assignment plus display name).
#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    pub category: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Animation pattern parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PatternConfig {
    pub mode: String,
    #[serde(rename = "periodMs", default = "default_period_ms")]
    pub period_ms: u64,
}

fn default_period_ms() -> u64 {
    1200
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            mode: "breathe".to_string(),
            period_ms: default_period_ms(),
        }
    }
}

/// Named color as an RGB triple.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ColorConfig {
    pub rgb: [u8; 3],
}

/// Attention level: opacity range plus pulse flag.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct AttentionConfig {
    pub opacity: [f64; 2],
    pub pulse: bool,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            opacity: [0.55, 0.8],
            pulse: false,
        }
    }
}

/// One tier of the duration evolution ladder.
///
/// `until` is the exclusive upper bound in elapsed seconds; the final
/// tier has no bound.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DurationTier {
    #[serde(default)]
    pub until: Option<f64>,
    #[serde(rename = "speedMult")]
    pub speed_mult: f64,
}

/// Ordered duration tiers: animation slows as a tool runs long.
#[derive(Debug, Clone, Deserialize)]
pub struct DurationEvolution {
    pub normal: DurationTier,
    pub extended: DurationTier,
    pub long: DurationTier,
    pub stuck: DurationTier,
}

/// Synthetic "thinking" state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ThinkingState {
    pub category: String,
    #[serde(rename = "funVerbs", default)]
    pub fun_verbs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct States {
    #[serde(default)]
    pub thinking: Option<ThinkingState>,
}

/// Fallback entries and timing defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDefaults {
    #[serde(rename = "unknownTool")]
    pub unknown_tool: ToolConfig,
    #[serde(rename = "defaultColor")]
    pub default_color: String,
    /// Grace period between tool calls, in seconds.
    #[serde(rename = "gracePeriod", default = "default_grace_period")]
    pub grace_period: f64,
    /// Stale-session timeout, in seconds.
    #[serde(rename = "activityTimeout", default = "default_activity_timeout")]
    pub activity_timeout: u64,
    /// Global idle timeout, in seconds.
    #[serde(rename = "idleTimeout", default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

fn default_grace_period() -> f64 {
    3.0
}

fn default_activity_timeout() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    15
}

// ============================================================================
// Resolved tool info
// ============================================================================

/// Fully resolved display information for a tool, with category-level
/// color/pattern/attention merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub tool_name: String,
    pub display_name: String,
    pub category: String,
    pub color: String,
    pub pattern: String,
    pub intensity: u8,
    pub attention: String,
    pub description: String,
}

// ============================================================================
// NotchConfig
// ============================================================================

/// Immutable design configuration, loaded once per process.
#[derive(Debug, Clone, Deserialize)]
pub struct NotchConfig {
    pub categories: HashMap<String, CategoryConfig>,
    pub tools: HashMap<String, ToolConfig>,
    #[serde(default)]
    pub states: States,
    pub patterns: HashMap<String, PatternConfig>,
    pub colors: HashMap<String, ColorConfig>,
    #[serde(rename = "attention_levels")]
    pub attention_levels: HashMap<String, AttentionConfig>,
    #[serde(rename = "duration_evolution")]
    pub duration_evolution: DurationEvolution,
    pub defaults: ConfigDefaults,
}

impl NotchConfig {
    /// Loads configuration from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Parses the built-in configuration compiled into the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(BUILTIN_CONFIG)?)
    }

    /// Resolves display info for a tool, merging in its category config.
    ///
    /// Lookup is case-insensitive. Unknown tools use the configured
    /// `unknownTool` entry, so this never fails.
    pub fn tool_info(&self, tool_name: &str) -> ToolInfo {
        let key = tool_name.to_lowercase();
        let tool = match self.tools.get(&key) {
            Some(tool) => tool,
            None => {
                tracing::debug!(tool = tool_name, "unknown tool, using default entry");
                &self.defaults.unknown_tool
            }
        };

        let category_name = tool.category.as_str();
        let category = self.categories.get(category_name);

        ToolInfo {
            tool_name: tool_name.to_string(),
            display_name: tool
                .display_name
                .clone()
                .unwrap_or_else(|| title_case(tool_name)),
            category: category_name.to_string(),
            color: category
                .map(|c| c.color.clone())
                .unwrap_or_else(|| self.defaults.default_color.clone()),
            pattern: category
                .map(|c| c.pattern.clone())
                .unwrap_or_else(|| "cogitate".to_string()),
            intensity: category.map(|c| c.intensity).unwrap_or(2),
            attention: category
                .map(|c| c.attention.clone())
                .unwrap_or_else(|| "ambient".to_string()),
            description: category.map(|c| c.description.clone()).unwrap_or_default(),
        }
    }

    /// Returns the RGB triple for a color name, falling back to the
    /// default color for unknown names.
    pub fn color_rgb(&self, color_name: &str) -> (u8, u8, u8) {
        let color = self
            .colors
            .get(color_name)
            .or_else(|| self.colors.get(&self.defaults.default_color));
        match color {
            Some(c) => (c.rgb[0], c.rgb[1], c.rgb[2]),
            None => (249, 115, 22),
        }
    }

    /// Returns the pattern config for a name, falling back to `cogitate`.
    pub fn pattern(&self, pattern_name: &str) -> PatternConfig {
        self.patterns
            .get(pattern_name)
            .or_else(|| self.patterns.get("cogitate"))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the attention config for a level, falling back to `ambient`.
    pub fn attention(&self, level: &str) -> AttentionConfig {
        self.attention_levels
            .get(level)
            .or_else(|| self.attention_levels.get("ambient"))
            .copied()
            .unwrap_or_default()
    }

    /// Returns `(tier_name, speed_multiplier)` for an elapsed duration.
    ///
    /// Walks the ascending tiers; the first tier whose `until` bound has
    /// not been reached wins. Past the last bound the final ("stuck")
    /// tier applies.
    pub fn duration_tier(&self, elapsed_seconds: f64) -> (&'static str, f64) {
        let evolution = &self.duration_evolution;
        let ladder = [
            ("normal", &evolution.normal),
            ("extended", &evolution.extended),
            ("long", &evolution.long),
            ("stuck", &evolution.stuck),
        ];
        for (name, tier) in ladder {
            match tier.until {
                Some(until) if elapsed_seconds >= until => continue,
                _ => return (name, tier.speed_mult),
            }
        }
        ("stuck", evolution.stuck.speed_mult)
    }

    /// Grace period between tool calls.
    pub fn grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.defaults.grace_period.max(0.0))
    }

    /// Default stale-session timeout in seconds.
    pub fn activity_timeout(&self) -> u64 {
        self.defaults.activity_timeout
    }

    /// Default global idle timeout in seconds.
    pub fn idle_timeout(&self) -> u64 {
        self.defaults.idle_timeout
    }

    /// Category name used for the synthetic thinking state.
    pub fn thinking_category(&self) -> &str {
        self.states
            .thinking
            .as_ref()
            .map(|t| t.category.as_str())
            .unwrap_or("think")
    }

    /// Resolved display info for the synthetic thinking placeholder,
    /// assembled from the thinking state's category.
    pub fn thinking_info(&self) -> ToolInfo {
        let category_name = self.thinking_category().to_string();
        let category = self.categories.get(&category_name);
        ToolInfo {
            tool_name: crate::session::THINKING_TOOL.to_string(),
            display_name: "Thinking".to_string(),
            category: category_name,
            color: category
                .map(|c| c.color.clone())
                .unwrap_or_else(|| self.defaults.default_color.clone()),
            pattern: category
                .map(|c| c.pattern.clone())
                .unwrap_or_else(|| "cogitate".to_string()),
            intensity: category.map(|c| c.intensity).unwrap_or(2),
            attention: category
                .map(|c| c.attention.clone())
                .unwrap_or_else(|| "ambient".to_string()),
            description: String::new(),
        }
    }

    /// Filler verbs shown during the grace period.
    ///
    /// Never empty: falls back to a single "Thinking" entry.
    pub fn fun_verbs(&self) -> Vec<String> {
        self.states
            .thinking
            .as_ref()
            .map(|t| t.fun_verbs.clone())
            .filter(|verbs| !verbs.is_empty())
            .unwrap_or_else(|| vec!["Thinking".to_string()])
    }
}

/// Uppercases the first character, lowercases the rest.
fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
