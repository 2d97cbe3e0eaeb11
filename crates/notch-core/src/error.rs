//! Error types for the core domain.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the design configuration.
///
/// Config load failure is fatal at daemon startup: every lookup the
/// state machine performs depends on these tables.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config JSON could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
