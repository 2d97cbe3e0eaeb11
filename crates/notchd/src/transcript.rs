//! Background transcript reads for token usage.
//!
//! Transcripts are newline-delimited JSON. Each assistant record carries
//! a `message.usage` block with *running totals*, so only the last block
//! found is authoritative - values are never summed across records.
//!
//! Reads run off the actor task (file I/O on a blocking thread) and
//! marshal their result back as an `ApplyTokenUsage` command. Missing
//! files, empty files, and malformed lines all degrade to "no update".

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use notch_core::{SessionId, TokenStats};
use notch_protocol::TranscriptSource;

use crate::registry::RegistryCommand;

/// Spawns a background read of `source` and forwards the resulting
/// usage snapshot (if any) back into the registry channel.
pub fn spawn_usage_read(
    source: TranscriptSource,
    session_id: SessionId,
    sender: mpsc::Sender<RegistryCommand>,
) {
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || read_usage(&source)).await;
        let stats = match result {
            Ok(stats) => stats,
            Err(err) => {
                debug!(error = %err, "transcript read task failed");
                None
            }
        };
        if let Some(stats) = stats {
            // Actor gone means shutdown; nothing to apply the update to
            let _ = sender
                .send(RegistryCommand::ApplyTokenUsage { session_id, stats })
                .await;
        }
    });
}

/// Reads the latest usage snapshot from a transcript source.
///
/// Returns `None` when the transcript is unreadable or contains no
/// usage blocks.
pub fn read_usage(source: &TranscriptSource) -> Option<TokenStats> {
    match source {
        TranscriptSource::Path(path) => {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(err) => {
                    debug!(path = %path, error = %err, "transcript not readable");
                    return None;
                }
            };
            scan_last_usage(BufReader::new(file))
        }
        TranscriptSource::Inline(content) => scan_last_usage(Cursor::new(content.as_bytes())),
    }
}

/// Scans JSONL records for assistant usage blocks, keeping the last.
fn scan_last_usage<R: BufRead>(reader: R) -> Option<TokenStats> {
    let mut latest = None;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            // I/O mid-file (truncated write): keep what we have
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            // Malformed line, likely a partial append; skip it
            Err(_) => continue,
        };
        if !is_assistant_record(&record) {
            continue;
        }
        if let Some(usage) = record.pointer("/message/usage") {
            latest = Some(TokenStats {
                input_tokens: count(usage, "input_tokens"),
                output_tokens: count(usage, "output_tokens"),
                cache_creation_tokens: count(usage, "cache_creation_input_tokens"),
                cache_read_tokens: count(usage, "cache_read_input_tokens"),
            });
        }
    }

    latest
}

fn is_assistant_record(record: &Value) -> bool {
    record.get("type").and_then(Value::as_str) == Some("assistant")
        || record.pointer("/message/role").and_then(Value::as_str) == Some("assistant")
}

fn count(usage: &Value, field: &str) -> u64 {
    usage.get(field).and_then(Value::as_u64).unwrap_or(0)
}
