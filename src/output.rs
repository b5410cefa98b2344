//! # Output Module
//!
//! Renders events for the command-line driver, one line per event.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::normalizer::Event;

/// Line format for printed events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable tag and payload
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// JSON line record
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a Event,
}

/// Render one event as a single line (no trailing newline)
pub fn format_event(event: &Event, format: OutputFormat, at: DateTime<Utc>) -> String {
    match format {
        OutputFormat::Text => event.to_string(),
        OutputFormat::Json => {
            let record = EventRecord {
                ts: at.to_rfc3339_opts(SecondsFormat::Millis, true),
                event,
            };
            // Serializing plain numbers and strings cannot fail
            serde_json::to_string(&record).unwrap_or_else(|_| event.to_string())
        }
    }
}
