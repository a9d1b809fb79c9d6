//! Record rendering
//!
//! Every text sink renders a record as
//! `<label> | <level> | <timestamp> | <message>`. Consumers split these lines
//! on `|`, so the delimiter and field order are fixed.

use super::log_record::LogRecord;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// strftime form of `YYYY-MM-DD HH:mm:ss.SSS`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format a timestamp with [`TIMESTAMP_FORMAT`]
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Output format for line-oriented sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<label> | <level> | <timestamp> | <message>`
    #[default]
    Text,

    /// One JSON record per line
    ///
    /// Example: `{"message":"ready","level":"info","timestamp":"2025-01-08 10:30:45.123","mainLabel":""}`
    Json,
}

impl OutputFormat {
    /// Render a record according to this format
    pub fn render(&self, record: &LogRecord, colors: bool) -> String {
        match self {
            OutputFormat::Text => render_line(record, colors),
            OutputFormat::Json => record.to_json().unwrap_or_default(),
        }
    }
}

/// Render the text form of a record
///
/// The child label wins over the main label when present.
pub fn render_line(record: &LogRecord, colors: bool) -> String {
    let level = if colors {
        record
            .level
            .to_str()
            .color(record.level.color_code())
            .to_string()
    } else {
        record.level.to_str().to_string()
    };

    format!(
        "{} | {} | {} | {}",
        record.routing_label(),
        level,
        format_timestamp(&record.timestamp),
        record.message
    )
}

/// Serde adapter keeping record timestamps in the rendered text format
pub(crate) mod timestamp_serde {
    use super::TIMESTAMP_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
