//! Log record structure

use super::format::timestamp_serde;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single emitted record, as every transport sees it
///
/// Serializes to `{ message, level, timestamp, mainLabel, childLabel? }`,
/// which is also the default broker payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub message: String,
    pub level: LogLevel,
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub main_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_label: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, main_label: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Utc::now(),
            main_label: main_label.into(),
            child_label: None,
        }
    }

    pub fn with_child_label(mut self, child_label: impl Into<String>) -> Self {
        self.child_label = Some(child_label.into());
        self
    }

    /// The label that identifies this record: the child label when bound and
    /// non-empty, otherwise the main label
    pub fn routing_label(&self) -> &str {
        self.child_label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.main_label)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
