//! Transport trait for log output destinations

use super::{error::Result, log_level::LogLevel, log_record::LogRecord};
use serde::{Deserialize, Serialize};

/// Options every transport understands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Per-transport minimum level, applied after the logger's own filter
    pub level: Option<LogLevel>,
    /// Accept nothing
    pub silent: bool,
}

impl TransportOptions {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level: Some(level),
            silent: false,
        }
    }

    pub fn accepts(&self, level: LogLevel) -> bool {
        !self.silent && self.level.map_or(true, |min| level >= min)
    }
}

/// Runtime object that delivers records to one sink
///
/// `log` must return promptly: transports that talk to the network or disk
/// schedule the work and report failures through their diagnostics instead
/// of their return value.
pub trait Transport: Send {
    fn name(&self) -> &str;

    fn options(&self) -> &TransportOptions;

    fn log(&mut self, record: &LogRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stop accepting records and release resources. Must be idempotent.
    fn close(&mut self) {}

    fn accepts(&self, level: LogLevel) -> bool {
        self.options().accepts(level)
    }
}
