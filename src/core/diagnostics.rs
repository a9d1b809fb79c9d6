//! Side-channel for failures that must never reach the logging caller
//!
//! Broker connects, sends and disconnects, HTTP posts, background file writes
//! and per-transport failures all end up here. By default events go to stderr;
//! a callback can take their place.

use super::error::LoggerError;
use super::log_record::LogRecord;
use std::fmt;
use std::sync::Arc;

/// Notification that a transport accepted a record (not that it was delivered)
pub type LoggedCallback = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Receives every diagnostic event instead of stderr
pub type DiagnosticCallback = Arc<dyn Fn(&DiagnosticEvent) + Send + Sync>;

#[derive(Debug)]
pub enum DiagnosticEvent {
    /// Broker producer finished connecting
    Connected { transport: String },
    ConnectFailed { transport: String, error: LoggerError },
    /// Broker producer finished disconnecting
    Disconnected { transport: String },
    DisconnectFailed { transport: String, error: LoggerError },
    DeliveryFailed { transport: String, error: LoggerError },
    EncodingFailed { transport: String, error: LoggerError },
    /// A transport returned an error from `log`
    TransportFailed { transport: String, error: LoggerError },
    TransportPanicked { transport: String, message: String },
    /// A record arrived after the transport was closed
    RejectedAfterClose { transport: String },
    /// A configured sink name was not recognized and was skipped
    UnknownSink { name: String },
}

impl DiagnosticEvent {
    pub fn transport(&self) -> &str {
        match self {
            DiagnosticEvent::Connected { transport }
            | DiagnosticEvent::ConnectFailed { transport, .. }
            | DiagnosticEvent::Disconnected { transport }
            | DiagnosticEvent::DisconnectFailed { transport, .. }
            | DiagnosticEvent::DeliveryFailed { transport, .. }
            | DiagnosticEvent::EncodingFailed { transport, .. }
            | DiagnosticEvent::TransportFailed { transport, .. }
            | DiagnosticEvent::TransportPanicked { transport, .. }
            | DiagnosticEvent::RejectedAfterClose { transport } => transport,
            DiagnosticEvent::UnknownSink { name } => name,
        }
    }

    pub fn error(&self) -> Option<&LoggerError> {
        match self {
            DiagnosticEvent::ConnectFailed { error, .. }
            | DiagnosticEvent::DisconnectFailed { error, .. }
            | DiagnosticEvent::DeliveryFailed { error, .. }
            | DiagnosticEvent::EncodingFailed { error, .. }
            | DiagnosticEvent::TransportFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Whether this event describes a failure
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            DiagnosticEvent::Connected { .. } | DiagnosticEvent::Disconnected { .. }
        )
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::Connected { transport } => {
                write!(f, "[LOGGER INFO] {} connected to broker", transport)
            }
            DiagnosticEvent::ConnectFailed { transport, error } => {
                write!(f, "[LOGGER ERROR] {} failed to connect: {}", transport, error)
            }
            DiagnosticEvent::Disconnected { transport } => {
                write!(f, "[LOGGER INFO] {} disconnected from broker", transport)
            }
            DiagnosticEvent::DisconnectFailed { transport, error } => {
                write!(f, "[LOGGER ERROR] {} failed to disconnect: {}", transport, error)
            }
            DiagnosticEvent::DeliveryFailed { transport, error } => {
                write!(f, "[LOGGER ERROR] {} delivery failed: {}", transport, error)
            }
            DiagnosticEvent::EncodingFailed { transport, error } => {
                write!(f, "[LOGGER ERROR] {} dropped a record: {}", transport, error)
            }
            DiagnosticEvent::TransportFailed { transport, error } => {
                write!(f, "[LOGGER ERROR] Transport {} failed: {}", transport, error)
            }
            DiagnosticEvent::TransportPanicked { transport, message } => write!(
                f,
                "[LOGGER CRITICAL] Transport {} panicked: {}. Other transports continue to function.",
                transport, message
            ),
            DiagnosticEvent::RejectedAfterClose { transport } => write!(
                f,
                "[LOGGER WARNING] {} is closed; record discarded",
                transport
            ),
            DiagnosticEvent::UnknownSink { name } => {
                write!(f, "[LOGGER WARNING] Unknown sink '{}' ignored", name)
            }
        }
    }
}

/// Clonable reporter shared by a logger and its transports
#[derive(Clone, Default)]
pub struct Diagnostics {
    callback: Option<DiagnosticCallback>,
}

impl Diagnostics {
    /// Report to stderr
    pub fn stderr() -> Self {
        Self { callback: None }
    }

    pub fn with_callback(callback: DiagnosticCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn report(&self, event: DiagnosticEvent) {
        match self.callback {
            Some(ref callback) => callback(&event),
            None => eprintln!("{}", event),
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
