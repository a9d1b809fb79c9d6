//! Error types for the logger system

use std::fmt;

pub type Result<T> = std::result::Result<T, LoggerError>;

/// Coarse classification of a [`LoggerError`]
///
/// Only `Configuration` errors ever escape to callers: they are raised while
/// descriptors and transports are constructed. Everything on the hot path is
/// reported to the diagnostics side-channel instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Delivery,
    Encoding,
    Io,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Delivery => "DeliveryError",
            ErrorKind::Encoding => "EncodingError",
            ErrorKind::Io => "IoError",
            ErrorKind::Other => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Broker or HTTP delivery failure
    #[error("Delivery to {target} failed: {message}")]
    Delivery { target: String, message: String },

    /// User-supplied encoder failure
    #[error("Encoding failed in {encoder}: {message}")]
    Encoding { encoder: String, message: String },

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Transport no longer accepts records
    #[error("Transport '{name}' is closed")]
    TransportClosed { name: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoggerError::InvalidConfiguration { .. } | LoggerError::ConfigParse(_) => {
                ErrorKind::Configuration
            }
            LoggerError::Delivery { .. } | LoggerError::TransportClosed { .. } => {
                ErrorKind::Delivery
            }
            LoggerError::Encoding { .. } | LoggerError::JsonError(_) => ErrorKind::Encoding,
            LoggerError::IoOperation { .. }
            | LoggerError::IoError(_)
            | LoggerError::FileRotationError { .. }
            | LoggerError::WriterError(_) => ErrorKind::Io,
            LoggerError::Other(_) => ErrorKind::Other,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(target: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Delivery {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding(encoder: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Encoding {
            encoder: encoder.into(),
            message: message.into(),
        }
    }

    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn transport_closed(name: impl Into<String>) -> Self {
        LoggerError::TransportClosed { name: name.into() }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}
