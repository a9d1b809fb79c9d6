//! Core logger types and traits

pub mod diagnostics;
pub mod error;
pub mod format;
pub mod label;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub(crate) mod runtime;
pub mod transport;

pub use diagnostics::{DiagnosticCallback, DiagnosticEvent, Diagnostics, LoggedCallback};
pub use error::{ErrorKind, LoggerError, Result};
pub use format::{format_timestamp, render_line, OutputFormat, TIMESTAMP_FORMAT};
pub use label::{
    label_generator, make_label, parse_label, LabelFields, LabelGenerator, ServiceIdentity,
};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{build_logger, default_logger, derive_child, Logger, LoggerBuilder, LoggerConfig};
pub use metrics::{DeliveryMetrics, LoggerMetrics};
pub use transport::{Transport, TransportOptions};
