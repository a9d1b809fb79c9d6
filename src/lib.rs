//! # Rust Sink Logger
//!
//! A structured-logging façade that fans labeled records out to pluggable
//! sinks, including a non-blocking message-broker transport.
//!
//! ## Features
//!
//! - **Labeled records**: service / module / component identity, with child
//!   loggers binding their own label over the same transports
//! - **Multiple sinks**: console, rotating file, HTTP, any writer, and a
//!   message broker (in-process, or Kafka with the `kafka` feature)
//! - **Fire and forget**: network delivery runs in the background and is
//!   observed through diagnostics, never through the logging call
//! - **Isolation**: a failing or panicking transport never stops the others
//!
//! ## Example
//!
//! ```
//! use rust_sink_logger::prelude::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let broker = MemoryBroker::new();
//! let mut consumer = broker.subscribe("test_topic");
//!
//! let config = BrokerTransportConfig::new(ConnectionConfig::new(["127.0.0.1:29092"]), "test_topic")
//!     .with_client_factory(Arc::new(broker.clone()));
//! let logger = Logger::builder()
//!     .identity(&ServiceIdentity::new("billing", "billing-1").with_component("A"))
//!     .sink(SinkDescriptor::broker(config).unwrap())
//!     .build()
//!     .unwrap();
//!
//! logger.ready().await.unwrap();
//! logger.info("HELLO");
//!
//! let received = consumer.recv().await.unwrap();
//! assert_eq!(received.value_json().unwrap()["message"], "HELLO");
//! logger.shutdown().await;
//! # });
//! ```

pub mod config;
pub mod core;
pub mod macros;
pub mod sinks;
pub mod transports;

pub mod prelude {
    pub use crate::config::LoggerSettings;
    pub use crate::core::{
        build_logger, default_logger, derive_child, label_generator, parse_label, DiagnosticEvent,
        Diagnostics, ErrorKind, LabelGenerator, LogLevel, LogRecord, Logger, LoggerBuilder,
        LoggerConfig, LoggerError, LoggerMetrics, OutputFormat, Result, ServiceIdentity,
        Transport, TransportOptions,
    };
    pub use crate::sinks::{
        ConsoleSinkOptions, FileSinkOptions, HttpSinkOptions, SharedBuffer, SinkDescriptor,
        StreamSinkOptions,
    };
    pub use crate::transports::broker::{
        Acks, BrokerTransportConfig, Compression, ConnectionConfig, MemoryBroker, ProducerTuning,
    };
    pub use crate::transports::{BrokerHandle, BrokerState};
}

pub use crate::config::LoggerSettings;
pub use crate::core::{
    build_logger, default_logger, derive_child, make_label, DeliveryMetrics, DiagnosticEvent,
    Diagnostics, ErrorKind, LabelGenerator, LogLevel, LogRecord, Logger, LoggerBuilder,
    LoggerConfig, LoggerError, LoggerMetrics, OutputFormat, Result, ServiceIdentity, Transport,
    TransportOptions,
};
pub use crate::sinks::SinkDescriptor;
