//! Logger façade and router
//!
//! A [`Logger`] owns nothing but its label binding and its minimum level. The
//! transports, broker handles, metrics and diagnostics live in a shared core,
//! so child loggers reuse the parent's transports (and broker connections)
//! instead of opening their own.

use super::diagnostics::{panic_message, DiagnosticEvent, Diagnostics};
use super::error::{LoggerError, Result};
use super::label::{make_label, LabelGenerator, ServiceIdentity};
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metrics::LoggerMetrics;
use super::transport::Transport;
use crate::sinks::SinkDescriptor;
use crate::transports::{build_transport, BrokerHandle, ConsoleTransport};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Minimum level and label generator for a root logger
#[derive(Clone, Default)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub label_generator: Option<LabelGenerator>,
}

impl LoggerConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            label_generator: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_label_generator(mut self, generator: LabelGenerator) -> Self {
        self.label_generator = Some(generator);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_identity(self, identity: &ServiceIdentity) -> Self {
        self.with_label_generator(identity.generator())
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("level", &self.level)
            .field("label_generator", &self.label_generator.is_some())
            .finish()
    }
}

struct LoggerCore {
    transports: Mutex<Vec<Box<dyn Transport>>>,
    brokers: Vec<BrokerHandle>,
    metrics: LoggerMetrics,
    diagnostics: Diagnostics,
    closed: AtomicBool,
}

impl LoggerCore {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut transports = self.transports.lock();
        for transport in transports.iter_mut() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| transport.close())) {
                self.diagnostics.report(DiagnosticEvent::TransportPanicked {
                    transport: transport.name().to_string(),
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
}

impl Drop for LoggerCore {
    fn drop(&mut self) {
        self.close();
    }
}

/// Routes records to every configured transport
///
/// Cloning a logger is cheap; clones and children share transports. A
/// transport must not log through the logger that owns it.
///
/// # Example
///
/// ```
/// use rust_sink_logger::prelude::*;
///
/// let buffer = SharedBuffer::new();
/// let identity = ServiceIdentity::new("billing", "billing-1").with_component("A");
///
/// let logger = Logger::builder()
///     .identity(&identity)
///     .sink(SinkDescriptor::stream(buffer.clone()))
///     .build()
///     .unwrap();
///
/// logger.info("HELLO");
/// logger.child(Some(identity.child("B").generator())).error("HELLO CHILD");
///
/// let lines = buffer.lines();
/// assert!(lines[0].contains("COMPONENT: A | info |"));
/// assert!(lines[1].contains("COMPONENT: B | error |"));
/// ```
#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
    level: LogLevel,
    main_label: Arc<str>,
    child_label: Option<Arc<str>>,
}

impl Logger {
    fn from_parts(
        config: LoggerConfig,
        transports: Vec<Box<dyn Transport>>,
        brokers: Vec<BrokerHandle>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            core: Arc::new(LoggerCore {
                transports: Mutex::new(transports),
                brokers,
                metrics: LoggerMetrics::new(),
                diagnostics,
                closed: AtomicBool::new(false),
            }),
            level: config.level,
            main_label: Arc::from(make_label(config.label_generator.as_ref())),
            child_label: None,
        }
    }

    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Only affects this handle, not its parent or existing children
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    pub fn main_label(&self) -> &str {
        &self.main_label
    }

    pub fn child_label(&self) -> Option<&str> {
        self.child_label.as_deref()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.is_enabled(level) {
            self.core.metrics.record_filtered();
            return;
        }

        let mut record = LogRecord::new(level, message, &*self.main_label);
        record.child_label = self.child_label.as_deref().map(str::to_string);
        self.emit(&record);
    }

    /// Fan a finished record out to every transport that accepts its level
    ///
    /// Each transport is isolated: an error or a panic in one is reported
    /// and counted, and the remaining transports still receive the record.
    pub fn emit(&self, record: &LogRecord) {
        let core = &self.core;
        if core.closed.load(Ordering::Acquire) {
            core.metrics.record_rejected();
            core.diagnostics.report(DiagnosticEvent::RejectedAfterClose {
                transport: "logger".to_string(),
            });
            return;
        }
        core.metrics.record_emitted();

        let mut transports = core.transports.lock();
        for transport in transports.iter_mut() {
            if !transport.accepts(record.level) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| transport.log(record))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    core.metrics.record_transport_failure();
                    core.diagnostics.report(DiagnosticEvent::TransportFailed {
                        transport: transport.name().to_string(),
                        error,
                    });
                }
                Err(payload) => {
                    core.metrics.record_transport_failure();
                    core.diagnostics.report(DiagnosticEvent::TransportPanicked {
                        transport: transport.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn http(&self, message: impl Into<String>) {
        self.log(LogLevel::Http, message);
    }

    pub fn verbose(&self, message: impl Into<String>) {
        self.log(LogLevel::Verbose, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn silly(&self, message: impl Into<String>) {
        self.log(LogLevel::Silly, message);
    }

    /// Logger with a new child label over the same transports
    ///
    /// Without a generator, or when it yields an empty label, the child has
    /// no child label, so its records render the main label.
    #[must_use]
    pub fn child(&self, generator: Option<LabelGenerator>) -> Logger {
        self.child_with_label(make_label(generator.as_ref()))
    }

    #[must_use]
    pub fn child_with_label(&self, label: impl Into<String>) -> Logger {
        let label = label.into();
        Logger {
            child_label: (!label.is_empty()).then(|| Arc::from(label)),
            ..self.clone()
        }
    }

    /// Flush every transport
    ///
    /// # Errors
    ///
    /// Fails if any transport failed to flush; all are attempted and each
    /// failure is also reported to diagnostics.
    pub fn flush(&self) -> Result<()> {
        let core = &self.core;
        let mut failed = 0usize;
        let mut transports = core.transports.lock();
        for transport in transports.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| transport.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    failed += 1;
                    core.diagnostics.report(DiagnosticEvent::TransportFailed {
                        transport: transport.name().to_string(),
                        error,
                    });
                }
                Err(payload) => {
                    failed += 1;
                    core.diagnostics.report(DiagnosticEvent::TransportPanicked {
                        transport: transport.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(LoggerError::writer(format!(
                "{} transport(s) failed to flush",
                failed
            )))
        }
    }

    /// Close every transport; shared by all clones and children
    ///
    /// Idempotent. Broker disconnects finish in the background; await
    /// [`shutdown`](Self::shutdown) to wait for them.
    pub fn close(&self) {
        self.core.close();
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    /// Wait until all broker transports are connected
    ///
    /// # Errors
    ///
    /// The first broker that failed to connect or closed first.
    pub async fn ready(&self) -> Result<()> {
        for broker in &self.core.brokers {
            broker.ready().await?;
        }
        Ok(())
    }

    /// Close, then wait until every broker transport has disconnected
    pub async fn shutdown(&self) {
        self.close();
        for broker in &self.core.brokers {
            broker.closed().await;
        }
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.core.metrics
    }

    pub fn broker_handles(&self) -> &[BrokerHandle] {
        &self.core.brokers
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.core.diagnostics
    }

    pub fn transport_names(&self) -> Vec<String> {
        self.core
            .transports
            .lock()
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("main_label", &self.main_label)
            .field("child_label", &self.child_label)
            .field("transports", &self.transport_names())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Build a logger with one transport per descriptor, in order
///
/// An empty `sinks` yields the colorized console fallback bound at
/// `verbose`.
///
/// # Errors
///
/// Only `ErrorKind::Configuration` errors from descriptor construction.
pub fn build_logger(
    config: LoggerConfig,
    sinks: impl IntoIterator<Item = SinkDescriptor>,
) -> Result<Logger> {
    Logger::builder().config(config).sinks(sinks).build()
}

/// Logger writing only to the console fallback
pub fn default_logger(config: LoggerConfig) -> Logger {
    Logger::from_parts(
        config,
        vec![Box::new(ConsoleTransport::fallback())],
        Vec::new(),
        Diagnostics::default(),
    )
}

/// See [`Logger::child`]
#[must_use]
pub fn derive_child(parent: &Logger, generator: Option<LabelGenerator>) -> Logger {
    parent.child(generator)
}

enum Output {
    Sink(SinkDescriptor),
    Transport(Box<dyn Transport>),
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_sink_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .sink(SinkDescriptor::console())
///     .build()
///     .unwrap();
///
/// assert_eq!(logger.level(), LogLevel::Debug);
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    outputs: Vec<Output>,
    diagnostics: Option<Diagnostics>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            outputs: Vec::new(),
            diagnostics: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn label_generator(mut self, generator: LabelGenerator) -> Self {
        self.config.label_generator = Some(generator);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn identity(self, identity: &ServiceIdentity) -> Self {
        self.label_generator(identity.generator())
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, descriptor: SinkDescriptor) -> Self {
        self.outputs.push(Output::Sink(descriptor));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sinks(mut self, descriptors: impl IntoIterator<Item = SinkDescriptor>) -> Self {
        self.outputs
            .extend(descriptors.into_iter().map(Output::Sink));
        self
    }

    /// Add a custom transport
    #[must_use = "builder methods return a new value"]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.outputs.push(Output::Transport(Box::new(transport)));
        self
    }

    /// Shared by the logger and every transport built from a descriptor
    #[must_use = "builder methods return a new value"]
    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Build the Logger
    ///
    /// # Errors
    ///
    /// The first configuration error raised by a descriptor.
    pub fn build(self) -> Result<Logger> {
        let diagnostics = self.diagnostics.unwrap_or_default();
        let mut transports: Vec<Box<dyn Transport>> = Vec::with_capacity(self.outputs.len());
        let mut brokers = Vec::new();

        for output in self.outputs {
            match output {
                Output::Sink(descriptor) => {
                    let built = build_transport(descriptor, &diagnostics)?;
                    transports.push(built.transport);
                    brokers.extend(built.broker);
                }
                Output::Transport(transport) => transports.push(transport),
            }
        }

        if transports.is_empty() {
            transports.push(Box::new(ConsoleTransport::fallback()));
        }

        Ok(Logger::from_parts(self.config, transports, brokers, diagnostics))
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::label::label_generator;
    use crate::core::transport::TransportOptions;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Collecting {
        options: TransportOptions,
        records: Arc<Mutex<Vec<LogRecord>>>,
        closes: Arc<AtomicUsize>,
    }

    impl Transport for Collecting {
        fn name(&self) -> &str {
            "collecting"
        }
        fn options(&self) -> &TransportOptions {
            &self.options
        }
        fn log(&mut self, record: &LogRecord) -> Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }
        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing {
        options: TransportOptions,
        panics: bool,
    }

    impl Transport for Failing {
        fn name(&self) -> &str {
            if self.panics {
                "panicking"
            } else {
                "failing"
            }
        }
        fn options(&self) -> &TransportOptions {
            &self.options
        }
        fn log(&mut self, _record: &LogRecord) -> Result<()> {
            if self.panics {
                panic!("transport exploded");
            }
            Err(LoggerError::writer("disk gone"))
        }
        fn flush(&mut self) -> Result<()> {
            Err(LoggerError::writer("cannot flush"))
        }
    }

    fn quiet() -> (Diagnostics, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let diagnostics = Diagnostics::with_callback(Arc::new(move |event: &DiagnosticEvent| {
            sink.lock().push(event.to_string());
        }));
        (diagnostics, seen)
    }

    #[test]
    fn test_builder_basic() {
        let logger = Logger::builder().min_level(LogLevel::Debug).build().unwrap();
        assert_eq!(logger.level(), LogLevel::Debug);
        assert_eq!(logger.metrics().emitted(), 0);
    }

    #[test]
    fn test_empty_sinks_fall_back_to_console() {
        let logger = build_logger(LoggerConfig::default(), Vec::new()).unwrap();
        assert_eq!(logger.transport_names(), vec!["console".to_string()]);

        let logger = default_logger(LoggerConfig::default());
        assert_eq!(logger.transport_names(), vec!["console".to_string()]);
        assert!(logger.broker_handles().is_empty());
    }

    #[test]
    fn test_level_filter() {
        let collecting = Collecting::default();
        let records = Arc::clone(&collecting.records);
        let logger = Logger::builder()
            .min_level(LogLevel::Warn)
            .transport(collecting)
            .build()
            .unwrap();

        logger.info("ignored");
        logger.debug("ignored");
        logger.warn("kept");
        logger.error("kept");

        assert_eq!(records.lock().len(), 2);
        assert_eq!(logger.metrics().filtered(), 2);
        assert_eq!(logger.metrics().emitted(), 2);
    }

    #[test]
    fn test_transport_level_applies_after_logger_level() {
        let collecting = Collecting {
            options: TransportOptions::with_level(LogLevel::Error),
            ..Collecting::default()
        };
        let records = Arc::clone(&collecting.records);
        let logger = Logger::builder().transport(collecting).build().unwrap();

        logger.info("below transport level");
        logger.error("passes");
        assert_eq!(records.lock().len(), 1);
    }

    #[test]
    fn test_failing_and_panicking_transports_are_isolated() {
        let first = Collecting::default();
        let last = Collecting::default();
        let (first_records, last_records) = (Arc::clone(&first.records), Arc::clone(&last.records));
        let (diagnostics, seen) = quiet();

        let logger = Logger::builder()
            .diagnostics(diagnostics)
            .transport(first)
            .transport(Failing {
                options: TransportOptions::default(),
                panics: false,
            })
            .transport(Failing {
                options: TransportOptions::default(),
                panics: true,
            })
            .transport(last)
            .build()
            .unwrap();

        logger.info("one");
        logger.info("two");

        assert_eq!(first_records.lock().len(), 2);
        assert_eq!(last_records.lock().len(), 2);
        assert_eq!(logger.metrics().transport_failures(), 4);

        let seen = seen.lock();
        assert!(seen
            .iter()
            .any(|l| l.contains("Transport failing failed: Writer error: disk gone")));
        assert!(seen
            .iter()
            .any(|l| l.contains("Transport panicking panicked: transport exploded")));
    }

    #[test]
    fn test_child_label_binding() {
        let collecting = Collecting::default();
        let records = Arc::clone(&collecting.records);
        let logger = Logger::builder()
            .label_generator(label_generator(|| "MAIN".to_string()))
            .transport(collecting)
            .build()
            .unwrap();

        let child = logger.child(Some(label_generator(|| "CHILD".to_string())));
        let unlabeled = derive_child(&logger, None);

        logger.info("root");
        child.info("child");
        unlabeled.info("unlabeled");

        let records = records.lock();
        assert_eq!(records[0].routing_label(), "MAIN");
        assert_eq!(records[1].routing_label(), "CHILD");
        assert_eq!(records[1].main_label, "MAIN");
        assert_eq!(records[2].routing_label(), "MAIN");
        assert!(records[2].child_label.is_none());
        assert!(logger.child_label().is_none());
    }

    #[test]
    fn test_empty_child_label_renders_main_label() {
        let buffer = crate::sinks::SharedBuffer::new();
        let logger = Logger::builder()
            .label_generator(label_generator(|| "MAIN".to_string()))
            .sink(SinkDescriptor::stream(buffer.clone()))
            .build()
            .unwrap();

        let child = logger.child(Some(label_generator(String::new)));
        assert!(child.child_label().is_none());
        child.info("x");
        logger.child_with_label("").info("y");

        let lines = buffer.lines();
        assert!(lines[0].starts_with("MAIN | info | "), "got {}", lines[0]);
        assert!(lines[1].starts_with("MAIN | info | "), "got {}", lines[1]);
    }

    #[test]
    fn test_child_level_is_independent() {
        let logger = Logger::builder().build().unwrap();
        let mut child = logger.child(None);
        child.set_min_level(LogLevel::Silly);
        assert_eq!(logger.level(), LogLevel::Info);
        assert!(child.is_enabled(LogLevel::Silly));
    }

    #[test]
    fn test_close_is_idempotent_and_shared() {
        let collecting = Collecting::default();
        let closes = Arc::clone(&collecting.closes);
        let records = Arc::clone(&collecting.records);
        let (diagnostics, _) = quiet();
        let logger = Logger::builder()
            .diagnostics(diagnostics)
            .transport(collecting)
            .build()
            .unwrap();
        let child = logger.child_with_label("child");

        child.close();
        logger.close();
        logger.info("after close");
        drop(child);
        drop(logger);

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(records.lock().is_empty());
    }

    #[test]
    fn test_flush_reports_failures() {
        let (diagnostics, seen) = quiet();
        let logger = Logger::builder()
            .diagnostics(diagnostics)
            .transport(Collecting::default())
            .transport(Failing {
                options: TransportOptions::default(),
                panics: false,
            })
            .build()
            .unwrap();

        assert!(logger.flush().is_err());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_identity_config() {
        let identity = ServiceIdentity::new("billing", "b-1").with_module("api");
        let logger = default_logger(LoggerConfig::new(LogLevel::Http).with_identity(&identity));
        assert_eq!(logger.main_label(), identity.label());
        assert_eq!(logger.level(), LogLevel::Http);
    }
}
