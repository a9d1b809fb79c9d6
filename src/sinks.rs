//! Sink descriptors
//!
//! A [`SinkDescriptor`] says where records go and carries the options that
//! only make sense for that destination. Descriptors are plain data until
//! [`build_logger`](crate::build_logger) turns each into a transport.

use crate::core::{LogLevel, LoggerError, OutputFormat, Result, TransportOptions};
use crate::transports::broker::{BrokerTransportConfig, ConnectionConfig, ProducerTuning};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    File,
    Http,
    Stream,
    Broker,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Console => "console",
            SinkKind::File => "file",
            SinkKind::Http => "http",
            SinkKind::Stream => "stream",
            SinkKind::Broker => "broker",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSinkOptions {
    #[serde(flatten)]
    pub transport: TransportOptions,
    pub colors: bool,
    /// Levels written to stderr instead of stdout
    pub stderr_levels: Vec<LogLevel>,
    pub format: OutputFormat,
}

impl Default for ConsoleSinkOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            colors: true,
            stderr_levels: vec![LogLevel::Error],
            format: OutputFormat::Text,
        }
    }
}

impl ConsoleSinkOptions {
    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.transport.level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// How many rotated files survive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Keep at most this many files
    Count(usize),
    /// Delete files older than this many days
    Days(u32),
}

impl Retention {
    /// Parse `"5"` (file count) or `"14d"` (days)
    ///
    /// # Errors
    ///
    /// `ErrorKind::Configuration` for anything else.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = || {
            LoggerError::config(
                "FileSink",
                format!("invalid max_files '{}' (expected e.g. \"5\" or \"14d\")", value),
            )
        };

        match value.strip_suffix(['d', 'D']) {
            Some(days) => days
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|d| *d > 0)
                .map(Retention::Days)
                .ok_or_else(invalid),
            None => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Retention::Count)
                .ok_or_else(invalid),
        }
    }
}

/// Parse a size such as `"20m"`, `"512k"`, `"1g"` or plain bytes
///
/// # Errors
///
/// `ErrorKind::Configuration` if the number or unit is not recognized.
pub fn parse_size(value: &str) -> Result<u64> {
    let value = value.trim();
    let invalid = || {
        LoggerError::config(
            "FileSink",
            format!("invalid max_size '{}' (expected e.g. \"20m\")", value),
        )
    };

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&value[..idx], 1024),
        Some((idx, 'm' | 'M')) => (&value[..idx], 1024 * 1024),
        Some((idx, 'g' | 'G')) => (&value[..idx], 1024 * 1024 * 1024),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

/// Daily-rotated file options
///
/// `filename` may contain `%DATE%`, replaced by the current date rendered
/// with `date_pattern` (`YYYY`, `YY`, `MM`, `DD`, `HH`, `mm`, `ss` tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkOptions {
    #[serde(flatten)]
    pub transport: TransportOptions,
    pub filename: String,
    pub dirname: Option<PathBuf>,
    pub date_pattern: String,
    /// e.g. `"20m"`; no size rotation when unset
    pub max_size: Option<String>,
    /// e.g. `"14d"` or `"5"`; everything is kept when unset
    pub max_files: Option<String>,
    /// gzip rotated files
    pub zipped_archive: bool,
    pub format: OutputFormat,
    /// Write on the logging thread instead of the background writer
    pub synchronous: bool,
}

impl Default for FileSinkOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            filename: "application-%DATE%.log".to_string(),
            dirname: None,
            date_pattern: "YYYY-MM-DD".to_string(),
            max_size: None,
            max_files: None,
            zipped_archive: false,
            format: OutputFormat::Text,
            synchronous: false,
        }
    }
}

impl FileSinkOptions {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_dirname(mut self, dirname: impl Into<PathBuf>) -> Self {
        self.dirname = Some(dirname.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_date_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.date_pattern = pattern.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_size(mut self, size: impl Into<String>) -> Self {
        self.max_size = Some(size.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_files(mut self, retention: impl Into<String>) -> Self {
        self.max_files = Some(retention.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_zipped_archive(mut self, zipped: bool) -> Self {
        self.zipped_archive = zipped;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.transport.level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn max_size_bytes(&self) -> Result<Option<u64>> {
        self.max_size.as_deref().map(parse_size).transpose()
    }

    pub fn retention(&self) -> Result<Option<Retention>> {
        self.max_files.as_deref().map(Retention::parse).transpose()
    }

    /// Check the option strings
    ///
    /// # Errors
    ///
    /// `ErrorKind::Configuration` for an empty filename or a malformed
    /// `max_size` / `max_files`.
    pub fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(LoggerError::config("FileSink", "filename is empty"));
        }
        self.max_size_bytes()?;
        self.retention()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Options for posting JSON records to an HTTP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSinkOptions {
    #[serde(flatten)]
    pub transport: TransportOptions,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub ssl: bool,
    pub headers: BTreeMap<String, String>,
    pub auth: Option<BasicAuth>,
    pub timeout_ms: Option<u64>,
}

impl Default for HttpSinkOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            host: "localhost".to_string(),
            port: None,
            path: "/".to_string(),
            ssl: false,
            headers: BTreeMap::new(),
            auth: None,
            timeout_ms: None,
        }
    }
}

impl HttpSinkOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// `http[s]://host[:port]/path`
    pub fn url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        match self.port {
            Some(port) => format!("{}://{}:{}{}", scheme, self.host, port, path),
            None => format!("{}://{}{}", scheme, self.host, path),
        }
    }
}

/// Shared, thread-safe writer used by stream sinks
#[derive(Clone)]
pub struct StreamTarget {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl StreamTarget {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub(crate) fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")
    }

    pub(crate) fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}

impl fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamTarget")
    }
}

impl From<SharedBuffer> for StreamTarget {
    fn from(buffer: SharedBuffer) -> Self {
        Self::new(buffer)
    }
}

/// In-memory writer that can be inspected while a logger writes to it
///
/// # Example
///
/// ```
/// use rust_sink_logger::sinks::SharedBuffer;
/// use std::io::Write;
///
/// let buffer = SharedBuffer::new();
/// let mut writer = buffer.clone();
/// writeln!(writer, "first").unwrap();
///
/// assert_eq!(buffer.lines(), vec!["first".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamSinkOptions {
    #[serde(flatten)]
    pub transport: TransportOptions,
    pub format: OutputFormat,
    /// stdout when unset
    #[serde(skip)]
    pub target: Option<StreamTarget>,
}

impl StreamSinkOptions {
    pub fn new(target: impl Into<StreamTarget>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.transport.level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// A broker descriptor whose configuration has been validated
#[derive(Debug, Clone)]
pub struct BrokerSink {
    config: BrokerTransportConfig,
}

impl BrokerSink {
    /// # Errors
    ///
    /// `ErrorKind::Configuration` when the connection config or topic is
    /// missing.
    pub fn new(config: BrokerTransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BrokerTransportConfig {
        &self.config
    }

    /// Adjust the config in place (attach encoders, factories, callbacks)
    ///
    /// # Errors
    ///
    /// Fails if the adjusted config no longer validates.
    pub fn map_config<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(BrokerTransportConfig) -> BrokerTransportConfig,
    {
        Self::new(f(self.config))
    }

    pub fn into_config(self) -> BrokerTransportConfig {
        self.config
    }
}

/// Data-only broker options as they appear in JSON / TOML
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BrokerSinkOptions {
    #[serde(alias = "client_config")]
    connection: Option<ConnectionConfig>,
    topic: Option<String>,
    #[serde(alias = "producer_config")]
    producer: ProducerTuning,
    #[serde(flatten)]
    transport: TransportOptions,
}

/// One output destination and its options
#[derive(Debug, Clone)]
pub enum SinkDescriptor {
    Console(ConsoleSinkOptions),
    File(FileSinkOptions),
    Http(HttpSinkOptions),
    Stream(StreamSinkOptions),
    Broker(BrokerSink),
}

impl SinkDescriptor {
    pub fn console() -> Self {
        SinkDescriptor::Console(ConsoleSinkOptions::default())
    }

    /// # Errors
    ///
    /// See [`FileSinkOptions::validate`].
    pub fn file(options: FileSinkOptions) -> Result<Self> {
        options.validate()?;
        Ok(SinkDescriptor::File(options))
    }

    pub fn http(options: HttpSinkOptions) -> Self {
        SinkDescriptor::Http(options)
    }

    pub fn stream(target: impl Into<StreamTarget>) -> Self {
        SinkDescriptor::Stream(StreamSinkOptions::new(target))
    }

    /// # Errors
    ///
    /// `ErrorKind::Configuration` when the connection config or topic is
    /// missing.
    pub fn broker(config: BrokerTransportConfig) -> Result<Self> {
        BrokerSink::new(config).map(SinkDescriptor::Broker)
    }

    pub fn kind(&self) -> SinkKind {
        match self {
            SinkDescriptor::Console(_) => SinkKind::Console,
            SinkDescriptor::File(_) => SinkKind::File,
            SinkDescriptor::Http(_) => SinkKind::Http,
            SinkDescriptor::Stream(_) => SinkKind::Stream,
            SinkDescriptor::Broker(_) => SinkKind::Broker,
        }
    }

    /// Build a descriptor from a sink name and JSON options
    ///
    /// Names are `console`, `file`, `http`, `stream`, and `kafka` or
    /// `broker`. Unknown names yield `Ok(None)` so that newer configs keep
    /// working with older builds.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Configuration` when the options do not fit the sink.
    pub fn from_named(name: &str, options: serde_json::Value) -> Result<Option<Self>> {
        let options = match options {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other,
        };
        let name = name.trim().to_ascii_lowercase();

        let descriptor = match name.as_str() {
            "console" => SinkDescriptor::Console(parse_options(&name, options)?),
            "file" => SinkDescriptor::file(parse_options(&name, options)?)?,
            "http" => SinkDescriptor::Http(parse_options(&name, options)?),
            "stream" => SinkDescriptor::Stream(parse_options(&name, options)?),
            "kafka" | "broker" => {
                let opts: BrokerSinkOptions = parse_options(&name, options)?;
                SinkDescriptor::broker(BrokerTransportConfig {
                    connection: opts.connection,
                    topic: opts.topic,
                    producer: opts.producer,
                    transport: opts.transport,
                    ..BrokerTransportConfig::default()
                })?
            }
            _ => return Ok(None),
        };
        Ok(Some(descriptor))
    }
}

fn parse_options<T: serde::de::DeserializeOwned>(
    name: &str,
    options: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(options)
        .map_err(|e| LoggerError::config(format!("{} sink", name), e.to_string()))
}
