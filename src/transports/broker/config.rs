//! Broker transport configuration

use super::client::BrokerClientFactory;
use crate::core::{
    Diagnostics, LogLevel, LogRecord, LoggedCallback, LoggerError, Result, TransportOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Turns the static message key into bytes
pub type KeyEncoder = Arc<dyn Fn(&str) -> Result<Vec<u8>> + Send + Sync>;

/// Turns a whole record into the message value
pub type ValueEncoder = Arc<dyn Fn(&LogRecord) -> Result<Vec<u8>> + Send + Sync>;

/// Derives the message timestamp (milliseconds since the epoch)
pub type TimestampEncoder = Arc<dyn Fn(&LogRecord) -> Result<i64> + Send + Sync>;

/// Where the broker lives; passed through to the client untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub brokers: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Extra client properties (e.g. `security.protocol`)
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn new<I, S>(brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            brokers: brokers.into_iter().map(Into::into).collect(),
            client_id: None,
            properties: BTreeMap::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Fill in a random client id when none was configured
    pub(crate) fn with_resolved_client_id(mut self) -> Self {
        if self.client_id.is_none() {
            self.client_id = Some(format!("rust-sink-logger-{:08x}", rand::random::<u32>()));
        }
        self
    }
}

/// Number of broker acknowledgments a send waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Acks {
    /// `0`: do not wait
    None,
    /// `1`: partition leader only
    Leader,
    /// `-1`: all in-sync replicas
    All,
}

impl Acks {
    pub fn as_i16(&self) -> i16 {
        match self {
            Acks::None => 0,
            Acks::Leader => 1,
            Acks::All => -1,
        }
    }
}

impl TryFrom<i16> for Acks {
    type Error = String;

    fn try_from(value: i16) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Acks::None),
            1 => Ok(Acks::Leader),
            -1 => Ok(Acks::All),
            other => Err(format!("Invalid acks value: {} (expected 0, 1 or -1)", other)),
        }
    }
}

impl From<Acks> for i16 {
    fn from(acks: Acks) -> Self {
        acks.as_i16()
    }
}

/// Record-level compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer tuning and per-message encoding
///
/// Everything left unset is decided by the broker client.
///
/// # Example
///
/// ```
/// use rust_sink_logger::transports::broker::{Acks, Compression, ProducerTuning};
/// use std::time::Duration;
///
/// let tuning = ProducerTuning::default()
///     .with_message_key("log_message")
///     .with_key_encoder(|key| Ok(key.as_bytes().to_vec()))
///     .with_acks(Acks::All)
///     .with_timeout(Duration::from_secs(5))
///     .with_compression(Compression::Gzip);
///
/// assert_eq!(tuning.timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProducerTuning {
    pub allow_auto_topic_creation: Option<bool>,
    pub idempotent: Option<bool>,
    pub partition: Option<i32>,
    pub headers: BTreeMap<String, String>,
    pub acks: Option<Acks>,
    pub timeout_ms: Option<u64>,
    pub compression: Option<Compression>,
    pub message_key: Option<String>,
    #[serde(skip)]
    pub key_encoder: Option<KeyEncoder>,
    #[serde(skip)]
    pub value_encoder: Option<ValueEncoder>,
    #[serde(skip)]
    pub timestamp_encoder: Option<TimestampEncoder>,
}

impl ProducerTuning {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    #[must_use = "builder methods return a new value"]
    pub fn allow_auto_topic_creation(mut self, allow: bool) -> Self {
        self.allow_auto_topic_creation = Some(allow);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_acks(mut self, acks: Acks) -> Self {
        self.acks = Some(acks);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = Some(key.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_key_encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.key_encoder = Some(Arc::new(encoder));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_value_encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&LogRecord) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.value_encoder = Some(Arc::new(encoder));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timestamp_encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&LogRecord) -> Result<i64> + Send + Sync + 'static,
    {
        self.timestamp_encoder = Some(Arc::new(encoder));
        self
    }
}

impl fmt::Debug for ProducerTuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerTuning")
            .field("allow_auto_topic_creation", &self.allow_auto_topic_creation)
            .field("idempotent", &self.idempotent)
            .field("partition", &self.partition)
            .field("headers", &self.headers)
            .field("acks", &self.acks)
            .field("timeout_ms", &self.timeout_ms)
            .field("compression", &self.compression)
            .field("message_key", &self.message_key)
            .field("key_encoder", &self.key_encoder.is_some())
            .field("value_encoder", &self.value_encoder.is_some())
            .field("timestamp_encoder", &self.timestamp_encoder.is_some())
            .finish()
    }
}

/// Everything a [`BrokerTransport`](super::BrokerTransport) needs
///
/// `connection` and `topic` are mandatory; [`validate`](Self::validate)
/// rejects a config without them.
#[derive(Clone, Default)]
pub struct BrokerTransportConfig {
    pub connection: Option<ConnectionConfig>,
    pub topic: Option<String>,
    pub producer: ProducerTuning,
    pub transport: TransportOptions,
    pub client_factory: Option<Arc<dyn BrokerClientFactory>>,
    pub on_logged: Option<LoggedCallback>,
    pub diagnostics: Option<Diagnostics>,
}

impl BrokerTransportConfig {
    pub fn new(connection: ConnectionConfig, topic: impl Into<String>) -> Self {
        Self {
            connection: Some(connection),
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_producer(mut self, producer: ProducerTuning) -> Self {
        self.producer = producer;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_client_factory(mut self, factory: Arc<dyn BrokerClientFactory>) -> Self {
        self.client_factory = Some(factory);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.transport.level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_logged(mut self, callback: LoggedCallback) -> Self {
        self.on_logged = Some(callback);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Check the mandatory fields
    ///
    /// # Errors
    ///
    /// `ErrorKind::Configuration` when the connection config or topic is
    /// missing, the broker list is empty, or the topic is blank.
    pub fn validate(&self) -> Result<()> {
        let connection = self.connection.as_ref().ok_or_else(|| {
            LoggerError::config("BrokerTransport", "connection config is required")
        })?;
        if connection.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(LoggerError::config(
                "BrokerTransport",
                "connection config must list at least one broker",
            ));
        }

        match self.topic.as_deref() {
            Some(topic) if !topic.trim().is_empty() => Ok(()),
            Some(_) => Err(LoggerError::config("BrokerTransport", "destination topic is empty")),
            None => Err(LoggerError::config("BrokerTransport", "destination topic is required")),
        }
    }
}

impl fmt::Debug for BrokerTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerTransportConfig")
            .field("connection", &self.connection)
            .field("topic", &self.topic)
            .field("producer", &self.producer)
            .field("transport", &self.transport)
            .field("client_factory", &self.client_factory.is_some())
            .field("on_logged", &self.on_logged.is_some())
            .finish()
    }
}
