//! Narrow interface to a broker client library

use super::config::{Acks, Compression, ConnectionConfig, ProducerTuning};
use crate::core::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One encoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub partition: Option<i32>,
    pub headers: Vec<(String, Vec<u8>)>,
    /// Milliseconds since the epoch
    pub timestamp: Option<i64>,
}

impl BrokerMessage {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: None,
            value: value.into(),
            partition: None,
            headers: Vec::new(),
            timestamp: None,
        }
    }
}

/// A send to exactly one topic, with delivery-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    pub topic: String,
    pub messages: Vec<BrokerMessage>,
    pub acks: Option<Acks>,
    pub timeout: Option<Duration>,
    pub compression: Option<Compression>,
}

/// Producer side of a broker client
///
/// # Example
///
/// ```no_run
/// use rust_sink_logger::core::Result;
/// use rust_sink_logger::transports::broker::{BrokerProducer, ProduceRequest};
/// use async_trait::async_trait;
///
/// struct DiscardProducer;
///
/// #[async_trait]
/// impl BrokerProducer for DiscardProducer {
///     async fn connect(&self) -> Result<()> {
///         Ok(())
///     }
///
///     async fn send(&self, _request: ProduceRequest) -> Result<()> {
///         Ok(())
///     }
///
///     async fn disconnect(&self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    async fn connect(&self) -> Result<()>;

    /// Deliver one request; the timeout, if any, is enforced here
    async fn send(&self, request: ProduceRequest) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Creates producers from connection and tuning config
pub trait BrokerClientFactory: Send + Sync {
    fn producer(
        &self,
        connection: &ConnectionConfig,
        tuning: &ProducerTuning,
    ) -> Result<Arc<dyn BrokerProducer>>;
}
