//! In-process broker
//!
//! Topics are append-only message lists with per-topic offsets. Consumers
//! subscribed to a topic see every message produced after they subscribed.
//! Connection and send failures, as well as send latency, can be injected.

use super::client::{BrokerClientFactory, BrokerMessage, BrokerProducer, ProduceRequest};
use super::config::{Acks, Compression, ConnectionConfig, ProducerTuning};
use crate::core::{LoggerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A message as the broker stored it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub topic: String,
    pub offset: u64,
    pub message: BrokerMessage,
    pub acks: Option<Acks>,
    pub compression: Option<Compression>,
    pub client_id: String,
}

impl StoredMessage {
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.message.value).ok()
    }

    pub fn key_str(&self) -> Option<&str> {
        self.message
            .key
            .as_deref()
            .and_then(|key| std::str::from_utf8(key).ok())
    }

    pub fn value_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.message.value)
    }
}

#[derive(Default)]
struct Topic {
    messages: Vec<StoredMessage>,
    subscribers: Vec<mpsc::UnboundedSender<StoredMessage>>,
}

#[derive(Default)]
struct Inner {
    topics: Mutex<HashMap<String, Topic>>,
    send_latency: Mutex<Option<Duration>>,
    fail_connections: AtomicBool,
    fail_sends: AtomicBool,
    connections: AtomicUsize,
    disconnections: AtomicUsize,
}

/// Shared in-process broker; clones refer to the same topics
///
/// # Example
///
/// ```
/// use rust_sink_logger::transports::broker::MemoryBroker;
///
/// let broker = MemoryBroker::new();
/// broker.create_topic("test_topic");
///
/// assert_eq!(broker.topics(), vec!["test_topic".to_string()]);
/// assert!(broker.messages("test_topic").is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_topic(&self, topic: &str) {
        self.inner.topics.lock().entry(topic.to_string()).or_default();
    }

    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Follow a topic from its current end, creating it if needed
    pub fn subscribe(&self, topic: &str) -> MemoryConsumer {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(sender);

        MemoryConsumer {
            topic: topic.to_string(),
            receiver,
        }
    }

    /// Everything stored on a topic, oldest first
    pub fn messages(&self, topic: &str) -> Vec<StoredMessage> {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    pub fn fail_connections(&self, fail: bool) {
        self.inner.fail_connections.store(fail, Ordering::Relaxed);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// Delay every send; a latency above the request timeout fails the send
    pub fn set_send_latency(&self, latency: Option<Duration>) {
        *self.inner.send_latency.lock() = latency;
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::Relaxed)
    }

    pub fn disconnection_count(&self) -> usize {
        self.inner.disconnections.load(Ordering::Relaxed)
    }

    fn send_latency(&self) -> Option<Duration> {
        *self.inner.send_latency.lock()
    }

    fn append(&self, request: ProduceRequest, client_id: &str, auto_create: bool) -> Result<()> {
        let mut topics = self.inner.topics.lock();
        if !auto_create && !topics.contains_key(&request.topic) {
            return Err(LoggerError::delivery(
                request.topic.as_str(),
                "unknown topic and auto-creation is disabled",
            ));
        }

        let topic = topics.entry(request.topic.clone()).or_default();
        for message in request.messages {
            let stored = StoredMessage {
                topic: request.topic.clone(),
                offset: topic.messages.len() as u64,
                message,
                acks: request.acks,
                compression: request.compression,
                client_id: client_id.to_string(),
            };
            topic
                .subscribers
                .retain(|subscriber| subscriber.send(stored.clone()).is_ok());
            topic.messages.push(stored);
        }
        Ok(())
    }
}

impl BrokerClientFactory for MemoryBroker {
    fn producer(
        &self,
        connection: &ConnectionConfig,
        tuning: &ProducerTuning,
    ) -> Result<Arc<dyn BrokerProducer>> {
        Ok(Arc::new(MemoryProducer {
            broker: self.clone(),
            client_id: connection.client_id.clone().unwrap_or_default(),
            auto_create: tuning.allow_auto_topic_creation.unwrap_or(true),
            connected: AtomicBool::new(false),
        }))
    }
}

struct MemoryProducer {
    broker: MemoryBroker,
    client_id: String,
    auto_create: bool,
    connected: AtomicBool,
}

#[async_trait]
impl BrokerProducer for MemoryProducer {
    async fn connect(&self) -> Result<()> {
        if self.broker.inner.fail_connections.load(Ordering::Relaxed) {
            return Err(LoggerError::delivery(
                self.client_id.as_str(),
                "connection refused",
            ));
        }
        self.connected.store(true, Ordering::Release);
        self.broker.inner.connections.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn send(&self, request: ProduceRequest) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(LoggerError::delivery(
                request.topic.as_str(),
                "producer is not connected",
            ));
        }

        if let Some(latency) = self.broker.send_latency() {
            match request.timeout {
                Some(timeout) if latency > timeout => {
                    tokio::time::sleep(timeout).await;
                    return Err(LoggerError::delivery(
                        request.topic.as_str(),
                        format!("request timed out after {}ms", timeout.as_millis()),
                    ));
                }
                _ => tokio::time::sleep(latency).await,
            }
        }

        if self.broker.inner.fail_sends.load(Ordering::Relaxed) {
            return Err(LoggerError::delivery(
                request.topic.as_str(),
                "broker rejected the request",
            ));
        }

        self.broker.append(request, &self.client_id, self.auto_create)
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.broker.inner.disconnections.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Receives messages produced to one topic after subscription
#[derive(Debug)]
pub struct MemoryConsumer {
    topic: String,
    receiver: mpsc::UnboundedReceiver<StoredMessage>,
}

impl MemoryConsumer {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn recv(&mut self) -> Option<StoredMessage> {
        self.receiver.recv().await
    }

    /// `None` if nothing arrives within `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<StoredMessage> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn try_recv(&mut self) -> Option<StoredMessage> {
        self.receiver.try_recv().ok()
    }
}
