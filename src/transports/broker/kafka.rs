//! Kafka producer backed by librdkafka

use super::client::{BrokerClientFactory, BrokerProducer, ProduceRequest};
use super::config::{ConnectionConfig, ProducerTuning};
use crate::core::{LoggerError, Result};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds rdkafka producers from connection and tuning config
#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaClientFactory;

impl KafkaClientFactory {
    fn client_config(connection: &ConnectionConfig, tuning: &ProducerTuning) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", connection.brokers.join(","));
        if let Some(ref client_id) = connection.client_id {
            config.set("client.id", client_id);
        }
        if let Some(acks) = tuning.acks {
            config.set("acks", acks.as_i16().to_string());
        }
        if let Some(compression) = tuning.compression {
            config.set("compression.type", compression.as_str());
        }
        if let Some(idempotent) = tuning.idempotent {
            config.set("enable.idempotence", idempotent.to_string());
        }
        if let Some(allow) = tuning.allow_auto_topic_creation {
            config.set("allow.auto.create.topics", allow.to_string());
        }
        if let Some(timeout_ms) = tuning.timeout_ms {
            config.set("message.timeout.ms", timeout_ms.to_string());
        }
        // Explicit properties win over derived ones
        for (key, value) in &connection.properties {
            config.set(key, value);
        }
        config
    }
}

impl BrokerClientFactory for KafkaClientFactory {
    fn producer(
        &self,
        connection: &ConnectionConfig,
        tuning: &ProducerTuning,
    ) -> Result<Arc<dyn BrokerProducer>> {
        let producer: FutureProducer = Self::client_config(connection, tuning)
            .create()
            .map_err(|e| LoggerError::config("KafkaClient", e.to_string()))?;

        Ok(Arc::new(KafkaProducer {
            producer,
            brokers: connection.brokers.join(","),
        }))
    }
}

struct KafkaProducer {
    producer: FutureProducer,
    brokers: String,
}

#[async_trait]
impl BrokerProducer for KafkaProducer {
    async fn connect(&self) -> Result<()> {
        let producer = self.producer.clone();
        let brokers = self.brokers.clone();
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|_| ())
                .map_err(|e| LoggerError::delivery(brokers, e.to_string()))
        })
        .await
        .map_err(|e| LoggerError::delivery(self.brokers.as_str(), e.to_string()))?
    }

    async fn send(&self, request: ProduceRequest) -> Result<()> {
        let timeout = request.timeout.map_or(Timeout::Never, Timeout::After);

        for message in &request.messages {
            let mut record: FutureRecord<'_, [u8], [u8]> =
                FutureRecord::to(&request.topic).payload(message.value.as_slice());
            if let Some(ref key) = message.key {
                record = record.key(key.as_slice());
            }
            if let Some(partition) = message.partition {
                record = record.partition(partition);
            }
            if let Some(timestamp) = message.timestamp {
                record = record.timestamp(timestamp);
            }
            if !message.headers.is_empty() {
                let headers = message
                    .headers
                    .iter()
                    .fold(OwnedHeaders::new(), |headers, (key, value)| {
                        headers.insert(Header {
                            key,
                            value: Some(value.as_slice()),
                        })
                    });
                record = record.headers(headers);
            }

            self.producer
                .send(record, timeout)
                .await
                .map_err(|(e, _)| LoggerError::delivery(request.topic.as_str(), e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(FLUSH_TIMEOUT))
            .await
            .map_err(|e| LoggerError::delivery(self.brokers.as_str(), e.to_string()))?
            .map_err(|e| LoggerError::delivery(self.brokers.as_str(), e.to_string()))
    }
}
