//! Message-broker transport
//!
//! [`BrokerTransport`] encodes each record into exactly one message and hands
//! it to a background dispatcher task that owns the producer. Logging never
//! waits for the broker: the connect, every send, and the final disconnect
//! happen on the runtime returned by `core::runtime`, and their failures are
//! reported through [`Diagnostics`] only.
//!
//! Records logged while the producer is still connecting are queued by the
//! dispatcher and sent once the connection resolves.

mod client;
mod config;
#[cfg(feature = "kafka")]
mod kafka;
mod memory;

pub use client::{BrokerClientFactory, BrokerMessage, BrokerProducer, ProduceRequest};
pub use config::{
    Acks, BrokerTransportConfig, Compression, ConnectionConfig, KeyEncoder, ProducerTuning,
    TimestampEncoder, ValueEncoder,
};
#[cfg(feature = "kafka")]
pub use kafka::KafkaClientFactory;
pub use memory::{MemoryBroker, MemoryConsumer, StoredMessage};

use crate::core::diagnostics::panic_message;
use crate::core::runtime::background_handle;
use crate::core::{
    DeliveryMetrics, DiagnosticEvent, Diagnostics, LogRecord, LoggedCallback, LoggerError, Result,
    Transport, TransportOptions,
};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Connection lifecycle of a broker transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerState {
    Uninitialized,
    Connecting,
    Ready,
    /// Connect failed; records are discarded until close
    Failed,
    Closed,
}

impl BrokerState {
    /// Whether connecting has finished one way or another
    pub fn is_settled(&self) -> bool {
        !matches!(self, BrokerState::Uninitialized | BrokerState::Connecting)
    }
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerState::Uninitialized => "uninitialized",
            BrokerState::Connecting => "connecting",
            BrokerState::Ready => "ready",
            BrokerState::Failed => "failed",
            BrokerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(feature = "kafka")]
fn default_client_factory() -> Result<Arc<dyn BrokerClientFactory>> {
    Ok(Arc::new(KafkaClientFactory))
}

#[cfg(not(feature = "kafka"))]
fn default_client_factory() -> Result<Arc<dyn BrokerClientFactory>> {
    Err(LoggerError::config(
        "BrokerTransport",
        "no broker client factory configured (enable the `kafka` feature or supply one)",
    ))
}

enum Command {
    Deliver(ProduceRequest),
    Close,
}

/// Transport that publishes records to one broker topic
pub struct BrokerTransport {
    name: String,
    topic: String,
    tuning: ProducerTuning,
    options: TransportOptions,
    on_logged: Option<LoggedCallback>,
    diagnostics: Diagnostics,
    metrics: Arc<DeliveryMetrics>,
    state: Arc<watch::Sender<BrokerState>>,
    commands: mpsc::UnboundedSender<Command>,
    closing: bool,
}

impl BrokerTransport {
    /// Validate `config`, create the producer and start connecting
    ///
    /// Returns as soon as the dispatcher is spawned; connection failures are
    /// only visible through diagnostics and [`BrokerHandle::ready`].
    ///
    /// # Errors
    ///
    /// `ErrorKind::Configuration` for an invalid config, a missing client
    /// factory, or a factory that rejects the config.
    pub fn new(config: BrokerTransportConfig) -> Result<Self> {
        config.validate()?;

        let BrokerTransportConfig {
            connection,
            topic,
            producer: tuning,
            transport: options,
            client_factory,
            on_logged,
            diagnostics,
        } = config;
        let (Some(connection), Some(topic)) = (connection, topic) else {
            return Err(LoggerError::config(
                "BrokerTransport",
                "connection config and topic are required",
            ));
        };

        let factory = match client_factory {
            Some(factory) => factory,
            None => default_client_factory()?,
        };
        let runtime = background_handle()?;
        let connection = connection.with_resolved_client_id();
        let producer = factory.producer(&connection, &tuning)?;

        let name = format!("broker[{}]", topic);
        let diagnostics = diagnostics.unwrap_or_default();
        let metrics = Arc::new(DeliveryMetrics::new());
        let (state, _) = watch::channel(BrokerState::Uninitialized);
        let state = Arc::new(state);
        let (commands, receiver) = mpsc::unbounded_channel();

        state.send_replace(BrokerState::Connecting);
        let dispatcher = Dispatcher {
            name: name.clone(),
            producer,
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            diagnostics: diagnostics.clone(),
        };
        runtime.spawn(dispatcher.run(receiver));

        Ok(Self {
            name,
            topic,
            tuning,
            options,
            on_logged,
            diagnostics,
            metrics,
            state,
            commands,
            closing: false,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> BrokerState {
        *self.state.borrow()
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    /// Observer for readiness and shutdown, usable after the transport moved
    pub fn handle(&self) -> BrokerHandle {
        BrokerHandle {
            name: self.name.clone(),
            topic: self.topic.clone(),
            state: self.state.subscribe(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    fn encode(&self, record: &LogRecord) -> Result<BrokerMessage> {
        let tuning = &self.tuning;

        let key = match (tuning.message_key.as_deref(), tuning.key_encoder.as_ref()) {
            (Some(key), Some(encoder)) => Some(guarded("key_encoder", || encoder(key))?),
            (Some(key), None) => Some(key.as_bytes().to_vec()),
            (None, _) => None,
        };

        let value = match tuning.value_encoder {
            Some(ref encoder) => guarded("value_encoder", || encoder(record))?,
            None => record
                .to_json_bytes()
                .map_err(|e| LoggerError::encoding("json", e.to_string()))?,
        };

        let timestamp = match tuning.timestamp_encoder {
            Some(ref encoder) => Some(guarded("timestamp_encoder", || encoder(record))?),
            None => None,
        };

        Ok(BrokerMessage {
            key,
            value,
            partition: tuning.partition,
            headers: tuning
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().into_bytes()))
                .collect(),
            timestamp,
        })
    }
}

/// Run a user encoder, turning both errors and panics into encoding errors
fn guarded<T>(encoder: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e @ LoggerError::Encoding { .. })) => Err(e),
        Ok(Err(e)) => Err(LoggerError::encoding(encoder, e.to_string())),
        Err(payload) => Err(LoggerError::encoding(
            encoder,
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

impl Transport for BrokerTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn log(&mut self, record: &LogRecord) -> Result<()> {
        if self.closing {
            self.metrics.record_rejected();
            self.diagnostics.report(DiagnosticEvent::RejectedAfterClose {
                transport: self.name.clone(),
            });
            return Ok(());
        }

        if let Some(ref on_logged) = self.on_logged {
            on_logged(record);
        }
        self.metrics.record_accepted();

        let message = match self.encode(record) {
            Ok(message) => message,
            Err(error) => {
                self.metrics.record_encoding_failure();
                self.diagnostics.report(DiagnosticEvent::EncodingFailed {
                    transport: self.name.clone(),
                    error,
                });
                return Ok(());
            }
        };

        let request = ProduceRequest {
            topic: self.topic.clone(),
            messages: vec![message],
            acks: self.tuning.acks,
            timeout: self.tuning.timeout(),
            compression: self.tuning.compression,
        };

        // The dispatcher only disappears when its runtime was shut down
        if self.commands.send(Command::Deliver(request)).is_err() {
            self.metrics.record_delivery_failure();
            self.diagnostics.report(DiagnosticEvent::DeliveryFailed {
                transport: self.name.clone(),
                error: LoggerError::transport_closed(self.name.as_str()),
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        if self.commands.send(Command::Close).is_err() {
            self.state.send_replace(BrokerState::Closed);
        }
    }
}

impl Drop for BrokerTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BrokerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerTransport")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("tuning", &self.tuning)
            .field("closing", &self.closing)
            .finish()
    }
}

/// Owns the producer; runs on the background runtime
struct Dispatcher {
    name: String,
    producer: Arc<dyn BrokerProducer>,
    state: Arc<watch::Sender<BrokerState>>,
    metrics: Arc<DeliveryMetrics>,
    diagnostics: Diagnostics,
}

impl Dispatcher {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let connected = match self.producer.connect().await {
            Ok(()) => {
                self.state.send_replace(BrokerState::Ready);
                self.diagnostics.report(DiagnosticEvent::Connected {
                    transport: self.name.clone(),
                });
                true
            }
            Err(error) => {
                self.state.send_replace(BrokerState::Failed);
                self.diagnostics.report(DiagnosticEvent::ConnectFailed {
                    transport: self.name.clone(),
                    error,
                });
                false
            }
        };

        // Sends are awaited one at a time so the broker sees emission order.
        // The producer's request timeout bounds each one.
        while let Some(command) = commands.recv().await {
            let request = match command {
                Command::Deliver(request) => request,
                Command::Close => break,
            };

            if !connected {
                self.metrics.record_delivery_failure();
                self.diagnostics.report(DiagnosticEvent::DeliveryFailed {
                    transport: self.name.clone(),
                    error: LoggerError::delivery(request.topic, "producer is not connected"),
                });
                continue;
            }

            match self.producer.send(request).await {
                Ok(()) => {
                    self.metrics.record_delivered();
                }
                Err(error) => {
                    self.metrics.record_delivery_failure();
                    self.diagnostics.report(DiagnosticEvent::DeliveryFailed {
                        transport: self.name.clone(),
                        error,
                    });
                }
            }
        }

        if connected {
            match self.producer.disconnect().await {
                Ok(()) => self.diagnostics.report(DiagnosticEvent::Disconnected {
                    transport: self.name.clone(),
                }),
                Err(error) => self.diagnostics.report(DiagnosticEvent::DisconnectFailed {
                    transport: self.name.clone(),
                    error,
                }),
            }
        }
        self.state.send_replace(BrokerState::Closed);
    }
}

/// Clonable observer of a [`BrokerTransport`]
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    name: String,
    topic: String,
    state: watch::Receiver<BrokerState>,
    metrics: Arc<DeliveryMetrics>,
}

impl BrokerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> BrokerState {
        *self.state.borrow()
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    /// Wait until the producer is connected
    ///
    /// # Errors
    ///
    /// `ErrorKind::Delivery` if connecting failed or the transport closed
    /// first.
    pub async fn ready(&self) -> Result<()> {
        let mut state = self.state.clone();
        let settled = state.wait_for(BrokerState::is_settled).await.map(|s| *s);
        match settled {
            Ok(BrokerState::Ready) => Ok(()),
            Ok(BrokerState::Failed) => Err(LoggerError::delivery(
                self.topic.as_str(),
                "broker connection failed",
            )),
            _ => Err(LoggerError::transport_closed(self.name.as_str())),
        }
    }

    /// Wait until the disconnect finished
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == BrokerState::Closed).await;
    }
}
