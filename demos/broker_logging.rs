//! Broker logging example
//!
//! Demonstrates a console sink plus a broker sink, a custom value encoder
//! and a diagnostics callback. Uses the in-process broker unless built with
//! `--features kafka` and `KAFKA_BROKERS` is set.
//!
//! Run with: cargo run --example broker_logging

use rust_sink_logger::core::parse_label;
use rust_sink_logger::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Rust Sink Logger - Broker Logging Example ===\n");

    let broker = MemoryBroker::new();
    let mut consumer = broker.subscribe("test_topic");

    let brokers = std::env::var("KAFKA_BROKERS").ok();
    let connection = ConnectionConfig::new(
        brokers
            .as_deref()
            .unwrap_or("127.0.0.1:29092")
            .split(',')
            .map(str::to_string),
    )
    .with_client_id("broker-demo");

    let producer = ProducerTuning::default()
        .with_acks(Acks::All)
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(5))
        .with_value_encoder(|record: &LogRecord| {
            let fields = parse_label(record.routing_label());
            Ok(serde_json::to_vec(&json!({
                "serviceName": fields.service_name(),
                "component": fields.component(),
                "level": record.level,
                "message": record.message,
            }))?)
        });

    let mut config = BrokerTransportConfig::new(connection, "test_topic")
        .with_producer(producer)
        .with_diagnostics(Diagnostics::with_callback(Arc::new(|event: &DiagnosticEvent| {
            println!("   diagnostics: {}", event);
        })));
    if !(cfg!(feature = "kafka") && brokers.is_some()) {
        config = config.with_client_factory(Arc::new(broker.clone()));
    }

    let identity = ServiceIdentity::new("DemoService", "demo-1").with_component("A");
    let logger = Logger::builder()
        .identity(&identity)
        .sink(SinkDescriptor::console())
        .sink(SinkDescriptor::broker(config)?)
        .build()?;

    if let Err(e) = logger.ready().await {
        println!("Broker unavailable ({}); records still reach the console", e);
    }

    logger.info("HELLO");
    logger
        .child(Some(identity.child("B").generator()))
        .error("HELLO CHILD");

    logger.shutdown().await;

    println!("\nReceived from the in-process broker:");
    while let Some(message) = consumer.try_recv() {
        println!("   {}", message.value_str().unwrap_or("<binary>"));
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
