//! Stress tests for concurrent logging
//!
//! These tests verify:
//! - No record is lost or interleaved when many threads share one logger
//! - Child loggers on different threads keep their own labels
//! - The broker transport delivers every record, in order, under load
//! - Rotating files account for every record

use rust_sink_logger::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const THREADS: usize = 8;
const PER_THREAD: usize = 250;

/// Spawn `THREADS` workers, each logging `PER_THREAD` records through a child
fn hammer(logger: &Logger) {
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let child = logger.child_with_label(format!("worker-{}", t));
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    child.info(format!("{}:{}", t, i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
}

/// Check that each worker's records arrive complete and in order
fn assert_per_worker_order<'a>(records: impl IntoIterator<Item = (&'a str, &'a str)>) {
    let mut next: HashMap<String, usize> = HashMap::new();
    for (label, message) in records {
        let (worker, index) = message.split_once(':').expect("worker:index message");
        assert_eq!(label, format!("worker-{}", worker));

        let expected = next.entry(worker.to_string()).or_insert(0);
        assert_eq!(index.parse::<usize>().unwrap(), *expected);
        *expected += 1;
    }

    assert_eq!(next.len(), THREADS);
    assert!(next.values().all(|count| *count == PER_THREAD));
}

#[test]
fn test_concurrent_stream_logging() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder()
        .sink(SinkDescriptor::stream(buffer.clone()))
        .build()
        .unwrap();

    hammer(&logger);
    logger.flush().unwrap();

    let lines = buffer.lines();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    assert_per_worker_order(lines.iter().map(|line| {
        let parts: Vec<&str> = line.splitn(4, " | ").collect();
        assert_eq!(parts.len(), 4, "interleaved line: {}", line);
        (parts[0], parts[3])
    }));
    assert_eq!(logger.metrics().emitted(), (THREADS * PER_THREAD) as u64);
}

#[test]
fn test_concurrent_broker_logging() {
    let broker = MemoryBroker::new();
    let config = BrokerTransportConfig::new(ConnectionConfig::new(["127.0.0.1:29092"]), "stress")
        .with_client_factory(Arc::new(broker.clone()));
    let logger = Logger::builder()
        .sink(SinkDescriptor::broker(config).unwrap())
        .build()
        .unwrap();

    // No ambient runtime here; the broker runs on the shared background runtime
    tokio_test::block_on(logger.ready()).unwrap();
    hammer(&logger);
    tokio_test::block_on(logger.shutdown());

    let values: Vec<serde_json::Value> = broker
        .messages("stress")
        .iter()
        .map(|message| message.value_json().unwrap())
        .collect();
    assert_eq!(values.len(), THREADS * PER_THREAD);

    assert_per_worker_order(values.iter().map(|value| {
        (
            value["childLabel"].as_str().unwrap(),
            value["message"].as_str().unwrap(),
        )
    }));

    let metrics = logger.broker_handles()[0].metrics();
    assert_eq!(metrics.accepted(), (THREADS * PER_THREAD) as u64);
    assert_eq!(metrics.delivery_failures(), 0);
}

#[test]
fn test_broker_burst_order_on_background_runtime() {
    let broker = MemoryBroker::new();
    let config = BrokerTransportConfig::new(ConnectionConfig::new(["127.0.0.1:29092"]), "burst")
        .with_client_factory(Arc::new(broker.clone()));
    let logger = Logger::builder()
        .sink(SinkDescriptor::broker(config).unwrap())
        .build()
        .unwrap();

    // Logged before the connection settles, then drained in one go
    for i in 0..200 {
        logger.info(i.to_string());
    }
    tokio_test::block_on(logger.ready()).unwrap();
    for i in 200..400 {
        logger.info(i.to_string());
    }
    tokio_test::block_on(logger.shutdown());

    let messages: Vec<String> = broker
        .messages("burst")
        .iter()
        .map(|message| message.value_json().unwrap()["message"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..400).map(|i| i.to_string()).collect();
    assert_eq!(messages, expected);
}

#[test]
fn test_rotating_file_under_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::builder()
        .sink(
            SinkDescriptor::file(
                FileSinkOptions::new("stress-%DATE%.log")
                    .with_dirname(temp_dir.path())
                    .with_max_size("16k"),
            )
            .unwrap(),
        )
        .build()
        .unwrap();

    hammer(&logger);
    logger.flush().unwrap();
    logger.close();

    let mut files: Vec<_> = fs::read_dir(temp_dir.path())
        .expect("Failed to read temp dir")
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    assert!(files.len() > 1, "expected size rotation, got {:?}", files);

    let total: usize = files
        .iter()
        .map(|path| fs::read_to_string(path).unwrap().lines().count())
        .sum();
    assert_eq!(total, THREADS * PER_THREAD);
}

#[test]
fn test_close_while_logging() {
    let buffer = SharedBuffer::new();
    let logger = Logger::builder()
        .sink(SinkDescriptor::stream(buffer.clone()))
        .build()
        .unwrap();

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    logger.warn(format!("{}:{}", t, i));
                }
            })
        })
        .collect();
    logger.close();
    for writer in writers {
        writer.join().expect("writer thread panicked");
    }

    let metrics = logger.metrics();
    assert_eq!(
        metrics.emitted() + metrics.rejected(),
        (THREADS * PER_THREAD) as u64
    );
    assert!(buffer.lines().len() as u64 <= metrics.emitted());
}
