//! Basic logger usage example
//!
//! Demonstrates console logging, labels, child loggers and level filtering.
//!
//! Run with: cargo run --example basic_usage

use rust_sink_logger::prelude::*;

fn main() -> Result<()> {
    println!("=== Rust Sink Logger - Basic Usage Example ===\n");

    let identity = ServiceIdentity::new("DemoService", "demo-1")
        .with_module("basic_usage.rs")
        .with_component("Main")
        .for_current_process();

    // Console sink that shows every level
    let mut logger = Logger::builder()
        .min_level(LogLevel::Silly)
        .identity(&identity)
        .sink(SinkDescriptor::Console(
            ConsoleSinkOptions::default().with_level(LogLevel::Silly),
        ))
        .build()?;

    println!("1. Logging at different levels:");
    logger.silly("This is a silly message");
    logger.debug("This is a debug message");
    logger.verbose("This is a verbose message");
    logger.http("GET /health 200");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");

    println!("\n2. A child logger with its own label:");
    let child = logger.child(Some(identity.child("Worker").generator()));
    child.info("Child records carry the child label");

    println!("\n3. Logging with a higher minimum level:");
    logger.set_min_level(LogLevel::Warn);
    logger.info("Info message (hidden)");
    logger.warn("Warning message (visible)");

    println!("\n4. With no sinks configured, records go to the console:");
    let fallback = build_logger(LoggerConfig::default(), Vec::new())?;
    fallback.info("Delivered by the fallback console sink");

    logger.close();
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
