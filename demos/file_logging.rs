//! File logging example
//!
//! Demonstrates daily rotated files with size limits, retention and gzip
//! archives.
//!
//! Run with: cargo run --example file_logging

use rust_sink_logger::prelude::*;

fn main() -> Result<()> {
    println!("=== Rust Sink Logger - File Logging Example ===\n");

    let dir = std::env::temp_dir().join("rust_sink_logger_demo");
    std::fs::create_dir_all(&dir)?;

    let logger = Logger::builder()
        .identity(&ServiceIdentity::new("DemoService", "demo-1").with_component("Files"))
        .sink(SinkDescriptor::file(
            FileSinkOptions::new("demo-%DATE%.log")
                .with_dirname(&dir)
                .with_max_size("8k")
                .with_max_files("3")
                .with_zipped_archive(true),
        )?)
        .sink(SinkDescriptor::file(
            FileSinkOptions::new("demo-%DATE%.jsonl")
                .with_dirname(&dir)
                .with_level(LogLevel::Warn)
                .with_format(OutputFormat::Json)
                .synchronous(true),
        )?)
        .build()?;

    for i in 0..500 {
        logger.info(format!("Processing item {}", i));
        if i % 100 == 0 {
            logger.warn(format!("Checkpoint at item {}", i));
        }
    }
    logger.flush()?;
    logger.close();

    println!("Files in {}:", dir.display());
    let mut entries: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        println!("  {} ({} bytes)", entry.file_name().to_string_lossy(), size);
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
