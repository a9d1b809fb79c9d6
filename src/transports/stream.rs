//! Writer-backed transport

use crate::core::{LogRecord, LoggerError, Result, Transport, TransportOptions};
use crate::sinks::{StreamSinkOptions, StreamTarget};

/// Writes one rendered line per record to a shared writer (stdout by default)
pub struct StreamTransport {
    options: StreamSinkOptions,
    target: StreamTarget,
}

impl StreamTransport {
    pub fn new(options: StreamSinkOptions) -> Self {
        let target = options.target.clone().unwrap_or_else(StreamTarget::stdout);
        Self { options, target }
    }
}

impl Transport for StreamTransport {
    fn name(&self) -> &str {
        "stream"
    }

    fn options(&self) -> &TransportOptions {
        &self.options.transport
    }

    fn log(&mut self, record: &LogRecord) -> Result<()> {
        let line = self.options.format.render(record, false);
        self.target
            .write_line(&line)
            .map_err(|e| LoggerError::io_operation("writing log line", "stream write failed", e))
    }

    fn flush(&mut self) -> Result<()> {
        self.target
            .flush()
            .map_err(|e| LoggerError::io_operation("flushing stream", "stream flush failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, OutputFormat};
    use crate::sinks::SharedBuffer;

    #[test]
    fn test_writes_one_line_per_record() {
        let buffer = SharedBuffer::new();
        let mut stream = StreamTransport::new(StreamSinkOptions::new(buffer.clone()));

        stream.log(&LogRecord::new(LogLevel::Info, "first", "main")).unwrap();
        stream
            .log(&LogRecord::new(LogLevel::Error, "second", "main").with_child_label("child"))
            .unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("main | info | "));
        assert!(lines[1].starts_with("child | error | "));
    }

    #[test]
    fn test_json_lines() {
        let buffer = SharedBuffer::new();
        let options = StreamSinkOptions::new(buffer.clone()).with_format(OutputFormat::Json);
        let mut stream = StreamTransport::new(options);

        stream.log(&LogRecord::new(LogLevel::Http, "GET /", "")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&buffer.lines()[0]).unwrap();
        assert_eq!(value["level"], "http");
        assert!(value.get("childLabel").is_none());
    }

    #[test]
    fn test_write_failure_is_io_error() {
        struct Broken;
        impl std::io::Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut stream = StreamTransport::new(StreamSinkOptions::new(StreamTarget::new(Broken)));
        let err = stream.log(&LogRecord::new(LogLevel::Info, "x", "")).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Io);
    }
}
