//! Console transport

use crate::core::{LogLevel, LogRecord, Result, Transport, TransportOptions};
use crate::sinks::ConsoleSinkOptions;
use std::io::Write;

pub struct ConsoleTransport {
    options: ConsoleSinkOptions,
}

impl ConsoleTransport {
    pub fn new(options: ConsoleSinkOptions) -> Self {
        Self { options }
    }

    /// Colorized console bound at `verbose`, used when a logger has no sinks
    pub fn fallback() -> Self {
        Self::new(
            ConsoleSinkOptions::default()
                .with_colors(true)
                .with_level(LogLevel::Verbose),
        )
    }

    pub fn render(&self, record: &LogRecord) -> String {
        self.options.format.render(record, self.options.colors)
    }

    fn writes_to_stderr(&self, level: LogLevel) -> bool {
        self.options.stderr_levels.contains(&level)
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new(ConsoleSinkOptions::default())
    }
}

impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn options(&self) -> &TransportOptions {
        &self.options.transport
    }

    fn log(&mut self, record: &LogRecord) -> Result<()> {
        let output = self.render(record);
        if self.writes_to_stderr(record.level) {
            eprintln!("{}", output);
        } else {
            println!("{}", output);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputFormat;

    #[test]
    fn test_fallback_is_colorized_at_verbose() {
        let console = ConsoleTransport::fallback();
        assert!(console.options.colors);
        assert!(console.accepts(LogLevel::Verbose));
        assert!(console.accepts(LogLevel::Error));
        assert!(!console.accepts(LogLevel::Debug));
        assert!(!console.accepts(LogLevel::Silly));
    }

    #[test]
    fn test_render_plain_text() {
        let console = ConsoleTransport::new(ConsoleSinkOptions::default().with_colors(false));
        let record = LogRecord::new(LogLevel::Warn, "disk almost full", "SERVICE NAME: svc");
        let line = console.render(&record);

        assert!(line.starts_with("SERVICE NAME: svc | warn | "));
        assert!(line.ends_with(" | disk almost full"));
    }

    #[test]
    fn test_render_json() {
        let console = ConsoleTransport::new(
            ConsoleSinkOptions::default().with_format(OutputFormat::Json),
        );
        let record = LogRecord::new(LogLevel::Info, "ready", "");
        let value: serde_json::Value = serde_json::from_str(&console.render(&record)).unwrap();
        assert_eq!(value["message"], "ready");
    }

    #[test]
    fn test_error_goes_to_stderr_by_default() {
        let console = ConsoleTransport::default();
        assert!(console.writes_to_stderr(LogLevel::Error));
        assert!(!console.writes_to_stderr(LogLevel::Info));
    }
}
