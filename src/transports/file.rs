//! Daily-rotated file transport
//!
//! Files are named from a pattern containing `%DATE%`. A new file starts when
//! the rendered date changes or the current file would exceed `max_size`
//! (size-rotated files of the same date get a `.1`, `.2`, ... suffix).
//! Rotated files are optionally gzipped and pruned by count or age.
//!
//! By default writes are handed to a dedicated writer thread over a
//! `crossbeam-channel` queue, and the file is only opened on the first write.

use crate::core::diagnostics::panic_message;
use crate::core::{
    DiagnosticEvent, Diagnostics, LogRecord, LoggerError, OutputFormat, Result, Transport,
    TransportOptions,
};
use crate::sinks::{FileSinkOptions, Retention};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded, Sender};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

const DATE_PLACEHOLDER: &str = "%DATE%";
const MAX_DELETION_FAILURES: usize = 5;

/// Convert a `YYYY-MM-DD`-style pattern into a strftime format
///
/// Recognized tokens: `YYYY`, `YY`, `MM`, `DD`, `HH`, `mm`, `ss`. Everything
/// else is copied literally.
pub fn date_pattern_to_strftime(pattern: &str) -> String {
    const TOKENS: [(&str, &str); 7] = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

struct OpenFile {
    period: String,
    index: u32,
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
}

/// Synchronous writer implementing naming, rotation and retention
pub struct RotatingFileWriter {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    has_date: bool,
    date_format: String,
    max_size: Option<u64>,
    retention: Option<Retention>,
    zipped: bool,
    current: Option<OpenFile>,
    /// Consecutive failures to delete expired files
    deletion_failure_count: usize,
}

impl RotatingFileWriter {
    /// # Errors
    ///
    /// `ErrorKind::Configuration` for malformed option strings. Nothing is
    /// created on disk until the first write.
    pub fn new(options: &FileSinkOptions) -> Result<Self> {
        options.validate()?;

        let (prefix, suffix, has_date) = match options.filename.split_once(DATE_PLACEHOLDER) {
            Some((prefix, suffix)) => (prefix.to_string(), suffix.to_string(), true),
            None => (options.filename.clone(), String::new(), false),
        };

        Ok(Self {
            dir: options.dirname.clone().unwrap_or_else(|| PathBuf::from(".")),
            prefix,
            suffix,
            has_date,
            date_format: date_pattern_to_strftime(&options.date_pattern),
            max_size: options.max_size_bytes()?,
            retention: options.retention()?,
            zipped: options.zipped_archive,
            current: None,
            deletion_failure_count: 0,
        })
    }

    /// Path of the file currently written, if one is open
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|f| f.path.as_path())
    }

    fn path_for(&self, period: &str, index: u32) -> PathBuf {
        let mut name = if self.has_date {
            format!("{}{}{}", self.prefix, period, self.suffix)
        } else {
            self.prefix.clone()
        };
        if index > 0 {
            name.push_str(&format!(".{}", index));
        }
        self.dir.join(name)
    }

    /// Append one line, rotating first if `now` or the size limit require it
    pub fn write_at(&mut self, line: &str, now: DateTime<Utc>) -> Result<()> {
        let period = now.format(&self.date_format).to_string();
        let incoming = line.len() as u64 + 1;

        let next_index = match self.current {
            None => None,
            Some(ref file) if file.period != period => Some(0),
            Some(ref file) => match self.max_size {
                Some(max) if file.size > 0 && file.size + incoming > max => Some(file.index + 1),
                _ => None,
            },
        };

        match (self.current.is_some(), next_index) {
            (false, _) => self.open(&period, 0, now)?,
            (true, Some(index)) => {
                self.rotate()?;
                self.open(&period, index, now)?;
            }
            (true, None) => {}
        }

        let file = self
            .current
            .as_mut()
            .ok_or_else(|| LoggerError::writer("log file is not open"))?;
        file.writer.write_all(line.as_bytes())?;
        file.writer.write_all(b"\n")?;
        file.size += incoming;
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_at(line, Utc::now())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(ref mut file) = self.current {
            file.writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release the current file
    pub fn close(&mut self) -> Result<()> {
        match self.current.take() {
            Some(mut file) => file.writer.flush().map_err(LoggerError::from),
            None => Ok(()),
        }
    }

    /// Open the file for `period`, skipping past same-period files already full
    fn open(&mut self, period: &str, mut index: u32, now: DateTime<Utc>) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", self.dir.display()),
                e,
            )
        })?;

        let mut path = self.path_for(period, index);
        while let Some(max) = self.max_size {
            match fs::metadata(&path) {
                Ok(meta) if meta.len() >= max => {
                    index += 1;
                    path = self.path_for(period, index);
                }
                _ => break,
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "open log file",
                    format!("Failed to open '{}'", path.display()),
                    e,
                )
            })?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        self.current = Some(OpenFile {
            period: period.to_string(),
            index,
            path,
            writer: BufWriter::new(file),
            size,
        });
        self.prune(now)
    }

    /// Close the current file and archive it
    fn rotate(&mut self) -> Result<()> {
        let Some(mut file) = self.current.take() else {
            return Ok(());
        };

        file.writer.flush().map_err(|e| {
            LoggerError::file_rotation(
                file.path.display().to_string(),
                format!("Failed to flush before rotation: {}", e),
            )
        })?;
        let path = file.path.clone();
        drop(file);

        // Without %DATE% and size limits the next file can be the same one
        if self.zipped && path.exists() {
            compress_file(&path)?;
        }
        Ok(())
    }

    /// Whether `name` was produced by this writer's naming scheme
    fn is_managed_file(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let rest = rest.strip_suffix(".gz").unwrap_or(rest);
        let rest = match rest.rsplit_once('.') {
            Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                head
            }
            _ => rest,
        };
        if self.has_date {
            rest.len() > self.suffix.len() && rest.ends_with(self.suffix.as_str())
        } else {
            rest.is_empty()
        }
    }

    /// Delete expired files according to the retention policy
    fn prune(&mut self, now: DateTime<Utc>) -> Result<()> {
        let Some(retention) = self.retention else {
            return Ok(());
        };
        let active = self.current.as_ref().map(|f| f.path.clone());

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("[WARN] Cannot scan log directory {}: {}", self.dir.display(), e);
                return Ok(());
            }
        };

        let mut files: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.is_managed_file(name))
            })
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.path())
            })
            .filter(|(_, path)| Some(path) != active.as_ref())
            .collect();
        files.sort();

        let expired: Vec<PathBuf> = match retention {
            Retention::Count(keep) => {
                // The active file counts towards the limit
                let keep_rotated = keep.saturating_sub(1);
                let excess = files.len().saturating_sub(keep_rotated);
                files.into_iter().take(excess).map(|(_, path)| path).collect()
            }
            Retention::Days(days) => {
                let cutoff = SystemTime::from(now)
                    .checked_sub(Duration::from_secs(u64::from(days) * 24 * 60 * 60))
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files
                    .into_iter()
                    .filter(|(modified, _)| *modified < cutoff)
                    .map(|(_, path)| path)
                    .collect()
            }
        };

        let mut deletion_failed = false;
        for path in expired {
            if let Err(e) = fs::remove_file(&path) {
                deletion_failed = true;
                eprintln!(
                    "[WARN] Failed to remove expired log file {}: {} (failure #{}/{})",
                    path.display(),
                    e,
                    self.deletion_failure_count + 1,
                    MAX_DELETION_FAILURES
                );
            }
        }

        if !deletion_failed {
            self.deletion_failure_count = 0;
            return Ok(());
        }
        self.deletion_failure_count += 1;
        if self.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.dir.display().to_string(),
                format!(
                    "failed to delete expired log files {} consecutive times",
                    self.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }
}

/// Gzip `path` into `path.gz` through a temporary file, then remove `path`
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let gz_path = with_appended_extension(path, "gz");
    let temp_gz_path = with_appended_extension(path, "gz.tmp");

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_gz_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_gz_path.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed = loop {
        match reader.read(&mut buffer) {
            Ok(0) => break Ok(()),
            Ok(n) => {
                if let Err(e) = encoder.write_all(&buffer[..n]) {
                    break Err(e);
                }
            }
            Err(e) => break Err(e),
        }
    };

    let finished = streamed
        .and_then(|()| encoder.finish())
        .and_then(|mut writer| writer.flush());
    if let Err(e) = finished {
        let _ = fs::remove_file(&temp_gz_path);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp_gz_path, &gz_path).map_err(|e| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz_path.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[WARN] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

enum WriterCommand {
    Write(String, DateTime<Utc>),
    Flush(Sender<Result<()>>),
    Close,
}

enum Backend {
    Direct(RotatingFileWriter),
    Worker {
        commands: Sender<WriterCommand>,
        thread: Option<JoinHandle<()>>,
    },
    Closed,
}

pub struct FileTransport {
    name: String,
    options: TransportOptions,
    format: OutputFormat,
    backend: Backend,
    diagnostics: Diagnostics,
}

impl FileTransport {
    /// # Errors
    ///
    /// `ErrorKind::Configuration` for malformed options; `ErrorKind::Io` if
    /// the writer thread cannot be started.
    pub fn new(options: FileSinkOptions, diagnostics: Diagnostics) -> Result<Self> {
        let writer = RotatingFileWriter::new(&options)?;
        let name = format!("file[{}]", options.filename);

        let backend = if options.synchronous {
            Backend::Direct(writer)
        } else {
            Self::spawn_worker(name.clone(), writer, diagnostics.clone())?
        };

        Ok(Self {
            name,
            options: options.transport,
            format: options.format,
            backend,
            diagnostics,
        })
    }

    fn spawn_worker(
        name: String,
        mut writer: RotatingFileWriter,
        diagnostics: Diagnostics,
    ) -> Result<Backend> {
        let (commands, receiver) = unbounded::<WriterCommand>();

        let thread = thread::Builder::new()
            .name("logger-file-writer".to_string())
            .spawn(move || {
                for command in receiver {
                    match command {
                        WriterCommand::Write(line, at) => {
                            if let Err(error) = writer.write_at(&line, at) {
                                diagnostics.report(DiagnosticEvent::TransportFailed {
                                    transport: name.clone(),
                                    error,
                                });
                            }
                        }
                        WriterCommand::Flush(ack) => {
                            let _ = ack.send(writer.flush());
                        }
                        WriterCommand::Close => break,
                    }
                }
                if let Err(error) = writer.close() {
                    diagnostics.report(DiagnosticEvent::TransportFailed {
                        transport: name,
                        error,
                    });
                }
            })
            .map_err(|e| {
                LoggerError::io_operation("start file writer", "cannot spawn writer thread", e)
            })?;

        Ok(Backend::Worker {
            commands,
            thread: Some(thread),
        })
    }
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn log(&mut self, record: &LogRecord) -> Result<()> {
        let line = self.format.render(record, false);
        match self.backend {
            Backend::Direct(ref mut writer) => writer.write_at(&line, record.timestamp),
            Backend::Worker { ref commands, .. } => commands
                .send(WriterCommand::Write(line, record.timestamp))
                .map_err(|_| LoggerError::transport_closed(self.name.as_str())),
            Backend::Closed => Err(LoggerError::transport_closed(self.name.as_str())),
        }
    }

    /// Blocks until the writer thread has flushed everything queued before
    fn flush(&mut self) -> Result<()> {
        match self.backend {
            Backend::Direct(ref mut writer) => writer.flush(),
            Backend::Worker { ref commands, .. } => {
                let (ack, done) = bounded(1);
                commands
                    .send(WriterCommand::Flush(ack))
                    .map_err(|_| LoggerError::transport_closed(self.name.as_str()))?;
                done.recv()
                    .map_err(|_| LoggerError::transport_closed(self.name.as_str()))?
            }
            Backend::Closed => Ok(()),
        }
    }

    fn close(&mut self) {
        match std::mem::replace(&mut self.backend, Backend::Closed) {
            Backend::Direct(mut writer) => {
                if let Err(error) = writer.close() {
                    self.diagnostics.report(DiagnosticEvent::TransportFailed {
                        transport: self.name.clone(),
                        error,
                    });
                }
            }
            Backend::Worker { commands, thread } => {
                let _ = commands.send(WriterCommand::Close);
                if let Some(thread) = thread {
                    if let Err(payload) = thread.join() {
                        self.diagnostics.report(DiagnosticEvent::TransportPanicked {
                            transport: self.name.clone(),
                            message: panic_message(payload.as_ref()),
                        });
                    }
                }
            }
            Backend::Closed => {}
        }
    }
}

impl Drop for FileTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().unwrap()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_date_pattern_conversion() {
        assert_eq!(date_pattern_to_strftime("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(date_pattern_to_strftime("YYYY-MM-DD-HH"), "%Y-%m-%d-%H");
        assert_eq!(date_pattern_to_strftime("YY.MM.DD_HHmmss"), "%y.%m.%d_%H%M%S");
        assert_eq!(date_pattern_to_strftime("100%"), "100%%");
    }

    #[test]
    fn test_nothing_created_before_first_write() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        let options = FileSinkOptions::new("app-%DATE%.log").with_dirname(&logs);
        let writer = RotatingFileWriter::new(&options).unwrap();

        assert!(writer.current_path().is_none());
        assert!(!logs.exists());
    }

    #[test]
    fn test_daily_rotation() {
        let dir = tempdir().unwrap();
        let options = FileSinkOptions::new("app-%DATE%.log").with_dirname(dir.path());
        let mut writer = RotatingFileWriter::new(&options).unwrap();

        writer.write_at("day one", at(2024, 3, 1)).unwrap();
        writer.write_at("day two", at(2024, 3, 2)).unwrap();
        writer.close().unwrap();

        assert_eq!(
            file_names(dir.path()),
            vec!["app-2024-03-01.log".to_string(), "app-2024-03-02.log".to_string()]
        );
        let second = fs::read_to_string(dir.path().join("app-2024-03-02.log")).unwrap();
        assert_eq!(second, "day two\n");
    }

    #[test]
    fn test_size_rotation_adds_index() {
        let dir = tempdir().unwrap();
        let options = FileSinkOptions::new("app-%DATE%.log")
            .with_dirname(dir.path())
            .with_max_size("1k");
        let mut writer = RotatingFileWriter::new(&options).unwrap();

        let line = "x".repeat(600);
        for _ in 0..3 {
            writer.write_at(&line, at(2024, 3, 1)).unwrap();
        }
        writer.close().unwrap();

        assert_eq!(
            file_names(dir.path()),
            vec![
                "app-2024-03-01.log".to_string(),
                "app-2024-03-01.log.1".to_string(),
                "app-2024-03-01.log.2".to_string(),
            ]
        );
    }

    #[test]
    fn test_zipped_archive() {
        let dir = tempdir().unwrap();
        let options = FileSinkOptions::new("app-%DATE%.log")
            .with_dirname(dir.path())
            .with_zipped_archive(true);
        let mut writer = RotatingFileWriter::new(&options).unwrap();

        writer.write_at("archived", at(2024, 3, 1)).unwrap();
        writer.write_at("active", at(2024, 3, 2)).unwrap();
        writer.close().unwrap();

        let names = file_names(dir.path());
        assert!(names.contains(&"app-2024-03-01.log.gz".to_string()));
        assert!(names.contains(&"app-2024-03-02.log".to_string()));
        assert!(!names.contains(&"app-2024-03-01.log".to_string()));

        let gz = File::open(dir.path().join("app-2024-03-01.log.gz")).unwrap();
        let mut decoded = String::new();
        std::io::Read::read_to_string(&mut flate2::read::GzDecoder::new(gz), &mut decoded).unwrap();
        assert_eq!(decoded, "archived\n");
    }

    #[test]
    fn test_count_retention() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("unrelated.txt"), "keep me").unwrap();
        let options = FileSinkOptions::new("app-%DATE%.log")
            .with_dirname(dir.path())
            .with_max_files("2");
        let mut writer = RotatingFileWriter::new(&options).unwrap();

        for day in 1..=4 {
            writer.write_at("entry", at(2024, 3, day)).unwrap();
            writer.flush().unwrap();
        }
        writer.close().unwrap();

        let names = file_names(dir.path());
        assert_eq!(names.len(), 3, "{:?}", names);
        assert!(names.contains(&"unrelated.txt".to_string()));
        assert!(names.contains(&"app-2024-03-04.log".to_string()));
    }

    #[test]
    fn test_managed_file_matching() {
        let options = FileSinkOptions::new("app-%DATE%.log");
        let writer = RotatingFileWriter::new(&options).unwrap();

        assert!(writer.is_managed_file("app-2024-03-01.log"));
        assert!(writer.is_managed_file("app-2024-03-01.log.3"));
        assert!(writer.is_managed_file("app-2024-03-01.log.gz"));
        assert!(!writer.is_managed_file("app-.log"));
        assert!(!writer.is_managed_file("other-2024-03-01.log"));
    }

    #[test]
    fn test_background_writer_flush() {
        let dir = tempdir().unwrap();
        let options = FileSinkOptions::new("worker-%DATE%.log").with_dirname(dir.path());
        let mut transport = FileTransport::new(options, Diagnostics::stderr()).unwrap();

        for i in 0..50 {
            let mut record = LogRecord::new(LogLevel::Info, format!("line {}", i), "main");
            record.timestamp = at(2024, 3, 1);
            transport.log(&record).unwrap();
        }
        transport.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("worker-2024-03-01.log")).unwrap();
        assert_eq!(content.lines().count(), 50);
        assert!(content.lines().all(|l| l.starts_with("main | info | 2024-03-01 12:00:00.000")));

        transport.close();
        transport.close();
        assert!(transport.log(&LogRecord::new(LogLevel::Info, "late", "main")).is_err());
    }

    #[test]
    fn test_synchronous_writer() {
        let dir = tempdir().unwrap();
        let options = FileSinkOptions::new("sync.log")
            .with_dirname(dir.path())
            .synchronous(true);
        let mut transport = FileTransport::new(options, Diagnostics::stderr()).unwrap();

        transport
            .log(&LogRecord::new(LogLevel::Warn, "direct", "main"))
            .unwrap();
        transport.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("sync.log")).unwrap();
        assert!(content.contains("| warn |"));
    }

    #[test]
    fn test_malformed_options_rejected() {
        let options = FileSinkOptions::new("app.log").with_max_files("forever");
        assert!(FileTransport::new(options, Diagnostics::stderr()).is_err());
    }
}
