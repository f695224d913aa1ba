//! Structured logging.
//!
//! # Responsibilities
//! - Emit leveled, field-tagged request records to every registered sink
//! - Bind fields (the correlation id) once per request via [`Logger::with`]
//! - Initialize the process diagnostics subscriber
//!
//! # Design Decisions
//! - Request records are JSON lines, one object per record
//! - Sinks are written synchronously, in registration order
//! - A failing sink is reported through diagnostics and skipped; it never
//!   fails the caller
//! - Process diagnostics (startup, shutdown, sink faults, span export) go
//!   through `tracing` on stderr so they never interleave with the
//!   request stream on stdout

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::value::{set_field, FieldValue, Fields};

/// Severity of a request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Render as a single JSON object line (without trailing newline).
    pub fn to_json_line(&self) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert("level".into(), self.level.as_str().into());
        obj.insert(
            "time".into(),
            self.timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into(),
        );
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.into());
        }
        obj.insert("message".into(), self.message.clone().into());
        serde_json::Value::Object(obj).to_string()
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Short name used when reporting sink failures.
    fn name(&self) -> &str;

    fn write(&self, record: &LogRecord) -> io::Result<()>;
}

/// JSON lines on stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&self, record: &LogRecord) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", record.to_json_line())
    }
}

/// Append-only JSON lines file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open `path` for appending, creating the parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileSinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| FileSinkError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| FileSinkError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write(&self, record: &LogRecord) -> io::Result<()> {
        let mut line = record.to_json_line();
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())
    }
}

/// Errors opening a [`FileSink`].
#[derive(Debug, thiserror::Error)]
pub enum FileSinkError {
    #[error("unable to create log directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },

    #[error("unable to open log file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, record: &LogRecord) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Structured logger with bound fields.
///
/// Cloning is cheap; sinks and bound fields are shared.
#[derive(Clone)]
pub struct Logger {
    sinks: Arc<Vec<Arc<dyn LogSink>>>,
    bound: Arc<Fields>,
}

impl Logger {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
            bound: Arc::new(Fields::new()),
        }
    }

    /// Derive a logger that also emits `fields` on every record.
    pub fn with<K, V, I>(&self, fields: I) -> Logger
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut bound = (*self.bound).clone();
        for (k, v) in fields {
            set_field(&mut bound, k, v);
        }
        Logger {
            sinks: self.sinks.clone(),
            bound: Arc::new(bound),
        }
    }

    pub fn bound_fields(&self) -> &Fields {
        &self.bound
    }

    /// Emit one record to every sink. Per-call fields override bound ones.
    pub fn log(&self, level: Level, fields: Fields, message: &str) {
        let mut all = (*self.bound).clone();
        for (k, v) in fields {
            set_field(&mut all, k, v);
        }
        let record = LogRecord {
            level,
            message: message.to_string(),
            fields: all,
            timestamp: Utc::now(),
        };

        for sink in self.sinks.iter() {
            if let Err(e) = sink.write(&record) {
                tracing::warn!(sink = sink.name(), error = %e, "log sink write failed");
            }
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, Fields::new(), message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, Fields::new(), message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, Fields::new(), message);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("bound", &self.bound)
            .finish()
    }
}

/// Initialize the process diagnostics subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
pub fn init_diagnostics(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}
