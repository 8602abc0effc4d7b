//! Logging sink for request reports.
//!
//! The handler writes through an injected [`ReportSink`] instead of global
//! logging state, so it stays independently testable. [`LogWriter`] is the
//! production implementation: timestamped lines to stdout or an append-mode
//! log file.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::Local;

use crate::config::{Config, LoggingConfig};

/// Severity levels, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Logging collaborator handed to the handler and the server loop.
pub trait ReportSink: Send + Sync {
    /// Write one multi-line record describing a request's payload.
    fn report(&self, peer: SocketAddr, lines: &[String]);
    /// Write the per-request access line, if access logging is enabled.
    fn access(&self, peer: SocketAddr, method: &str, path: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

enum LogTarget {
    Stdout,
    File(Mutex<File>),
}

/// Writes timestamped records to stdout or a log file.
pub struct LogWriter {
    target: LogTarget,
    level: Level,
    access_log: bool,
}

impl LogWriter {
    pub fn from_config(cfg: &LoggingConfig) -> io::Result<Self> {
        let level = cfg
            .level
            .parse()
            .map_err(|err: String| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let target = match cfg.log_file.as_deref() {
            Some(path) => LogTarget::File(Mutex::new(open_log_file(path)?)),
            None => LogTarget::Stdout,
        };
        Ok(Self {
            target,
            level,
            access_log: cfg.access_log,
        })
    }

    fn write(&self, level: Level, record: &str) {
        if level < self.level {
            return;
        }
        match &self.target {
            LogTarget::Stdout => println!("{record}"),
            LogTarget::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(file, "{record}");
                }
            }
        }
    }
}

impl ReportSink for LogWriter {
    fn report(&self, peer: SocketAddr, lines: &[String]) {
        self.write(
            Level::Info,
            &format_record(&timestamp(), Level::Info, peer, lines),
        );
    }

    fn access(&self, peer: SocketAddr, method: &str, path: &str) {
        if self.access_log {
            self.write(
                Level::Info,
                &format!("{} INFO {peer} - \"{method} {path}\"", timestamp()),
            );
        }
    }

    fn info(&self, message: &str) {
        self.write(Level::Info, &format!("{} INFO {message}", timestamp()));
    }

    fn warn(&self, message: &str) {
        self.write(Level::Warn, &format!("{} WARN {message}", timestamp()));
    }
}

/// Render a multi-line record. Every line carries the timestamp and
/// severity; the first line also names the peer.
fn format_record(timestamp: &str, level: Level, peer: SocketAddr, lines: &[String]) -> String {
    let mut record = String::new();
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            record.push('\n');
        }
        if index == 0 {
            let _ = write!(record, "{timestamp} {} {peer} - {line}", level.tag());
        } else {
            let _ = write!(record, "{timestamp} {} {line}", level.tag());
        }
    }
    record
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Open or create a log file for appending.
fn open_log_file(path: &str) -> io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Startup banner, written once after the listener is bound.
pub fn log_server_start(sink: &dyn ReportSink, addr: &SocketAddr, cfg: &Config) {
    sink.info("======================================");
    sink.info(&format!("Server listening on http://{addr}"));
    sink.info(&format!("Log level: {}", cfg.logging.level));
    if let Some(workers) = cfg.server.workers {
        sink.info(&format!("Worker threads: {workers}"));
    }
    if let Some(path) = &cfg.logging.log_file {
        sink.info(&format!("Log file: {path}"));
    }
    sink.info(&format!("Max body size: {} bytes", cfg.http.max_body_size));
    sink.info("======================================");
}
