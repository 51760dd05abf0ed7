//! Structured logging for the network speed probe
//!
//! This module provides:
//! - Structured log entries with levels, fields and timestamps
//! - Console, JSON and compact output formats
//! - Correlation IDs tying together the events of one probe attempt
//! - Builder helpers for measurements and probe errors

use crate::error::{AppError, ProbeError, Result};
use crate::models::{Config, Measurement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: &str) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: &str, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger that drops everything below `Fatal`, used by tests and quiet modes
    pub fn silent(name: &str) -> Self {
        let mut logger = Self::new(name);
        logger.min_level = LogLevel::Fatal;
        logger
    }

    /// Child logger sharing this logger's settings and context under a new name
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Set output format
    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key.to_string(), json_value);
        }
    }

    /// Fresh correlation ID for one probe attempt
    pub fn new_correlation_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry
                .fields
                .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
        drop(context);

        let output = self.render(&entry);

        // Warnings and errors go to stderr so they never mix with the status stream
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    /// Format an entry in this logger's configured format
    pub fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => format_json(entry),
            LogFormat::Compact => format_compact(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        output
    }
}

fn format_json(entry: &LogEntry) -> String {
    match serde_json::to_string(entry) {
        Ok(json) => json,
        Err(_) => format!(
            "{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}",
            entry.message
        ),
    }
}

fn format_compact(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.format("%H:%M:%S");
    format!(
        "{} {} {}: {}",
        timestamp,
        entry.level.as_str().chars().next().unwrap_or('?'),
        entry.logger,
        entry.message
    )
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add the fields of a recorded measurement
    pub fn measurement(self, measurement: &Measurement) -> Self {
        self.field("speed_mbps", measurement.speed_mbps)
            .field("data_mb", measurement.data_downloaded_mb)
            .field("total_mb", measurement.cumulative_downloaded_mb)
    }

    /// Add probe failure information
    pub fn probe_error(self, error: &ProbeError) -> Self {
        self.field("error_kind", error.kind())
            .field("error", error.to_string())
    }

    /// Add application error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_exit_code", error.exit_code())
    }

    /// Entry built so far, without writing it
    pub fn build(self) -> LogEntry {
        self.entry
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_from_config() {
        let mut config = Config::default();
        assert!(!Logger::with_config("T", &config).would_log(LogLevel::Info));

        config.verbose = true;
        assert!(Logger::with_config("T", &config).would_log(LogLevel::Info));

        config.debug = true;
        assert!(Logger::with_config("T", &config).would_log(LogLevel::Debug));
    }

    #[test]
    fn test_silent_logger() {
        let logger = Logger::silent("T");
        assert!(!logger.would_log(LogLevel::Error));
        assert!(logger.would_log(LogLevel::Fatal));
    }

    #[test]
    fn test_console_format_without_color() {
        let mut logger = Logger::new("STORE");
        logger.use_color = false;
        let entry = logger
            .warn("Stored data is corrupted, clearing storage")
            .field("key", "throttleTestData")
            .correlation_id("0123456789abcdef")
            .build();

        let line = logger.render(&entry);
        assert!(line.contains(" WARN [STORE] Stored data is corrupted, clearing storage"));
        assert!(line.contains("[01234567]"));
        assert!(line.contains("key=\"throttleTestData\""));
    }

    #[test]
    fn test_json_format_round_trips() {
        let mut logger = Logger::new("PROBE");
        logger.set_format(LogFormat::Json);
        let measurement = Measurement {
            timestamp: 1,
            speed_mbps: 5.24,
            data_downloaded_mb: 10.0,
            cumulative_downloaded_mb: 20.0,
        };
        let entry = logger.info("Completed").measurement(&measurement).build();

        let parsed: LogEntry = serde_json::from_str(&logger.render(&entry)).unwrap();
        assert_eq!(parsed.level, LogLevel::Info);
        assert_eq!(parsed.fields["speed_mbps"], 5.24);
        assert_eq!(parsed.fields["total_mb"], 20.0);
    }

    #[test]
    fn test_probe_error_fields() {
        let logger = Logger::new("PROBE");
        let entry = logger
            .warn("Probe failed")
            .probe_error(&ProbeError::IncompleteTransfer { got: 5, expected: 10 })
            .build();
        assert_eq!(entry.fields["error_kind"], "incomplete_transfer");
    }

    #[test]
    fn test_compact_format() {
        let mut logger = Logger::new("SCHED");
        logger.set_format(LogFormat::Compact);
        let entry = logger.error("boom").build();
        assert!(logger.render(&entry).ends_with("E SCHED: boom"));
    }

    #[tokio::test]
    async fn test_context_fields_do_not_panic_when_filtered() {
        let logger = Logger::silent("T");
        logger.set_session_id("session".to_string()).await;
        logger.add_context_field("run", 1).await;
        logger.info("ignored").log().await;
    }

    #[test]
    fn test_named_child_keeps_level() {
        let mut logger = Logger::new("ROOT");
        logger.set_level(LogLevel::Error);
        let child = logger.named("CHILD");
        assert!(!child.would_log(LogLevel::Warn));
        assert_eq!(child.info("x").build().logger, "CHILD");
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(Logger::new_correlation_id(), Logger::new_correlation_id());
    }
}
