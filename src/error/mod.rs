//! Error handling for the network speed probe

use thiserror::Error;

/// Outcome of a single probe attempt that did not yield a measurement.
///
/// All variants are local to one attempt. None of them stop the scheduler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The server answered with a non-success status code
    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    /// The response body was missing or could not be read
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The stream ended with a byte count different from the expected size
    #[error("Incomplete download: received {got} bytes, expected {expected}")]
    IncompleteTransfer { got: u64, expected: u64 },

    /// The measured duration was zero
    #[error("Download duration too short for accurate measurement")]
    Timing,

    /// The attempt was cancelled by a stop command
    #[error("Download aborted")]
    Cancelled,

    /// Connection, TLS or timeout failure in the HTTP client
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProbeError {
    /// Short stable label used in logs and status lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpStatus { .. } => "http_status",
            Self::Protocol(_) => "protocol",
            Self::IncompleteTransfer { .. } => "incomplete_transfer",
            Self::Timing => "timing",
            Self::Cancelled => "cancelled",
            Self::Transport(_) => "transport",
        }
    }

    /// Whether this outcome came from a stop command rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            Self::HttpStatus { status: status.as_u16() }
        } else if error.is_timeout() {
            Self::Transport(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::Protocol(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Custom error types for the network speed probe
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Result store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A probe attempt failed
    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Storage(_) => "STORAGE",
            Self::Probe(_) => "PROBE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Parse(_) => 1,
            Self::Network(_) => 2,
            Self::Probe(ProbeError::Cancelled) => 130,
            Self::Probe(_) => 3,
            Self::Io(_) | Self::Storage(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::Probe(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Io(_) | Self::Storage(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;
