//! Configuration data model and validation

use crate::models::ProbeTarget;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_TIMEOUT_SECS: u64 = 60 * 60;
const MAX_RETAINED_ENTRIES: usize = 1_000_000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL of the fixed-size file downloaded on every probe
    #[serde(default = "default_url")]
    pub url: String,

    /// Exact size of the remote file in bytes
    #[serde(default = "default_size_bytes")]
    pub expected_size_bytes: u64,

    /// Seconds between probe triggers
    #[serde(default = "default_interval_secs")]
    pub interval_seconds: u64,

    /// Whole-request timeout for a single probe
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Directory holding the result log; `None` resolves a per-user data dir
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of measurements kept in the log
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            expected_size_bytes: default_size_bytes(),
            interval_seconds: default_interval_secs(),
            timeout_seconds: default_timeout_secs(),
            data_dir: None,
            max_entries: default_max_entries(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get probe interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Probe target described by this configuration
    pub fn target(&self) -> ProbeTarget {
        ProbeTarget::new(self.url.clone(), self.expected_size_bytes)
    }

    /// Directory the result log lives in.
    ///
    /// Follows XDG: `$XDG_DATA_HOME`, then `$HOME/.local/share`, then the
    /// current directory.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }

        let base = if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".local").join("share")
        } else {
            return PathBuf::from(".");
        };

        base.join(crate::defaults::APP_DIR_NAME)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(AppError::config("Probe URL cannot be empty"));
        }

        match url::Url::parse(&self.url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!(
                        "Probe URL must use http or https: {}",
                        self.url
                    )));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid probe URL '{}': {}", self.url, e)));
            }
        }

        if self.expected_size_bytes == 0 {
            return Err(AppError::config("Expected size must be greater than 0"));
        }

        if self.interval_seconds == 0 {
            return Err(AppError::config("Interval must be greater than 0"));
        }

        if self.interval_seconds > MAX_INTERVAL_SECS {
            return Err(AppError::config(format!(
                "Interval cannot exceed {} seconds",
                MAX_INTERVAL_SECS
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_seconds > MAX_TIMEOUT_SECS {
            return Err(AppError::config(format!(
                "Timeout cannot exceed {} seconds",
                MAX_TIMEOUT_SECS
            )));
        }

        if self.max_entries == 0 || self.max_entries > MAX_RETAINED_ENTRIES {
            return Err(AppError::config(format!(
                "Max results must be between 1 and {}",
                MAX_RETAINED_ENTRIES
            )));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PROBE_URL") {
            let url = url.trim();
            if !url.is_empty() {
                self.url = url.to_string();
            }
        }

        if let Ok(size) = std::env::var("PROBE_SIZE_BYTES") {
            self.expected_size_bytes = size.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_SIZE_BYTES value '{}': {}", size, e)))?;
        }

        if let Ok(interval) = std::env::var("PROBE_INTERVAL_SECONDS") {
            self.interval_seconds = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_INTERVAL_SECONDS value '{}': {}", interval, e)))?;
        }

        if let Ok(timeout) = std::env::var("PROBE_TIMEOUT_SECONDS") {
            self.timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_TIMEOUT_SECONDS value '{}': {}", timeout, e)))?;
        }

        if let Ok(dir) = std::env::var("RESULTS_DIR") {
            let dir = dir.trim();
            if !dir.is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(max) = std::env::var("MAX_RESULTS") {
            self.max_entries = max.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid MAX_RESULTS value '{}': {}", max, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_url() -> String {
    crate::defaults::DEFAULT_URL.to_string()
}

fn default_size_bytes() -> u64 {
    crate::defaults::DEFAULT_SIZE_BYTES
}

fn default_interval_secs() -> u64 {
    crate::defaults::DEFAULT_INTERVAL.as_secs()
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_max_entries() -> usize {
    crate::defaults::DEFAULT_MAX_ENTRIES
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
