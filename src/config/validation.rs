//! Configuration validation utilities and rules

use crate::{
    models::Config,
    error::Result,
};

/// Below this size a single slow round trip dominates the measurement
const MIN_RELIABLE_SIZE_BYTES: u64 = 1024 * 1024;

/// Configuration validator producing non-fatal warnings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration with comprehensive checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        // Hard errors first
        config.validate()?;

        warnings.extend(Self::validate_url(&config.url)?);
        warnings.extend(Self::validate_schedule(config));

        Ok(warnings)
    }

    /// Validate the probe URL with detailed checks
    fn validate_url(url: &str) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();
        let parsed = url::Url::parse(url)?;

        if parsed.scheme() == "http" {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("URL '{}' uses HTTP; transparent proxies may cache or shape the transfer", url),
            ));
        }

        if let Some(url::Host::Ipv4(ip)) = parsed.host() {
            if ip.is_private() || ip.is_loopback() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("URL '{}' targets a private/local network; results will not reflect the uplink", url),
                ));
            }
        }

        if parsed.query_pairs().any(|(key, _)| key == "nocache") {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("URL '{}' already has a 'nocache' parameter; it is replaced on every probe", url),
            ));
        }

        Ok(warnings)
    }

    /// Validate interval, timeout and size against each other
    fn validate_schedule(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.expected_size_bytes < MIN_RELIABLE_SIZE_BYTES {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Expected size of {} bytes is small; throughput figures will be dominated by latency",
                    config.expected_size_bytes
                ),
            ));
        }

        if config.timeout_seconds > config.interval_seconds {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Timeout ({}s) exceeds interval ({}s); triggers during a slow probe are skipped",
                    config.timeout_seconds, config.interval_seconds
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        if use_color {
            use colored::Colorize;
            let tag = match self.level {
                ValidationLevel::Info => self.level.as_str().blue(),
                ValidationLevel::Warning => self.level.as_str().yellow(),
            };
            format!("[{}] {}", tag, self.message)
        } else {
            format!("[{}] {}", self.level.as_str(), self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
