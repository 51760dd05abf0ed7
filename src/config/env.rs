//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                println!("Loaded configuration from .env file");
            }
        } else if debug {
            println!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Speed Probe Configuration
#
# Values here are used as defaults and can be overridden by command-line
# arguments.

# URL of the fixed-size file downloaded on every probe
# PROBE_URL=https://cachefly.cachefly.net/10mb.test

# Exact size of that file in bytes (a probe receiving any other count fails)
# PROBE_SIZE_BYTES=10485760

# Seconds between probes
# PROBE_INTERVAL_SECONDS=5

# Whole-request timeout for one probe, in seconds
# PROBE_TIMEOUT_SECONDS=120

# Directory holding the result log
# RESULTS_DIR=/var/lib/network-speed-probe

# Maximum number of measurements kept (oldest are dropped first)
# MAX_RESULTS=10000

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Long-running background monitoring, one probe every 30 minutes:
# PROBE_INTERVAL_SECONDS=1800
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        let content = Self::create_example_env_content();
        std::fs::write(path, content)
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "PROBE_URL" => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid PROBE_URL '{}': {}", value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("PROBE_URL must use http or https: {}", value)));
                }
            }
            "PROBE_SIZE_BYTES" => {
                let size: u64 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_SIZE_BYTES value '{}': {}", value, e)))?;
                if size == 0 {
                    return Err(AppError::config("PROBE_SIZE_BYTES must be greater than 0"));
                }
            }
            "PROBE_INTERVAL_SECONDS" => {
                let interval: u64 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_INTERVAL_SECONDS value '{}': {}", value, e)))?;
                if interval == 0 || interval > 86_400 {
                    return Err(AppError::config(format!("PROBE_INTERVAL_SECONDS must be between 1 and 86400, got: {}", interval)));
                }
            }
            "PROBE_TIMEOUT_SECONDS" => {
                let timeout: u64 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_TIMEOUT_SECONDS value '{}': {}", value, e)))?;
                if timeout == 0 || timeout > 3_600 {
                    return Err(AppError::config(format!("PROBE_TIMEOUT_SECONDS must be between 1 and 3600, got: {}", timeout)));
                }
            }
            "RESULTS_DIR" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("RESULTS_DIR cannot be empty"));
                }
            }
            "MAX_RESULTS" => {
                let max: usize = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid MAX_RESULTS value '{}': {}", value, e)))?;
                if max == 0 || max > 1_000_000 {
                    return Err(AppError::config(format!("MAX_RESULTS must be between 1 and 1000000, got: {}", max)));
                }
            }
            "ENABLE_COLOR" => {
                value.trim().parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PROBE_URL", "URL of the fixed-size file to download", "https://cachefly.cachefly.net/10mb.test"),
            ("PROBE_SIZE_BYTES", "Exact size of the file in bytes", "10485760"),
            ("PROBE_INTERVAL_SECONDS", "Seconds between probes (1-86400)", "5"),
            ("PROBE_TIMEOUT_SECONDS", "Request timeout in seconds (1-3600)", "120"),
            ("RESULTS_DIR", "Directory holding the result log", "/var/lib/network-speed-probe"),
            ("MAX_RESULTS", "Measurements kept before the oldest are dropped", "10000"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        let mut warnings = Vec::new();

        for (var_name, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        warnings
    }
}
