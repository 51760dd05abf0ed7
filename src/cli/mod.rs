//! Command-line interface definition

use clap::Parser;
use std::path::PathBuf;

/// Network Speed Probe - periodically downloads a fixed-size file and tracks throughput
#[derive(Parser, Debug, Clone)]
#[command(name = "nsp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// URL of the fixed-size file to download
    #[arg(long)]
    pub url: Option<String>,

    /// Exact size of the remote file in bytes
    #[arg(long, value_name = "BYTES")]
    pub size: Option<u64>,

    /// Seconds between probes
    #[arg(short, long, value_name = "SECS", value_parser = parse_seconds)]
    pub interval: Option<u64>,

    /// Request timeout in seconds for a single probe
    #[arg(short, long, value_name = "SECS", value_parser = parse_seconds)]
    pub timeout: Option<u64>,

    /// Directory holding the result log
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of measurements kept in the log
    #[arg(long, value_name = "N")]
    pub max_results: Option<usize>,

    /// Run a single probe and exit
    #[arg(long)]
    pub once: bool,

    /// Stop after this many probe attempts
    #[arg(long, value_name = "N")]
    pub runs: Option<u64>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub duration: Option<u64>,

    /// Print the stored results, aggregates and chart, then exit
    #[arg(long)]
    pub history: bool,

    /// Delete all stored results, then exit
    #[arg(long)]
    pub clear: bool,

    /// Show supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.history && self.clear {
            return Err("Cannot specify both --history and --clear".to_string());
        }

        if self.once && (self.runs.is_some() || self.duration.is_some()) {
            return Err("--once cannot be combined with --runs or --duration".to_string());
        }

        if self.runs == Some(0) {
            return Err("--runs must be greater than 0".to_string());
        }

        if (self.history || self.clear) && (self.once || self.runs.is_some() || self.duration.is_some()) {
            return Err("--history/--clear do not run probes; drop --once/--runs/--duration".to_string());
        }

        Ok(())
    }

    /// Whether this invocation only inspects or edits the stored log
    pub fn is_maintenance_mode(&self) -> bool {
        self.history || self.clear || self.env_help
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a positive number of seconds
fn parse_seconds(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
