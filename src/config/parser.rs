//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    models::Config,
    error::Result,
    config::env::EnvManager,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;

        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(ref url) = self.cli.url {
            config.url = url.clone();
        }

        if let Some(size) = self.cli.size {
            config.expected_size_bytes = size;
        }

        if let Some(interval) = self.cli.interval {
            config.interval_seconds = interval;
        }

        if let Some(timeout) = self.cli.timeout {
            config.timeout_seconds = timeout;
        }

        if let Some(ref dir) = self.cli.data_dir {
            config.data_dir = Some(dir.clone());
        }

        if let Some(max) = self.cli.max_results {
            config.max_entries = max;
        }

        if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            println!("Applied CLI overrides to configuration");
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("URL: {}", config.url));
    summary.push(format!("Expected size: {} bytes", config.expected_size_bytes));
    summary.push(format!("Interval: {}s", config.interval_seconds));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    summary.push(format!("Results dir: {}", config.resolved_data_dir().display()));
    summary.push(format!("Max results: {}", config.max_entries));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
