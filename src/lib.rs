//! Network Speed Probe
//!
//! Periodically downloads a fixed-size remote file, measures throughput,
//! persists every completed measurement to a local JSON log and keeps
//! running aggregates and a terminal chart up to date.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ProbeError, Result};
pub use models::{Aggregates, ChartPoint, Config, Measurement, ProbeTarget};
pub use output::{ChartSink, ConsoleSink, ProbeSink, TerminalChart};
pub use probe::{cancel_pair, CancelHandle, CancelToken, Probe, SpeedProbe, TransferProgress};
pub use scheduler::{ProbeScheduler, SchedulerState, SessionSnapshot};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore, ResultStore};
pub use types::ProbeStatus;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_URL: &str = "https://cachefly.cachefly.net/10mb.test";
    pub const DEFAULT_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
    pub const DEFAULT_MAX_ENTRIES: usize = 10_000;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const STORAGE_KEY: &str = "throttleTestData";
    pub const APP_DIR_NAME: &str = "network-speed-probe";
}
