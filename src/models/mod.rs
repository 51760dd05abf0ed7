//! Data models and structures for the network speed probe

pub mod config;
pub mod measurement;

// Re-export main model types
pub use config::Config;
pub use measurement::{Aggregates, ChartPoint, Measurement, ProbeTarget, BYTES_PER_MB};
