//! Status display and chart rendering
//!
//! The scheduler reports every event through [`ProbeSink`] and hands the
//! chart series to [`ChartSink`]. Both are synchronous so they can be called
//! from the probe's progress callback.

mod chart;
mod console;

pub use chart::{draw, ChartState, ChartTransition, TerminalChart};
pub use console::{format_history, ConsoleSink};

use crate::models::{Aggregates, ChartPoint};
use crate::types::ProbeStatus;
use std::time::Duration;

/// Receiver of status, progress and aggregate updates
pub trait ProbeSink: Send + Sync {
    fn status(&self, status: ProbeStatus);

    /// Completed fraction of the current download in `[0, 1]`
    fn progress(&self, fraction: f64);

    /// Speed of the last probe; `None` clears the display
    fn speed(&self, speed_mbps: Option<f64>);

    fn aggregates(&self, aggregates: &Aggregates);

    /// Time since the last start command
    fn elapsed(&self, elapsed: Duration);
}

/// Receiver of the full chart series after every change to the log
pub trait ChartSink: Send + Sync {
    fn render(&self, points: &[ChartPoint]);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProbeSink for NullSink {
    fn status(&self, _status: ProbeStatus) {}
    fn progress(&self, _fraction: f64) {}
    fn speed(&self, _speed_mbps: Option<f64>) {}
    fn aggregates(&self, _aggregates: &Aggregates) {}
    fn elapsed(&self, _elapsed: Duration) {}
}

impl ChartSink for NullSink {
    fn render(&self, _points: &[ChartPoint]) {}
}

/// Fraction as a percentage with one decimal, e.g. `42.5%`
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.1}%", fraction.clamp(0.0, 1.0) * 100.0)
}

/// Elapsed time as `mm:ss`; minutes keep counting past 59
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Speed with two decimals, or `-- Mbps` when unknown
pub fn format_speed(speed_mbps: Option<f64>) -> String {
    match speed_mbps {
        Some(speed) if speed.is_finite() => format!("{:.2} Mbps", speed),
        _ => "-- Mbps".to_string(),
    }
}

pub fn format_total(total_mb: f64) -> String {
    format!("{:.2} MB", total_mb)
}
