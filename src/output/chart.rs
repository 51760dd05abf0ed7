//! Terminal bar chart of speed against cumulative data

use super::ChartSink;
use crate::models::ChartPoint;
use colored::*;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

/// Most recent points drawn
const MAX_BARS: usize = 20;
/// Width of the longest bar in characters
const DEFAULT_WIDTH: usize = 40;

/// What is currently on screen
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChartState {
    #[default]
    Empty,
    Drawn { points: Vec<ChartPoint> },
}

/// Change applied by one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartTransition {
    Created,
    Updated,
    TornDown,
    Unchanged,
}

impl ChartState {
    /// Move to the state for `points` and report which transition happened
    pub fn apply(&mut self, points: &[ChartPoint]) -> ChartTransition {
        match (&*self, points.is_empty()) {
            (ChartState::Empty, true) => ChartTransition::Unchanged,
            (ChartState::Empty, false) => {
                *self = ChartState::Drawn { points: points.to_vec() };
                ChartTransition::Created
            }
            (ChartState::Drawn { .. }, true) => {
                *self = ChartState::Empty;
                ChartTransition::TornDown
            }
            (ChartState::Drawn { points: current }, false) => {
                if current.as_slice() == points {
                    ChartTransition::Unchanged
                } else {
                    *self = ChartState::Drawn { points: points.to_vec() };
                    ChartTransition::Updated
                }
            }
        }
    }
}

/// [`ChartSink`] printing a horizontal bar chart to stdout
pub struct TerminalChart {
    use_color: bool,
    width: usize,
    state: Mutex<ChartState>,
}

impl TerminalChart {
    pub fn new(use_color: bool) -> Self {
        Self {
            use_color,
            width: DEFAULT_WIDTH,
            state: Mutex::new(ChartState::Empty),
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn state(&self) -> ChartState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Apply `points` and return the text to print, if anything changed
    pub fn update(&self, points: &[ChartPoint]) -> Option<String> {
        let transition = match self.state.lock() {
            Ok(mut state) => state.apply(points),
            Err(_) => return None,
        };

        match transition {
            ChartTransition::Created | ChartTransition::Updated => {
                let body = draw(points, self.width);
                Some(if self.use_color {
                    body.cyan().to_string()
                } else {
                    body
                })
            }
            ChartTransition::TornDown => Some("(no data)\n".to_string()),
            ChartTransition::Unchanged => None,
        }
    }
}

impl ChartSink for TerminalChart {
    fn render(&self, points: &[ChartPoint]) {
        if let Some(text) = self.update(points) {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{}", text);
            let _ = out.flush();
        }
    }
}

/// Draw the most recent points as bars scaled to the fastest one shown.
///
/// Each row is labelled with the cumulative MB at that point.
pub fn draw(points: &[ChartPoint], width: usize) -> String {
    let mut out = String::new();
    if points.is_empty() {
        return out;
    }

    let recent = &points[points.len().saturating_sub(MAX_BARS)..];
    let max_speed = recent
        .iter()
        .map(|p| p.speed_mbps)
        .filter(|s| s.is_finite())
        .fold(0.0_f64, f64::max);

    let _ = writeln!(out, "Speed (Mbps) by cumulative data (MB)");
    for point in recent {
        let bar_len = if max_speed > 0.0 && point.speed_mbps.is_finite() {
            ((point.speed_mbps / max_speed) * width as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{:>10.2} MB | {:<width$} {:.2}",
            point.cumulative_mb,
            "#".repeat(bar_len.min(width)),
            point.speed_mbps,
            width = width
        );
    }
    out
}
