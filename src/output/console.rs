//! Colored terminal rendering of probe events

use super::{format_elapsed, format_percentage, format_speed, format_total, ProbeSink};
use crate::models::{Aggregates, Measurement};
use crate::types::ProbeStatus;
use chrono::DateTime;
use colored::*;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct ConsoleState {
    /// A `\r` progress line is on screen and needs a newline before other output
    progress_open: bool,
    last_status: Option<ProbeStatus>,
}

/// [`ProbeSink`] writing to stdout
pub struct ConsoleSink {
    use_color: bool,
    show_elapsed: bool,
    state: Mutex<ConsoleState>,
}

impl ConsoleSink {
    pub fn new(use_color: bool) -> Self {
        Self {
            use_color,
            show_elapsed: false,
            state: Mutex::new(ConsoleState::default()),
        }
    }

    /// Also print the once-per-second elapsed tick
    pub fn with_elapsed(mut self, show_elapsed: bool) -> Self {
        self.show_elapsed = show_elapsed;
        self
    }

    pub fn last_status(&self) -> Option<ProbeStatus> {
        self.state.lock().ok().and_then(|state| state.last_status)
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.use_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn heading(&self, text: &str) -> ColoredString {
        if self.use_color {
            text.blue().bold()
        } else {
            text.normal()
        }
    }

    fn status_color(status: ProbeStatus) -> Color {
        match status {
            ProbeStatus::Completed => Color::Green,
            ProbeStatus::Downloading | ProbeStatus::Initiating => Color::Cyan,
            ProbeStatus::Aborted | ProbeStatus::Stopped => Color::Yellow,
            ProbeStatus::Error => Color::Red,
            ProbeStatus::Idle => Color::BrightBlack,
        }
    }

    /// Write a full line, closing any open progress line first
    fn line(&self, text: String) {
        let mut out = io::stdout().lock();
        if let Ok(mut state) = self.state.lock() {
            if state.progress_open {
                let _ = writeln!(out);
                state.progress_open = false;
            }
        }
        let _ = writeln!(out, "{}", text);
    }

    /// Status line text without color
    pub fn status_line(status: ProbeStatus) -> String {
        format!("Status: {}", status.label())
    }

    /// Aggregates line text without color
    pub fn aggregates_line(aggregates: &Aggregates) -> String {
        format!(
            "Total downloaded: {}  Average speed: {}",
            format_total(aggregates.total_mb),
            format_speed(aggregates.average_speed_mbps)
        )
    }
}

impl ProbeSink for ConsoleSink {
    fn status(&self, status: ProbeStatus) {
        if let Ok(mut state) = self.state.lock() {
            state.last_status = Some(status);
        }
        let label = self.colorize(status.label(), Self::status_color(status));
        self.line(format!("{} {}", self.heading("Status:"), label));
    }

    fn progress(&self, fraction: f64) {
        let mut out = io::stdout().lock();
        let _ = write!(
            out,
            "\r{} {:>6}",
            self.heading("Progress:"),
            format_percentage(fraction)
        );
        let _ = out.flush();
        if let Ok(mut state) = self.state.lock() {
            state.progress_open = true;
        }
    }

    fn speed(&self, speed_mbps: Option<f64>) {
        let text = format_speed(speed_mbps);
        let colored = match speed_mbps {
            Some(_) if self.use_color => text.green().bold(),
            Some(_) => text.normal(),
            None => self.colorize(&text, Color::BrightBlack),
        };
        self.line(format!("{} {}", self.heading("Speed:"), colored));
    }

    fn aggregates(&self, aggregates: &Aggregates) {
        self.line(format!(
            "{} {}  {} {}",
            self.heading("Total downloaded:"),
            self.colorize(&format_total(aggregates.total_mb), Color::Cyan),
            self.heading("Average speed:"),
            self.colorize(&format_speed(aggregates.average_speed_mbps), Color::Cyan),
        ));
    }

    fn elapsed(&self, elapsed: Duration) {
        if self.show_elapsed {
            self.line(format!(
                "{} {}",
                self.heading("Elapsed:"),
                format_elapsed(elapsed)
            ));
        }
    }
}

/// Table of stored measurements, oldest first
pub fn format_history(log: &[Measurement]) -> String {
    let mut lines = vec![format!(
        "{:<23} {:>12} {:>10} {:>12}",
        "Time (UTC)", "Speed", "Data", "Total"
    )];

    for m in log {
        let time = DateTime::from_timestamp_millis(m.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| m.timestamp.to_string());
        lines.push(format!(
            "{:<23} {:>12} {:>10} {:>12}",
            time,
            format_speed(Some(m.speed_mbps)),
            format_total(m.data_downloaded_mb),
            format_total(m.cumulative_downloaded_mb),
        ));
    }

    lines.join("\n")
}
