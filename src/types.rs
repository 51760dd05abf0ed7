//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, ProbeError, Result};

/// Status line shown to the user, reflecting the most recent event only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// Nothing scheduled
    Idle,
    /// Start command accepted, first probe not yet issued
    Initiating,
    /// A probe is streaming the remote file
    Downloading,
    /// The last probe produced a measurement
    Completed,
    /// The last probe was cancelled by a stop command
    Aborted,
    /// The last probe failed
    Error,
    /// The scheduler was stopped
    Stopped,
}

impl ProbeStatus {
    /// Text shown in the status line
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Initiating => "Initiating...",
            Self::Downloading => "Downloading...",
            Self::Completed => "Completed",
            Self::Aborted => "Download aborted",
            Self::Error => "Error",
            Self::Stopped => "Stopped",
        }
    }

    /// Whether this status ends an attempt or a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Error | Self::Stopped)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&ProbeError> for ProbeStatus {
    fn from(error: &ProbeError) -> Self {
        if error.is_cancelled() {
            Self::Aborted
        } else {
            Self::Error
        }
    }
}
