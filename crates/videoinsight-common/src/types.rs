//! Job kinds and lifecycle states shared by the queue and its consumers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a background job does with its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Extract structured media metadata.
    Probe,
    /// Extract a single decoded frame as a small image.
    Thumbnail,
}

impl JobKind {
    /// Both kinds, in the order the host enqueues them for a new file.
    pub const ALL: [JobKind; 2] = [JobKind::Probe, JobKind::Thumbnail];
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => write!(f, "probe"),
            Self::Thumbnail => write!(f, "thumbnail"),
        }
    }
}

/// Lifecycle state of a job.
///
/// Only `Queued` and `Active` are ever stored by the queue; the terminal
/// states are reported once and then the job is forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job has finished and released its queue slot.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
