//! Progress reporting types.
//!
//! A [`StatusSnapshot`] is a read-only projection of the controller's run
//! state, persisted wholesale after every transition and broadcast to any
//! observer. Observers only ever see snapshots, never live state.

use serde::{Deserialize, Serialize};

use crate::config::ScrapeConfig;
use crate::records::DoctorRecord;

/// Controller state machine states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// Stop requested; the in-flight profile finishes before finalization.
    Stopping,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Bookkeeping for a retry currently in flight. Exists only while the
/// current URL is being re-attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub url: String,
    /// 1-based attempt number of the next attempt.
    pub attempt: u32,
    pub total_attempts: u32,
}

/// One live error, keyed by profile URL or a sentinel key (`global`,
/// `download`, `finalise`). A later success for the same key clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub url: String,
    pub message: String,
}

/// Queue progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub total: usize,
    pub processed: usize,
    pub pending: usize,
}

/// Read-only projection of the run, suitable for persisting and
/// broadcasting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: RunState,
    pub counts: ProgressCounts,
    /// The most recently finished record, successful or placeholder.
    pub last_record: Option<DoctorRecord>,
    pub retry: Option<RetryState>,
    /// Short human-readable sentence describing the latest transition.
    pub message: String,
    pub errors: Vec<ErrorEntry>,
    pub config: Option<ScrapeConfig>,
}
