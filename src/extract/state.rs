//! Job state machine and shared progress.
//!
//! ```text
//! Idle ──start──▶ Running ──tool ok, payload parsed──▶ Succeeded(Timeline)
//!                   │──exit ≠ 0 / bad payload / worker died──▶ Failed(message)
//!                   │──cancel──▶ Cancelled
//!                   └──limit exceeded──▶ TimedOut { limit_secs }
//! ```
//!
//! Terminal states are final for a job.  The manager returns to `Idle` when
//! the slot is reset or a new job starts.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::timeline::Timeline;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Identifies one started job; ids are never reused by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Running,
    Succeeded(Timeline),
    Failed(String),
    Cancelled,
    TimedOut { limit_secs: u64 },
}

impl JobState {
    /// `true` while a worker may still be producing a result.
    ///
    /// ```
    /// use lipsync::extract::JobState;
    ///
    /// assert!(JobState::Running.is_busy());
    /// assert!(!JobState::Idle.is_busy());
    /// assert!(!JobState::Cancelled.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, JobState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Idle | JobState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Idle => "Idle",
            JobState::Running => "Analyzing",
            JobState::Succeeded(_) => "Done",
            JobState::Failed(_) => "Failed",
            JobState::Cancelled => "Cancelled",
            JobState::TimedOut { .. } => "Timed out",
        }
    }

    /// Human-readable description for a status line.
    pub fn message(&self) -> String {
        match self {
            JobState::Idle => "Ready".into(),
            JobState::Running => "Analysis in progress".into(),
            JobState::Succeeded(tl) => format!(
                "Extracted {} phonemes ({:.1}s of audio)",
                tl.len(),
                tl.total_duration
            ),
            JobState::Failed(msg) => msg.clone(),
            JobState::Cancelled => "Analysis cancelled".into(),
            JobState::TimedOut { limit_secs } => {
                format!("Analysis timed out after {limit_secs} seconds")
            }
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Idle
    }
}

// ---------------------------------------------------------------------------
// JobProgress
// ---------------------------------------------------------------------------

/// Progress snapshot written by the worker and read by the poller.
#[derive(Debug, Clone)]
pub struct JobProgress {
    pub percent: u8,
    pub message: String,
    /// PID of the tool once spawned.
    pub pid: Option<u32>,
    pub started_at: Instant,
}

impl JobProgress {
    pub fn new() -> Self {
        Self {
            percent: 0,
            message: "Starting...".into(),
            pid: None,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Do not hold the lock across `.await`.
pub type SharedProgress = Arc<Mutex<JobProgress>>;

pub fn new_shared_progress() -> SharedProgress {
    Arc::new(Mutex::new(JobProgress::new()))
}

pub(crate) fn update_progress(progress: &SharedProgress, percent: u8, message: impl Into<String>) {
    let mut p = progress.lock().unwrap_or_else(PoisonError::into_inner);
    p.percent = percent.min(100);
    p.message = message.into();
}

pub(crate) fn snapshot(progress: &SharedProgress) -> JobProgress {
    progress
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
