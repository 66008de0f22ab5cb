//! Session phase and the shared state a host UI reads.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<SessionState>>`, cheap to
//! clone and safe to share with a UI thread that redraws on a timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::session::GenerateReport;

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// ```text
/// Idle ──analyze (cache miss)──▶ Analyzing ──job succeeded──▶ Ready
///      ──analyze (cache hit)──────────────────────────────▶ Ready
/// Ready ──generate──▶ Generated
/// any ──failure / timeout / cancel──▶ Error
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// No phoneme data yet.
    Idle,
    /// An extraction job is running.
    Analyzing,
    /// A timeline is loaded and can be generated.
    Ready,
    /// Keys and drivers were written for the current timeline.
    Generated,
    /// The last operation failed; `error_message` says why.
    Error,
}

impl SessionPhase {
    /// ```
    /// use lipsync::pipeline::SessionPhase;
    ///
    /// assert!(SessionPhase::Analyzing.is_busy());
    /// assert!(!SessionPhase::Ready.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionPhase::Analyzing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Analyzing => "Analyzing",
            SessionPhase::Ready => "Ready",
            SessionPhase::Generated => "Done",
            SessionPhase::Error => "Error",
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Progress of the running job, 0–100.
    pub progress: u8,
    /// Time the running job has taken so far, as of the last poll.
    pub elapsed: Duration,
    /// One-line status for a status bar.
    pub status: String,
    /// Cues in the loaded timeline.
    pub cue_count: usize,
    pub last_report: Option<GenerateReport>,
    /// Set when `phase == SessionPhase::Error`.
    pub error_message: Option<String>,
}

/// Do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<SessionState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_analyzing_is_busy() {
        assert!(SessionPhase::Analyzing.is_busy());
        for phase in [
            SessionPhase::Idle,
            SessionPhase::Ready,
            SessionPhase::Generated,
            SessionPhase::Error,
        ] {
            assert!(!phase.is_busy(), "{phase:?}");
        }
    }

    #[test]
    fn labels() {
        assert_eq!(SessionPhase::Idle.label(), "Idle");
        assert_eq!(SessionPhase::Generated.label(), "Done");
        assert_eq!(SessionPhase::Error.label(), "Error");
    }

    #[test]
    fn default_state_is_idle() {
        let state = SessionState::default();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(state.error_message.is_none());
        assert!(state.last_report.is_none());
        assert_eq!(state.elapsed, Duration::ZERO);
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        state.lock().unwrap().phase = SessionPhase::Analyzing;
        assert_eq!(state2.lock().unwrap().phase, SessionPhase::Analyzing);
    }
}
