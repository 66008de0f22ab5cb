//! The single analysis slot.
//!
//! [`JobManager`] is driven from a synchronous control loop (UI timer, CLI
//! poll loop).  Workers run on a tokio runtime the caller owns and post
//! their terminal state exactly once on a capacity-one channel.
//!
//! ```text
//! start ──▶ validate ──▶ recover stale slot ──▶ slot busy? ──yes──▶ AlreadyRunning
//!                                                   │ no
//!                                                   ▼
//!                                   runtime.spawn(run_job) ──▶ Running
//! poll  ──▶ try_recv: result → terminal │ empty → Running │ disconnected → Failed
//! ```

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;

use super::convert::AudioConverter;
use super::runner::{run_job, JobRequest};
use super::state::{new_shared_progress, snapshot, JobId, JobProgress, JobState, SharedProgress};
use super::tool::validate_tool;
use crate::error::{LipSyncError, Result};
use crate::timeline::validate_audio;

const WORKER_LOST: &str = "analysis worker ended without a result";

struct JobHandle {
    id: JobId,
    request: JobRequest,
    progress: SharedProgress,
    cancel: watch::Sender<bool>,
    outcome: Receiver<JobState>,
    state: JobState,
}

impl JobHandle {
    /// Pick up a posted result without blocking.
    fn refresh(&mut self) {
        if !self.state.is_busy() {
            return;
        }
        match self.outcome.try_recv() {
            Ok(state) => self.finish(state),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.lost(),
        }
    }

    fn wait(&mut self, timeout: Duration) {
        if !self.state.is_busy() {
            return;
        }
        match self.outcome.recv_timeout(timeout) {
            Ok(state) => self.finish(state),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.lost(),
        }
    }

    fn finish(&mut self, state: JobState) {
        log::info!("extract: {} finished: {}", self.id, state.label());
        self.state = state;
    }

    fn lost(&mut self) {
        log::error!("extract: {} {WORKER_LOST}", self.id);
        self.state = JobState::Failed(WORKER_LOST.to_string());
    }
}

pub struct JobManager {
    runtime: Handle,
    converter: Arc<dyn AudioConverter>,
    slot: Option<JobHandle>,
    /// Host-visible "analysis in progress" indicator.  May be restored from
    /// a saved document without a worker behind it.
    analyzing: bool,
    next_id: u64,
}

impl JobManager {
    pub fn new(runtime: Handle, converter: Arc<dyn AudioConverter>) -> Self {
        Self {
            runtime,
            converter,
            slot: None,
            analyzing: false,
            next_id: 0,
        }
    }

    /// Restore the indicator saved with a document.
    pub fn restore_indicator(&mut self, analyzing: bool) {
        self.analyzing = analyzing;
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    /// Id of the job occupying the slot, if any.
    pub fn current(&self) -> Option<JobId> {
        self.slot.as_ref().map(|job| job.id)
    }

    /// Validate, then launch a worker.
    ///
    /// Fails with [`LipSyncError::AudioFile`] or an extraction error before
    /// anything is spawned, and with [`LipSyncError::AlreadyRunning`] while
    /// a live job holds the slot.
    pub fn start(&mut self, request: JobRequest) -> Result<JobId> {
        validate_audio(&request.audio)?;
        validate_tool(&request.tool)?;

        self.recover_stale();
        if let Some(job) = &self.slot {
            if job.state.is_busy() {
                log::warn!("extract: {} is still running; new request rejected", job.id);
                return Err(LipSyncError::AlreadyRunning);
            }
        }

        self.next_id += 1;
        let id = JobId(self.next_id);
        let progress = new_shared_progress();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (outcome_tx, outcome_rx) = mpsc::sync_channel(1);

        let worker_request = request.clone();
        let worker_progress = Arc::clone(&progress);
        let converter = Arc::clone(&self.converter);
        self.runtime.spawn(async move {
            let state = run_job(worker_request, converter, worker_progress, cancel_rx).await;
            if outcome_tx.try_send(state).is_err() {
                log::debug!("extract: {id} result dropped, nobody is waiting");
            }
        });

        log::info!("extract: {id} started for {}", request.audio.display());
        self.slot = Some(JobHandle {
            id,
            request,
            progress,
            cancel: cancel_tx,
            outcome: outcome_rx,
            state: JobState::Running,
        });
        self.analyzing = true;
        Ok(id)
    }

    /// Current state without blocking.  Unknown ids read as `Idle`.
    pub fn poll(&mut self, id: JobId) -> JobState {
        let Some(job) = self.job_mut(id) else {
            return JobState::Idle;
        };
        job.refresh();
        let state = job.state.clone();
        self.sync_indicator();
        state
    }

    /// Like [`poll`](Self::poll) but blocks up to `timeout` for a result.
    pub fn wait(&mut self, id: JobId, timeout: Duration) -> JobState {
        let Some(job) = self.job_mut(id) else {
            return JobState::Idle;
        };
        job.wait(timeout);
        let state = job.state.clone();
        self.sync_indicator();
        state
    }

    /// Request cancellation.  The job reads as `Cancelled` from now on and a
    /// result that still arrives is discarded.  Returns `false` when the job
    /// is unknown or already finished.
    pub fn cancel(&mut self, id: JobId) -> bool {
        let Some(job) = self.job_mut(id) else {
            return false;
        };
        job.refresh();
        if !job.state.is_busy() {
            return false;
        }
        // The worker may already be gone; the state change still stands.
        let _ = job.cancel.send(true);
        job.state = JobState::Cancelled;
        log::info!("extract: {id} cancelled");
        self.sync_indicator();
        true
    }

    pub fn progress(&self, id: JobId) -> Option<JobProgress> {
        self.slot
            .as_ref()
            .filter(|job| job.id == id)
            .map(|job| snapshot(&job.progress))
    }

    pub fn request(&self, id: JobId) -> Option<&JobRequest> {
        self.slot
            .as_ref()
            .filter(|job| job.id == id)
            .map(|job| &job.request)
    }

    /// Empty the slot, cancelling a running job first.
    pub fn reset(&mut self) {
        if let Some(job) = self.slot.take() {
            if job.state.is_busy() {
                let _ = job.cancel.send(true);
                log::info!("extract: {} cancelled by reset", job.id);
            }
        }
        self.analyzing = false;
    }

    fn job_mut(&mut self, id: JobId) -> Option<&mut JobHandle> {
        self.slot.as_mut().filter(|job| job.id == id)
    }

    fn sync_indicator(&mut self) {
        self.analyzing = self.slot.as_ref().is_some_and(|job| job.state.is_busy());
    }

    /// A set indicator with no live worker is cleared instead of blocking
    /// new jobs.
    fn recover_stale(&mut self) {
        if let Some(job) = self.slot.as_mut() {
            job.refresh();
        }
        let live = self.slot.as_ref().is_some_and(|job| job.state.is_busy());
        if self.analyzing && !live {
            log::warn!("extract: clearing stale in-progress indicator with no live worker");
            self.analyzing = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
