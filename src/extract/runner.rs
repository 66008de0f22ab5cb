//! One extraction job, from audio preparation to a terminal [`JobState`].
//!
//! ```text
//! prepare audio ──▶ spawn tool ──┬─ stderr reader: progress events, diagnostics
//!                                ├─ stdout reader: full JSON payload
//!                                └─ wait ─┬─ exit 0   → parse → Succeeded / Failed
//!                                         ├─ exit ≠ 0 → Failed(diagnostics)
//!                                         ├─ timeout  → kill + reap → TimedOut
//!                                         └─ cancel   → kill + reap → Cancelled
//! ```
//!
//! The whole job additionally runs under the outer limit; when it fires
//! the job future is dropped and `kill_on_drop` takes the child down.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

use super::convert::AudioConverter;
use super::error::ExtractionError;
use super::progress::{handle_line, Diagnostics};
use super::result::parse_tool_output;
use super::state::{update_progress, JobState, SharedProgress};

pub const DEFAULT_RECOGNIZER: &str = "pocketSphinx";

/// Headroom the outer limit gives on top of the tool limit by default.
const OUTER_HEADROOM: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// JobRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub audio: PathBuf,
    pub tool: PathBuf,
    pub recognizer: String,
    /// Limit for the tool process alone.
    pub tool_timeout: Duration,
    /// Limit for conversion plus the tool, as seen by the caller.
    pub outer_timeout: Duration,
}

impl JobRequest {
    pub fn new(audio: impl Into<PathBuf>, tool: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            audio: audio.into(),
            tool: tool.into(),
            recognizer: DEFAULT_RECOGNIZER.to_string(),
            tool_timeout: timeout,
            outer_timeout: timeout + OUTER_HEADROOM,
        }
    }

    pub fn with_recognizer(mut self, recognizer: impl Into<String>) -> Self {
        self.recognizer = recognizer.into();
        self
    }

    pub fn with_outer_timeout(mut self, outer: Duration) -> Self {
        self.outer_timeout = outer;
        self
    }
}

/// Command-line arguments for the tool, in order.
pub fn tool_args(recognizer: &str, audio: &Path) -> Vec<String> {
    vec![
        "--format=json".to_string(),
        format!("--recognizer={recognizer}"),
        "--progress=machine-readable".to_string(),
        audio.display().to_string(),
    ]
}

// ---------------------------------------------------------------------------
// run_job
// ---------------------------------------------------------------------------

/// Run a job to completion.  Never panics on tool misbehaviour; every
/// outcome is a terminal state.
pub async fn run_job(
    request: JobRequest,
    converter: Arc<dyn AudioConverter>,
    progress: SharedProgress,
    cancel: watch::Receiver<bool>,
) -> JobState {
    let limit = request.outer_timeout;
    match tokio::time::timeout(limit, execute(&request, converter.as_ref(), &progress, cancel)).await
    {
        Ok(state) => state,
        Err(_) => {
            log::warn!(
                "extract: job for {} exceeded the {}s limit",
                request.audio.display(),
                limit.as_secs()
            );
            JobState::TimedOut {
                limit_secs: limit.as_secs(),
            }
        }
    }
}

enum Exit {
    Status(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

async fn execute(
    request: &JobRequest,
    converter: &dyn AudioConverter,
    progress: &SharedProgress,
    mut cancel: watch::Receiver<bool>,
) -> JobState {
    update_progress(progress, 0, "Preparing audio");
    let prepared = tokio::select! {
        prepared = converter.prepare(&request.audio) => match prepared {
            Ok(p) => p,
            Err(e) => {
                log::error!("extract: {e}");
                return JobState::Failed(e.to_string());
            }
        },
        _ = cancelled(&mut cancel) => return JobState::Cancelled,
    };

    let mut child = match Command::new(&request.tool)
        .args(tool_args(&request.recognizer, prepared.path()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(source) => {
            let err = ExtractionError::Spawn {
                program: request.tool.display().to_string(),
                source,
            };
            log::error!("extract: {err}");
            return JobState::Failed(err.to_string());
        }
    };

    let pid = child.id();
    {
        let mut p = progress.lock().unwrap_or_else(PoisonError::into_inner);
        p.pid = pid;
    }
    log::info!(
        "extract: started tool (pid {}) on {}",
        pid.map_or_else(|| "?".to_string(), |p| p.to_string()),
        prepared.path().display()
    );
    update_progress(progress, 0, "Analyzing audio");

    let stdout = child.stdout.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout {
            if let Err(e) = out.read_to_end(&mut buf).await {
                log::warn!("extract: reading tool output failed: {e}");
            }
        }
        buf
    });

    let stderr = child.stderr.take();
    let stderr_progress = Arc::clone(progress);
    let stderr_task = tokio::spawn(async move {
        let mut diagnostics = Diagnostics::default();
        if let Some(err) = stderr {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                handle_line(&line, &stderr_progress, &mut diagnostics);
            }
        }
        diagnostics
    });

    let exit = tokio::select! {
        waited = tokio::time::timeout(request.tool_timeout, child.wait()) => match waited {
            Ok(status) => Exit::Status(status),
            Err(_) => Exit::TimedOut,
        },
        _ = cancelled(&mut cancel) => Exit::Cancelled,
    };

    let status = match exit {
        Exit::Status(Ok(status)) => status,
        Exit::Status(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            return JobState::Failed(format!("failed to wait for Rhubarb: {e}"));
        }
        Exit::TimedOut => {
            log::warn!(
                "extract: tool exceeded {}s, killing it",
                request.tool_timeout.as_secs()
            );
            terminate(&mut child).await;
            stdout_task.abort();
            stderr_task.abort();
            return JobState::TimedOut {
                limit_secs: request.tool_timeout.as_secs(),
            };
        }
        Exit::Cancelled => {
            log::info!("extract: cancelled, killing tool");
            terminate(&mut child).await;
            stdout_task.abort();
            stderr_task.abort();
            return JobState::Cancelled;
        }
    };

    let payload = stdout_task.await.unwrap_or_default();
    let diagnostics = stderr_task.await.unwrap_or_default();
    drop(prepared);

    if *cancel.borrow() {
        log::info!("extract: discarding result that arrived after cancellation");
        return JobState::Cancelled;
    }

    if !status.success() {
        let err = ExtractionError::ToolFailed {
            code: status.code(),
            diagnostics: if diagnostics.is_empty() {
                "no diagnostic output".to_string()
            } else {
                diagnostics.render()
            },
        };
        log::error!("extract: {err}");
        return JobState::Failed(err.to_string());
    }

    let payload = match String::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => {
            let err = ExtractionError::MalformedResult(format!("output is not valid UTF-8: {e}"));
            log::error!("extract: {err}");
            return JobState::Failed(err.to_string());
        }
    };

    match parse_tool_output(&payload) {
        Ok(timeline) => {
            update_progress(progress, 100, "Analysis complete");
            log::info!(
                "extract: {} cues over {:.2}s",
                timeline.len(),
                timeline.total_duration
            );
            JobState::Succeeded(timeline)
        }
        Err(e) => {
            log::error!("extract: {e}");
            JobState::Failed(e.to_string())
        }
    }
}

/// Resolves once cancellation is requested or the controlling side is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Kill and reap.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        log::warn!("extract: failed to kill tool: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
