//! Phoneme extraction through the external Rhubarb Lip Sync tool.
//!
//! ```text
//! JobManager::start ──▶ tokio task: run_job
//!                         ├─ AudioConverter::prepare   (ffmpeg for non-native formats)
//!                         ├─ tool --format=json --recognizer=… --progress=machine-readable
//!                         │     stderr → JobProgress   stdout → Timeline
//!                         └─ terminal JobState ──sync_channel(1)──▶ JobManager::poll / wait
//! ```

pub mod convert;
pub mod error;
pub mod manager;
pub mod progress;
pub mod result;
pub mod runner;
pub mod state;
pub mod tool;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use convert::{AudioConverter, FfmpegConverter, PassThrough, PreparedAudio};
pub use error::ExtractionError;
pub use manager::JobManager;
pub use progress::{Diagnostics, ProgressEvent};
pub use result::{parse_tool_output, LAST_CUE_SECS};
pub use runner::{run_job, tool_args, JobRequest, DEFAULT_RECOGNIZER};
pub use state::{new_shared_progress, JobId, JobProgress, JobState, SharedProgress};
pub use tool::{find_in_dir, validate_tool, verify_tool, ToolLocator, TOOL_FILE_NAMES};
