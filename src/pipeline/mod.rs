//! Session orchestration for lipsync.
//!
//! Wires extraction, caching, preprocessing, compilation and binding
//! together and exposes the shared state a host UI reads.
//!
//! # Architecture
//!
//! ```text
//! LipSyncSession::analyze ──▶ CacheStore::load ──hit──▶ Timeline
//!        │ miss
//!        ▼
//! JobManager::start ──▶ tokio task (run_job)
//!        │
//! poll_analysis / wait_analysis ──▶ CacheStore::save, Timeline
//!
//! LipSyncSession::generate ──▶ preprocess ──▶ compile ──▶ KeyframeSink
//!                                                    └──▶ DriverBinder ──▶ DriverSink
//!
//! SharedState (Arc<Mutex<SessionState>>) ←─── read by the host UI
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use lipsync::config::{AppConfig, AppPaths};
//! use lipsync::host::MemoryHost;
//! use lipsync::pipeline::LipSyncSession;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let mut session =
//!     LipSyncSession::new(AppConfig::default(), &AppPaths::new(), runtime.handle().clone()).unwrap();
//!
//! session.analyze_file(Path::new("line.wav"), None).unwrap();
//! while session.wait_analysis(Duration::from_millis(200)).is_busy() {}
//!
//! let mut host = MemoryHost::new();
//! host.add_plain_target("Rig");
//! session.generate(&mut host, "Rig", None).unwrap();
//! ```

pub mod session;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use session::{AnalysisStart, GenerateReport, LipSyncSession};
pub use state::{new_shared_state, SessionPhase, SessionState, SharedState};
