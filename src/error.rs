//! Crate-wide error type.
//!
//! Subsystems keep their own error enums ([`ExtractionError`],
//! [`StoreError`], [`HostError`]); this enum is what the public operations
//! return.  Every variant renders a message fit for a status bar.

use thiserror::Error;

use crate::cache::StoreError;
use crate::extract::ExtractionError;
use crate::host::HostError;

/// Errors surfaced by the library's public operations.
#[derive(Debug, Error)]
pub enum LipSyncError {
    /// The audio source is missing, empty, or in an unsupported format.
    #[error("audio file error: {0}")]
    AudioFile(String),

    /// The extraction job could not be started.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Remote phoneme providers are not implemented; reserved.
    #[error("network error: {0}")]
    Network(String),

    /// A mapping operation referred to something that does not exist.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Compile preconditions were violated.
    #[error("invalid timeline: {0}")]
    InvalidTimeline(String),

    /// A preset could not be found, read, or written.
    #[error("preset error: {0}")]
    Preset(String),

    /// Cache persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A host collaborator rejected a request.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A second analysis was requested while one is still alive.
    #[error("an analysis is already in progress")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, LipSyncError>;
