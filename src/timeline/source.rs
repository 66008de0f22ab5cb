//! Audio source resolution and validation.
//!
//! A source is either a file path or a clip id owned by the host document.
//! Paths beginning with `//` are relative to the host document's directory.

use std::path::{Path, PathBuf};

use crate::error::{LipSyncError, Result};

/// Extensions accepted as audio input (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "m4a", "aac"];

/// Where the audio for an analysis comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    File(PathBuf),
    /// A sound clip registered in the host document.
    Clip(String),
}

/// Host-provided lookup of sound clips.
pub trait AudioClipRegistry {
    /// Raw file path of the clip with this id, as the host stores it.
    fn clip_path(&self, id: &str) -> Option<PathBuf>;

    /// Directory `//`-relative paths are resolved against.
    fn document_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Resolve a source to an absolute-enough path.  Does not validate it.
pub fn resolve_source(source: &AudioSource, registry: &dyn AudioClipRegistry) -> Result<PathBuf> {
    let raw = match source {
        AudioSource::File(path) => path.clone(),
        AudioSource::Clip(id) => registry
            .clip_path(id)
            .ok_or_else(|| LipSyncError::AudioFile(format!("no sound clip named '{id}'")))?,
    };
    Ok(resolve_path(&raw, registry.document_dir().as_deref()))
}

/// Expand a `//`-prefixed document-relative path.  Other paths are returned
/// unchanged.
pub fn resolve_path(raw: &Path, document_dir: Option<&Path>) -> PathBuf {
    let Some(text) = raw.to_str() else {
        return raw.to_path_buf();
    };
    match text.strip_prefix("//") {
        Some(rest) => document_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => raw.to_path_buf(),
    }
}

/// Check that `path` is a non-empty regular file with a supported extension.
pub fn validate_audio(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|_| {
        LipSyncError::AudioFile(format!("audio file not found: {}", path.display()))
    })?;
    if !meta.is_file() {
        return Err(LipSyncError::AudioFile(format!(
            "not a regular file: {}",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(LipSyncError::AudioFile(format!(
            "audio file is empty: {}",
            path.display()
        )));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(LipSyncError::AudioFile(format!(
            "unsupported audio format '.{ext}' (supported: {})",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
