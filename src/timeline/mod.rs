//! Phoneme cues, timelines, and audio source resolution.
//!
//! A [`Timeline`] is what an extraction job produces and what the cache
//! stores.  It is immutable once produced; re-analysis replaces it whole.

pub mod cue;
pub mod source;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cue::{PhonemeCue, SymbolSet, Timeline};
pub use source::{
    resolve_path, resolve_source, validate_audio, AudioClipRegistry, AudioSource,
    SUPPORTED_EXTENSIONS,
};
