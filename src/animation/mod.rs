//! Animation compiler.
//!
//! ```text
//! cues ─▶ frame = round(start × fps) + start_frame ─▶ symbol → index (0 if unmapped)
//!      ─▶ later cue wins per frame ─▶ min-hold (frames) ─▶ [easing] ─▶ KeyframeSet
//!                                                                       │
//!                                             writer::write_keyframes ◀─┘ (direct or clip)
//! ```

pub mod compile;
pub mod easing;
pub mod writer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use compile::{
    apply_min_hold_frames, compile, time_to_frame, CompileOptions, CompiledAnimation, KeyframeSet,
    KeyframeValue,
};
pub use easing::{apply_easing, EasingCurve, EasingOptions};
pub use writer::{write_keyframes, OutputForm, WriteOptions, CONTROL_PROPERTY};
