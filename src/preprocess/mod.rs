//! Timeline preprocessing: viseme reduction, cue merging, minimum hold.
//!
//! ```text
//! cues ──[ARPAbet only] reduce_to_visemes──▶ merge (threshold) ──▶ hold (min seconds) ──▶ cues'
//! ```
//!
//! Everything here is pure and allocation-light; nothing blocks.

pub mod cues;
pub mod viseme;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cues::{apply_min_hold, merge_close_cues, process};
pub use viseme::{reduce_timeline, reduce_to_visemes, Viseme};
