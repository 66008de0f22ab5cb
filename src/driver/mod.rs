//! Driver/expression binder.
//!
//! Each bound sub-element gets a driver reading the controller's
//! `["phoneme_index"]` property through the variable `phoneme`:
//!
//! ```text
//! layers["AI"].opacity  = 1.0 if phoneme == 1 else 0.0
//! key_blocks["O"].value = max(0.0, 1.0 - abs(phoneme - 3) / 1.5)   (blend range 1.5)
//! ```

pub mod binder;
pub mod rule;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use binder::{BindReport, DriverBinder};
pub use rule::{ActivationRule, CONTROL_VARIABLE};
