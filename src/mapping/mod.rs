//! Symbol → (control index, target element) mapping.
//!
//! A [`MappingTable`] is usually seeded from a [`Preset`] and then edited:
//! targets assigned by hand or by [`MappingTable::auto_match_by_name`],
//! entries toggled on and off.

pub mod preset;
pub mod table;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use preset::{Preset, PresetLibrary, PresetMapping, BUILTIN_PRESETS};
pub use table::{MappingDiagnostic, MappingEntry, MappingTable, TargetBinding};
