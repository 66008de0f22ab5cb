//! Cue list + mapping table → keyframe set.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::easing::{apply_easing, EasingOptions};
use crate::error::{LipSyncError, Result};
use crate::mapping::{MappingTable, TargetBinding};
use crate::timeline::PhonemeCue;

// ---------------------------------------------------------------------------
// KeyframeValue / KeyframeSet
// ---------------------------------------------------------------------------

/// Control value at one frame: an exact mapping index, or an intermediate
/// value synthesised by easing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyframeValue {
    Index(u32),
    Eased(f64),
}

impl KeyframeValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            KeyframeValue::Index(i) => i as f64,
            KeyframeValue::Eased(v) => v,
        }
    }
}

/// Frame → value, frames strictly increasing, one value per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeyframeSet {
    keys: BTreeMap<i64, KeyframeValue>,
}

impl KeyframeSet {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, frame: i64) -> Option<KeyframeValue> {
        self.keys.get(&frame).copied()
    }

    pub fn first_frame(&self) -> Option<i64> {
        self.keys.keys().next().copied()
    }

    pub fn last_frame(&self) -> Option<i64> {
        self.keys.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, KeyframeValue)> + '_ {
        self.keys.iter().map(|(&f, &v)| (f, v))
    }

    pub fn frames(&self) -> Vec<i64> {
        self.keys.keys().copied().collect()
    }
}

impl From<BTreeMap<i64, KeyframeValue>> for KeyframeSet {
    fn from(keys: BTreeMap<i64, KeyframeValue>) -> Self {
        Self { keys }
    }
}

// ---------------------------------------------------------------------------
// Options / output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub fps: f64,
    pub start_frame: i64,
    /// Minimum spacing of retained keys in frames.  `0` keeps every key.
    pub min_hold_frames: u32,
    pub easing: Option<EasingOptions>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            fps: 24.0,
            start_frame: 1,
            min_hold_frames: 2,
            easing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAnimation {
    pub keyframes: KeyframeSet,
    /// Cues whose symbol had no enabled mapping; they were keyed at index 0.
    pub unmapped_count: usize,
    pub cue_count: usize,
    /// Which sub-element shows at which index.
    pub bindings: Vec<TargetBinding>,
}

impl CompiledAnimation {
    /// Distinct exact indices that appear in the keyframes.
    pub fn unique_indices(&self) -> usize {
        self.keyframes
            .iter()
            .filter_map(|(_, v)| match v {
                KeyframeValue::Index(i) => Some(i),
                KeyframeValue::Eased(_) => None,
            })
            .collect::<BTreeSet<_>>()
            .len()
    }
}

// ---------------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------------

/// `round(seconds × fps) + start_frame`, rounding half away from zero.
pub fn time_to_frame(seconds: f64, fps: f64, start_frame: i64) -> i64 {
    (seconds * fps).round() as i64 + start_frame
}

/// Drop keys closer than `min_hold` frames to the previous retained key.
/// The first key is always retained.
pub fn apply_min_hold_frames(keys: &BTreeMap<i64, u32>, min_hold: u32) -> BTreeMap<i64, u32> {
    if min_hold == 0 {
        return keys.clone();
    }
    let mut out = BTreeMap::new();
    let mut last: Option<i64> = None;
    for (&frame, &index) in keys {
        if last.map_or(true, |l| frame - l >= min_hold as i64) {
            out.insert(frame, index);
            last = Some(frame);
        }
    }
    out
}

fn check_preconditions(cues: &[PhonemeCue], options: &CompileOptions) -> Result<()> {
    if !(options.fps.is_finite() && options.fps > 0.0) {
        return Err(LipSyncError::InvalidTimeline(format!(
            "frame rate must be positive, got {}",
            options.fps
        )));
    }
    let mut prev_start = 0.0_f64;
    for (i, cue) in cues.iter().enumerate() {
        if !(cue.start.is_finite() && cue.end.is_finite()) || cue.start < 0.0 {
            return Err(LipSyncError::InvalidTimeline(format!(
                "cue {i} ('{}') has invalid times {}..{}",
                cue.symbol, cue.start, cue.end
            )));
        }
        if cue.end <= cue.start {
            return Err(LipSyncError::InvalidTimeline(format!(
                "cue {i} ('{}') ends at {} but starts at {}",
                cue.symbol, cue.end, cue.start
            )));
        }
        if cue.start < prev_start {
            return Err(LipSyncError::InvalidTimeline(format!(
                "cue {i} ('{}') starts at {} before the previous cue at {prev_start}",
                cue.symbol, cue.start
            )));
        }
        prev_start = cue.start;
    }
    Ok(())
}

/// Compile processed cues into keyframes.
///
/// Unmapped symbols are keyed at index 0 and counted, never an error.  When
/// several cues land on one frame the later cue wins.
pub fn compile(
    cues: &[PhonemeCue],
    table: &MappingTable,
    options: &CompileOptions,
) -> Result<CompiledAnimation> {
    check_preconditions(cues, options)?;

    let mut unmapped_count = 0;
    let mut raw: BTreeMap<i64, u32> = BTreeMap::new();
    for cue in cues {
        let index = match table.resolve(&cue.symbol) {
            Some(index) => index,
            None => {
                log::debug!("animation: no mapping for '{}', using index 0", cue.symbol);
                unmapped_count += 1;
                0
            }
        };
        raw.insert(time_to_frame(cue.start, options.fps, options.start_frame), index);
    }

    let held = apply_min_hold_frames(&raw, options.min_hold_frames);
    let keys = match &options.easing {
        Some(easing) => apply_easing(&held, easing),
        None => held
            .iter()
            .map(|(&f, &v)| (f, KeyframeValue::Index(v)))
            .collect(),
    };
    let keyframes = KeyframeSet::from(keys);

    if unmapped_count > 0 {
        log::warn!("animation: {unmapped_count} cues had no enabled mapping");
    }
    log::info!(
        "animation: compiled {} cues into {} keyframes ({} dropped by min-hold)",
        cues.len(),
        keyframes.len(),
        raw.len() - held.len()
    );

    Ok(CompiledAnimation {
        keyframes,
        unmapped_count,
        cue_count: cues.len(),
        bindings: table.bindings(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingEntry;

    fn table() -> MappingTable {
        let mut t = MappingTable::new();
        t.insert(MappingEntry::new("X", 0).with_target("rest"));
        t.insert(MappingEntry::new("A", 1).with_target("mbp"));
        t.insert(MappingEntry::new("B", 2).with_target("etc"));
        t
    }

    fn cue(symbol: &str, start: f64, end: f64) -> PhonemeCue {
        PhonemeCue::new(symbol, start, end)
    }

    fn no_hold() -> CompileOptions {
        CompileOptions {
            min_hold_frames: 0,
            ..CompileOptions::default()
        }
    }

    #[test]
    fn frame_rounding() {
        assert_eq!(time_to_frame(0.5, 24.0, 1), 13);
        assert_eq!(time_to_frame(0.0, 24.0, 1), 1);
        // 0.0625 × 24 = 1.5 exactly: half rounds away from zero.
        assert_eq!(time_to_frame(0.0625, 24.0, 0), 2);
        assert_eq!(time_to_frame(1.0, 30.0, 100), 130);
    }

    #[test]
    fn keys_follow_cue_starts() {
        let cues = vec![cue("X", 0.0, 0.5), cue("A", 0.5, 1.0), cue("B", 1.0, 1.2)];
        let out = compile(&cues, &table(), &no_hold()).expect("compile");
        assert_eq!(out.keyframes.frames(), vec![1, 13, 25]);
        assert_eq!(out.keyframes.get(13), Some(KeyframeValue::Index(1)));
        assert_eq!(out.unmapped_count, 0);
        assert_eq!(out.cue_count, 3);
        assert_eq!(out.unique_indices(), 3);
    }

    #[test]
    fn unmapped_symbols_key_index_zero_and_count() {
        let cues = vec![cue("A", 0.0, 0.5), cue("Q", 0.5, 1.0)];
        let out = compile(&cues, &table(), &no_hold()).expect("compile");
        assert_eq!(out.unmapped_count, 1);
        assert_eq!(out.keyframes.get(13), Some(KeyframeValue::Index(0)));
    }

    #[test]
    fn disabled_entry_counts_as_unmapped() {
        let mut t = table();
        t.set_enabled("A", false).expect("toggle");
        let out = compile(&[cue("A", 0.0, 0.5)], &t, &no_hold()).expect("compile");
        assert_eq!(out.unmapped_count, 1);
        assert!(out.bindings.iter().all(|b| b.target != "mbp"));
    }

    #[test]
    fn later_cue_wins_on_shared_frame() {
        // 0.0 and 0.01 both land on frame 1 at 24 fps.
        let cues = vec![cue("A", 0.0, 0.01), cue("B", 0.01, 0.5)];
        let out = compile(&cues, &table(), &no_hold()).expect("compile");
        assert_eq!(out.keyframes.len(), 1);
        assert_eq!(out.keyframes.get(1), Some(KeyframeValue::Index(2)));
    }

    #[test]
    fn min_hold_frames_drops_close_keys_keeps_first() {
        let keys = BTreeMap::from([(1, 0), (2, 1), (3, 2), (6, 1), (7, 0)]);
        let held = apply_min_hold_frames(&keys, 2);
        assert_eq!(held.keys().copied().collect::<Vec<_>>(), vec![1, 3, 6]);

        let single = BTreeMap::from([(5, 4)]);
        assert_eq!(apply_min_hold_frames(&single, 10), single);
    }

    #[test]
    fn precondition_violations_fail_compile() {
        let t = table();
        let bad_fps = CompileOptions {
            fps: 0.0,
            ..CompileOptions::default()
        };
        assert!(matches!(
            compile(&[cue("A", 0.0, 0.1)], &t, &bad_fps),
            Err(LipSyncError::InvalidTimeline(_))
        ));
        assert!(matches!(
            compile(&[cue("A", 0.2, 0.2)], &t, &no_hold()),
            Err(LipSyncError::InvalidTimeline(_))
        ));
        assert!(matches!(
            compile(&[cue("A", 0.5, 0.6), cue("B", 0.1, 0.2)], &t, &no_hold()),
            Err(LipSyncError::InvalidTimeline(_))
        ));
        assert!(matches!(
            compile(&[cue("A", f64::NAN, 0.6)], &t, &no_hold()),
            Err(LipSyncError::InvalidTimeline(_))
        ));
    }

    #[test]
    fn empty_cue_list_compiles_to_empty_set() {
        let out = compile(&[], &table(), &CompileOptions::default()).expect("compile");
        assert!(out.keyframes.is_empty());
        assert_eq!(out.keyframes.first_frame(), None);
    }

    #[test]
    fn bindings_come_from_table() {
        let out = compile(&[], &table(), &CompileOptions::default()).expect("compile");
        let targets: Vec<_> = out.bindings.iter().map(|b| (b.index, b.target.as_str())).collect();
        assert_eq!(targets, vec![(0, "rest"), (1, "mbp"), (2, "etc")]);
    }

    #[test]
    fn easing_keeps_exact_final_keys() {
        let cues = vec![cue("X", 0.0, 0.5), cue("B", 0.5, 1.0)];
        let options = CompileOptions {
            min_hold_frames: 0,
            easing: Some(EasingOptions::default()),
            ..CompileOptions::default()
        };
        let out = compile(&cues, &table(), &options).expect("compile");
        assert_eq!(out.keyframes.get(1), Some(KeyframeValue::Index(0)));
        assert_eq!(out.keyframes.get(10), Some(KeyframeValue::Index(0)));
        assert!(matches!(out.keyframes.get(11), Some(KeyframeValue::Eased(_))));
        assert!(matches!(out.keyframes.get(12), Some(KeyframeValue::Eased(_))));
        assert_eq!(out.keyframes.get(13), Some(KeyframeValue::Index(2)));
        assert_eq!(out.keyframes.len(), 5);
    }

    #[test]
    fn compile_is_deterministic() {
        let cues = vec![cue("X", 0.0, 0.3), cue("A", 0.3, 0.7), cue("B", 0.7, 0.9)];
        let options = CompileOptions::default();
        let a = compile(&cues, &table(), &options).expect("compile");
        let b = compile(&cues, &table(), &options).expect("compile");
        assert_eq!(a, b);
    }
}
