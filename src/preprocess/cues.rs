//! Merge and minimum-hold passes over a cue list.

use crate::timeline::PhonemeCue;

/// Merge, then hold.  A non-positive (or non-finite) parameter disables its
/// pass, so `process(cues, 0.0, 0.0)` returns the input unchanged.
pub fn process(cues: &[PhonemeCue], merge_threshold: f64, min_hold_seconds: f64) -> Vec<PhonemeCue> {
    let merged = merge_close_cues(cues, merge_threshold);
    apply_min_hold(&merged, min_hold_seconds)
}

/// Drop cues starting less than `threshold` seconds after the previous
/// retained cue.  The retained cue absorbs the dropped cue's end.  The first
/// cue is always retained.
pub fn merge_close_cues(cues: &[PhonemeCue], threshold: f64) -> Vec<PhonemeCue> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return cues.to_vec();
    }

    let mut out: Vec<PhonemeCue> = Vec::with_capacity(cues.len());
    for cue in cues {
        match out.last_mut() {
            Some(kept) if cue.start - kept.start < threshold => {
                kept.end = kept.end.max(cue.end);
            }
            _ => out.push(cue.clone()),
        }
    }

    if out.len() != cues.len() {
        log::debug!(
            "preprocess: merged {} cues into {} (threshold {threshold}s)",
            cues.len(),
            out.len()
        );
    }
    out
}

/// Extend cues shorter than `min_hold` seconds to `start + min_hold`, never
/// past the next cue's start.
pub fn apply_min_hold(cues: &[PhonemeCue], min_hold: f64) -> Vec<PhonemeCue> {
    if !(min_hold.is_finite() && min_hold > 0.0) {
        return cues.to_vec();
    }

    let mut out = cues.to_vec();
    for i in 0..out.len() {
        if out[i].duration() >= min_hold {
            continue;
        }
        let mut end = out[i].start + min_hold;
        if let Some(next) = cues.get(i + 1) {
            end = end.min(next.start);
        }
        // Never shorten a cue that already overlaps its successor.
        out[i].end = out[i].end.max(end);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
