//! Eased transitions between keyframes.
//!
//! Between two keys `(f0, v0)` and `(f1, v1)` with `v0 != v1`, a transition
//! spans `d = min(duration_frames, f1 - f0)` frames and ends exactly on
//! `(f1, v1)`:
//!
//! ```text
//! f0            f1-d     f1-d+1 ...  f1-1     f1
//! v0 ─────────── v0  ──▶  eased  ...  eased ─▶ v1
//!              (anchor)  (rounded to 0.01)  (exact)
//! ```
//!
//! The anchor is only written when it does not coincide with `f0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::compile::KeyframeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingCurve {
    /// Cubic ease-in-out.
    EaseInOut,
    EaseIn,
    EaseOut,
    /// Linear.
    Smooth,
}

impl Default for EasingCurve {
    fn default() -> Self {
        EasingCurve::EaseInOut
    }
}

impl EasingCurve {
    /// Map `t ∈ [0, 1]` to progress `∈ [0, 1]`.  Monotonic non-decreasing.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingCurve::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let p = 2.0 * t - 2.0;
                    0.5 * p * p * p + 1.0
                }
            }
            EasingCurve::EaseIn => t * t * t,
            EasingCurve::EaseOut => {
                let u = 1.0 - t;
                1.0 - u * u * u
            }
            EasingCurve::Smooth => t,
        }
    }

    /// Unknown names fall back to [`EasingCurve::EaseInOut`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ease_in" => EasingCurve::EaseIn,
            "ease_out" => EasingCurve::EaseOut,
            "smooth" | "linear" => EasingCurve::Smooth,
            _ => EasingCurve::EaseInOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EasingOptions {
    #[serde(default)]
    pub curve: EasingCurve,
    /// Frames a transition may take.  Values below 2 disable easing.
    #[serde(default = "default_duration")]
    pub duration_frames: u32,
}

fn default_duration() -> u32 {
    3
}

impl Default for EasingOptions {
    fn default() -> Self {
        Self {
            curve: EasingCurve::default(),
            duration_frames: default_duration(),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Insert eased keys in front of every index change.  Original keys are
/// kept with their exact values.
pub fn apply_easing(
    keys: &BTreeMap<i64, u32>,
    options: &EasingOptions,
) -> BTreeMap<i64, KeyframeValue> {
    let mut out: BTreeMap<i64, KeyframeValue> = keys
        .iter()
        .map(|(&f, &v)| (f, KeyframeValue::Index(v)))
        .collect();

    if options.duration_frames < 2 {
        return out;
    }

    let pairs: Vec<(i64, u32)> = keys.iter().map(|(&f, &v)| (f, v)).collect();
    for w in pairs.windows(2) {
        let ((f0, v0), (f1, v1)) = (w[0], w[1]);
        if v0 == v1 {
            continue;
        }
        let d = (options.duration_frames as i64).min(f1 - f0);
        if d < 2 {
            continue;
        }

        let window_start = f1 - d;
        if window_start > f0 {
            out.insert(window_start, KeyframeValue::Index(v0));
        }
        let delta = v1 as f64 - v0 as f64;
        for step in 1..d {
            let t = step as f64 / d as f64;
            let value = round2(v0 as f64 + delta * options.curve.apply(t));
            out.insert(window_start + step, KeyframeValue::Eased(value));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn curves_hit_endpoints() {
        for curve in [
            EasingCurve::EaseInOut,
            EasingCurve::EaseIn,
            EasingCurve::EaseOut,
            EasingCurve::Smooth,
        ] {
            assert!(close(curve.apply(0.0), 0.0), "{curve:?}");
            assert!(close(curve.apply(1.0), 1.0), "{curve:?}");
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for curve in [
            EasingCurve::EaseInOut,
            EasingCurve::EaseIn,
            EasingCurve::EaseOut,
            EasingCurve::Smooth,
        ] {
            let mut prev = 0.0;
            for i in 0..=100 {
                let v = curve.apply(i as f64 / 100.0);
                assert!(v + 1e-12 >= prev, "{curve:?} at {i}");
                prev = v;
            }
        }
    }

    #[test]
    fn ease_in_out_midpoint_values() {
        assert!(close(EasingCurve::EaseInOut.apply(0.25), 0.0625));
        assert!(close(EasingCurve::EaseInOut.apply(0.5), 0.5));
        assert!(close(EasingCurve::EaseInOut.apply(0.75), 0.9375));
    }

    #[test]
    fn unknown_curve_name_defaults() {
        assert_eq!(EasingCurve::from_name("bouncy"), EasingCurve::EaseInOut);
        assert_eq!(EasingCurve::from_name("EASE_OUT"), EasingCurve::EaseOut);
    }

    #[test]
    fn transition_ends_on_exact_target() {
        let keys = BTreeMap::from([(1, 0), (11, 4)]);
        let out = apply_easing(
            &keys,
            &EasingOptions {
                curve: EasingCurve::Smooth,
                duration_frames: 4,
            },
        );
        let frames: Vec<i64> = out.keys().copied().collect();
        assert_eq!(frames, vec![1, 7, 8, 9, 10, 11]);
        assert_eq!(out[&7], KeyframeValue::Index(0));
        assert_eq!(out[&8], KeyframeValue::Eased(1.0));
        assert_eq!(out[&9], KeyframeValue::Eased(2.0));
        assert_eq!(out[&10], KeyframeValue::Eased(3.0));
        assert_eq!(out[&11], KeyframeValue::Index(4));
    }

    #[test]
    fn short_gap_shrinks_window_without_anchor() {
        let keys = BTreeMap::from([(1, 0), (3, 3)]);
        let out = apply_easing(&keys, &EasingOptions::default());
        let frames: Vec<i64> = out.keys().copied().collect();
        assert_eq!(frames, vec![1, 2, 3]);
        assert_eq!(out[&1], KeyframeValue::Index(0));
        assert_eq!(out[&2], KeyframeValue::Eased(1.5));
    }

    #[test]
    fn equal_values_and_tiny_duration_add_nothing() {
        let keys = BTreeMap::from([(1, 2), (10, 2), (11, 5)]);
        assert_eq!(apply_easing(&keys, &EasingOptions::default()).len(), 3);

        let keys = BTreeMap::from([(1, 0), (10, 5)]);
        let off = EasingOptions {
            duration_frames: 1,
            ..EasingOptions::default()
        };
        assert_eq!(apply_easing(&keys, &off).len(), 2);
    }

    #[test]
    fn values_are_rounded_to_two_decimals() {
        let keys = BTreeMap::from([(0, 0), (3, 1)]);
        let out = apply_easing(
            &keys,
            &EasingOptions {
                curve: EasingCurve::Smooth,
                duration_frames: 3,
            },
        );
        assert_eq!(out[&1], KeyframeValue::Eased(0.33));
        assert_eq!(out[&2], KeyframeValue::Eased(0.67));
    }
}
