//! Activation rules: control value → element weight.

/// Name of the driver variable bound to the controller's control property.
pub const CONTROL_VARIABLE: &str = "phoneme";

/// Weight function for the element bound to `index`.
///
/// Without a blend range the element is fully on at exactly `index` and off
/// otherwise.  With `blend_range = r > 0` it fades linearly to zero over
/// `|control - index| = r`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationRule {
    pub index: u32,
    pub blend_range: f64,
}

impl ActivationRule {
    pub fn new(index: u32, blend_range: f64) -> Self {
        Self { index, blend_range }
    }

    fn blends(&self) -> bool {
        self.blend_range.is_finite() && self.blend_range > 0.0
    }

    pub fn evaluate(&self, control: f64) -> f64 {
        let index = self.index as f64;
        if self.blends() {
            (1.0 - (control - index).abs() / self.blend_range).max(0.0)
        } else if control == index {
            1.0
        } else {
            0.0
        }
    }

    /// Host-evaluated expression text for this rule.
    pub fn expression(&self) -> String {
        if self.blends() {
            format!(
                "max(0.0, 1.0 - abs({CONTROL_VARIABLE} - {}) / {:?})",
                self.index, self.blend_range
            )
        } else {
            format!("1.0 if {CONTROL_VARIABLE} == {} else 0.0", self.index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_rule() {
        let rule = ActivationRule::new(3, 0.0);
        assert_eq!(rule.evaluate(3.0), 1.0);
        assert_eq!(rule.evaluate(2.0), 0.0);
        assert_eq!(rule.evaluate(3.5), 0.0);
        assert_eq!(rule.expression(), "1.0 if phoneme == 3 else 0.0");
    }

    #[test]
    fn blended_rule() {
        let rule = ActivationRule::new(3, 2.0);
        assert_eq!(rule.evaluate(3.0), 1.0);
        assert!((rule.evaluate(2.0) - 0.5).abs() < 1e-12);
        assert!((rule.evaluate(4.5) - 0.25).abs() < 1e-12);
        assert_eq!(rule.evaluate(6.0), 0.0);
        assert_eq!(rule.expression(), "max(0.0, 1.0 - abs(phoneme - 3) / 2.0)");
    }

    #[test]
    fn negative_range_falls_back_to_step() {
        let rule = ActivationRule::new(1, -1.0);
        assert_eq!(rule.evaluate(1.2), 0.0);
        assert!(rule.expression().starts_with("1.0 if"));
    }
}
