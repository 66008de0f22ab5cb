//! Installs one activation driver per (target element, index) binding.

use serde::Serialize;

use super::rule::{ActivationRule, CONTROL_VARIABLE};
use crate::animation::CONTROL_PROPERTY;
use crate::error::{LipSyncError, Result};
use crate::host::{DriverSink, DriverSpec, DriverVariable, TargetGraph, TargetKind};
use crate::mapping::TargetBinding;

/// Outcome of one [`DriverBinder::bind`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindReport {
    pub target_kind: Option<TargetKind>,
    /// Drivers removed before installing.
    pub cleared: usize,
    pub installed: usize,
    /// Human-readable reasons for skipped bindings.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DriverBinder {
    controller: String,
    blend_range: f64,
}

impl DriverBinder {
    pub fn new(controller: impl Into<String>, blend_range: f64) -> Self {
        Self {
            controller: controller.into(),
            blend_range,
        }
    }

    fn variable(&self) -> DriverVariable {
        DriverVariable {
            name: CONTROL_VARIABLE.to_string(),
            source_owner: self.controller.clone(),
            source_path: format!("[\"{CONTROL_PROPERTY}\"]"),
        }
    }

    /// Bind `bindings` on `target`.
    ///
    /// All of the target's existing drivers are cleared first, so binding
    /// twice leaves the same rule set.  A binding whose element is missing
    /// or that the host rejects is logged and skipped; only a target of
    /// unknown kind fails the whole call.
    pub fn bind(
        &self,
        target: &str,
        bindings: &[TargetBinding],
        graph: &dyn TargetGraph,
        sink: &mut dyn DriverSink,
    ) -> Result<BindReport> {
        let (kind, elements) = resolve(target, graph)?;
        self.install(target, kind, &elements, bindings, sink)
    }

    /// [`bind`](Self::bind) for a host that is both graph and sink.
    pub fn bind_on<H: TargetGraph + DriverSink>(
        &self,
        target: &str,
        bindings: &[TargetBinding],
        host: &mut H,
    ) -> Result<BindReport> {
        let (kind, elements) = resolve(target, &*host)?;
        self.install(target, kind, &elements, bindings, host)
    }

    fn install(
        &self,
        target: &str,
        kind: TargetKind,
        elements: &[String],
        bindings: &[TargetBinding],
        sink: &mut dyn DriverSink,
    ) -> Result<BindReport> {
        let mut report = BindReport {
            target_kind: Some(kind),
            cleared: sink.clear_drivers(target)?,
            ..BindReport::default()
        };

        for binding in bindings {
            if !elements.iter().any(|e| *e == binding.target) {
                let reason = format!("'{}' not found on '{target}'", binding.target);
                log::warn!("driver: skipping index {}: {reason}", binding.index);
                report.skipped.push(reason);
                continue;
            }

            let rule = ActivationRule::new(binding.index, self.blend_range);
            let spec = DriverSpec {
                data_path: kind.data_path(&binding.target),
                expression: rule.expression(),
                variables: vec![self.variable()],
            };
            match sink.install_driver(target, &spec) {
                Ok(()) => report.installed += 1,
                Err(e) => {
                    log::warn!("driver: skipping '{}': {e}", binding.target);
                    report.skipped.push(e.to_string());
                }
            }
        }

        log::info!(
            "driver: bound {} elements on '{target}' ({} skipped)",
            report.installed,
            report.skipped.len()
        );
        Ok(report)
    }
}

fn resolve(target: &str, graph: &dyn TargetGraph) -> Result<(TargetKind, Vec<String>)> {
    let kind = graph.target_kind(target).ok_or_else(|| {
        LipSyncError::Mapping(format!("target '{target}' has neither layers nor blend shapes"))
    })?;
    Ok((kind, graph.sub_elements(target)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn bindings() -> Vec<TargetBinding> {
        vec![
            TargetBinding { index: 0, target: "rest".into() },
            TargetBinding { index: 1, target: "AI".into() },
            TargetBinding { index: 2, target: "O".into() },
        ]
    }

    fn host() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.add_layer_target("Face2D", &["rest", "AI", "O"])
            .add_blend_target("Head", &["rest", "AI"])
            .add_plain_target("Lamp");
        host
    }

    #[test]
    fn layer_target_gets_opacity_drivers() {
        let mut host = host();
        let graph = host.clone();
        let report = DriverBinder::new("Ctrl", 0.0)
            .bind("Face2D", &bindings(), &graph, &mut host)
            .expect("bind");

        assert_eq!(report.target_kind, Some(TargetKind::LayerContainer));
        assert_eq!(report.installed, 3);
        let drivers = host.drivers("Face2D");
        assert_eq!(drivers[1].data_path, "layers[\"AI\"].opacity");
        assert_eq!(drivers[1].expression, "1.0 if phoneme == 1 else 0.0");
        assert_eq!(drivers[1].variables[0].source_owner, "Ctrl");
        assert_eq!(drivers[1].variables[0].source_path, "[\"phoneme_index\"]");
    }

    #[test]
    fn blend_target_missing_element_is_skipped() {
        let mut host = host();
        let report = DriverBinder::new("Ctrl", 1.5)
            .bind_on("Head", &bindings(), &mut host)
            .expect("bind");

        assert_eq!(report.installed, 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].contains("'O'"));
        assert_eq!(
            host.drivers("Head")[0].expression,
            "max(0.0, 1.0 - abs(phoneme - 0) / 1.5)"
        );
        assert_eq!(host.drivers("Head")[0].data_path, "key_blocks[\"rest\"].value");
    }

    #[test]
    fn rebinding_is_idempotent() {
        let mut host = host();
        let binder = DriverBinder::new("Ctrl", 0.0);
        binder.bind_on("Face2D", &bindings(), &mut host).expect("bind");
        let first = host.drivers("Face2D").to_vec();

        let report = binder.bind_on("Face2D", &bindings(), &mut host).expect("rebind");
        assert_eq!(report.cleared, 3);
        assert_eq!(host.drivers("Face2D"), first.as_slice());
    }

    #[test]
    fn rejected_install_is_skipped() {
        let mut host = host();
        host.reject_driver_path("layers[\"AI\"].opacity");
        let report = DriverBinder::new("Ctrl", 0.0)
            .bind_on("Face2D", &bindings(), &mut host)
            .expect("bind");
        assert_eq!(report.installed, 2);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn target_without_capability_fails() {
        let mut host = host();
        let err = DriverBinder::new("Ctrl", 0.0)
            .bind_on("Lamp", &bindings(), &mut host)
            .unwrap_err();
        assert!(matches!(err, LipSyncError::Mapping(_)));
    }
}
