//! In-memory host used by the CLI and the test suite.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{
    ChannelPath, ClipSpec, DriverSink, DriverSpec, HostError, Interpolation, KeyframeSink, TargetGraph,
    TargetKind,
};

/// One key as the host recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordedKey {
    pub frame: i64,
    pub value: f64,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone)]
struct MemoryTarget {
    kind: Option<TargetKind>,
    elements: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    targets: BTreeMap<String, MemoryTarget>,
    channels: BTreeMap<ChannelPath, BTreeMap<i64, RecordedKey>>,
    clips: BTreeMap<(String, ClipSpec), i64>,
    drivers: BTreeMap<String, Vec<DriverSpec>>,
    rejected_paths: BTreeSet<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer container (e.g. a 2D drawing object) with named layers.
    pub fn add_layer_target(&mut self, name: &str, layers: &[&str]) -> &mut Self {
        self.add_target(name, Some(TargetKind::LayerContainer), layers)
    }

    /// Register a mesh with named blend shapes.
    pub fn add_blend_target(&mut self, name: &str, shapes: &[&str]) -> &mut Self {
        self.add_target(name, Some(TargetKind::BlendChannelContainer), shapes)
    }

    /// Register a target with no drivable capability.
    pub fn add_plain_target(&mut self, name: &str) -> &mut Self {
        self.add_target(name, None, &[])
    }

    fn add_target(&mut self, name: &str, kind: Option<TargetKind>, elements: &[&str]) -> &mut Self {
        self.targets.insert(
            name.to_string(),
            MemoryTarget {
                kind,
                elements: elements.iter().map(|e| e.to_string()).collect(),
            },
        );
        self
    }

    /// Make every driver install on `data_path` fail.
    pub fn reject_driver_path(&mut self, data_path: &str) -> &mut Self {
        self.rejected_paths.insert(data_path.to_string());
        self
    }

    pub fn keys(&self, path: &ChannelPath) -> Vec<RecordedKey> {
        self.channels
            .get(path)
            .map(|keys| keys.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn channels(&self) -> impl Iterator<Item = (&ChannelPath, Vec<RecordedKey>)> {
        self.channels
            .iter()
            .map(|(path, keys)| (path, keys.values().copied().collect()))
    }

    /// Scene frame `clip` on `owner` is placed at.
    pub fn clip_start(&self, owner: &str, clip: &ClipSpec) -> Option<i64> {
        self.clips.get(&(owner.to_string(), clip.clone())).copied()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn drivers(&self, owner: &str) -> &[DriverSpec] {
        self.drivers.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl TargetGraph for MemoryHost {
    fn target_kind(&self, target: &str) -> Option<TargetKind> {
        self.targets.get(target).and_then(|t| t.kind)
    }

    fn sub_elements(&self, target: &str) -> Vec<String> {
        self.targets
            .get(target)
            .map(|t| t.elements.clone())
            .unwrap_or_default()
    }
}

impl KeyframeSink for MemoryHost {
    fn clear_channel(&mut self, path: &ChannelPath) -> Result<usize, HostError> {
        Ok(self.channels.remove(path).map(|keys| keys.len()).unwrap_or(0))
    }

    fn place_clip(&mut self, owner: &str, clip: &ClipSpec, start_frame: i64) -> Result<(), HostError> {
        if owner.is_empty() {
            return Err(HostError::UnknownTarget(owner.to_string()));
        }
        self.clips.insert((owner.to_string(), clip.clone()), start_frame);
        Ok(())
    }

    fn insert_keyframe(
        &mut self,
        path: &ChannelPath,
        frame: i64,
        value: f64,
        interpolation: Interpolation,
    ) -> Result<(), HostError> {
        if path.owner.is_empty() {
            return Err(HostError::UnknownTarget(path.owner.clone()));
        }
        self.channels.entry(path.clone()).or_default().insert(
            frame,
            RecordedKey {
                frame,
                value,
                interpolation,
            },
        );
        Ok(())
    }
}

impl DriverSink for MemoryHost {
    fn clear_drivers(&mut self, owner: &str) -> Result<usize, HostError> {
        Ok(self.drivers.remove(owner).map(|d| d.len()).unwrap_or(0))
    }

    fn install_driver(&mut self, owner: &str, driver: &DriverSpec) -> Result<(), HostError> {
        if !self.targets.contains_key(owner) {
            return Err(HostError::UnknownTarget(owner.to_string()));
        }
        if self.rejected_paths.contains(&driver.data_path) {
            return Err(HostError::Rejected {
                path: driver.data_path.clone(),
                reason: "property is locked".into(),
            });
        }
        let installed = self.drivers.entry(owner.to_string()).or_default();
        // One driver per driven property, like a real host.
        installed.retain(|d| d.data_path != driver.data_path);
        installed.push(driver.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> ChannelPath {
        ChannelPath {
            owner: "Ctrl".into(),
            clip: None,
            data_path: "[\"phoneme_index\"]".into(),
        }
    }

    #[test]
    fn graph_reports_kind_and_elements() {
        let mut host = MemoryHost::new();
        host.add_layer_target("Face2D", &["AI", "E"])
            .add_blend_target("Head", &["O"])
            .add_plain_target("Empty");

        assert_eq!(host.target_kind("Face2D"), Some(TargetKind::LayerContainer));
        assert_eq!(host.target_kind("Head"), Some(TargetKind::BlendChannelContainer));
        assert_eq!(host.target_kind("Empty"), None);
        assert_eq!(host.target_kind("Nope"), None);
        assert_eq!(host.sub_elements("Face2D"), vec!["AI", "E"]);
    }

    #[test]
    fn keys_replace_on_same_frame_and_clear() {
        let mut host = MemoryHost::new();
        host.insert_keyframe(&path(), 1, 0.0, Interpolation::Constant).expect("insert");
        host.insert_keyframe(&path(), 1, 3.0, Interpolation::Constant).expect("insert");
        host.insert_keyframe(&path(), 5, 2.0, Interpolation::Constant).expect("insert");

        let keys = host.keys(&path());
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].value, 3.0);

        assert_eq!(host.clear_channel(&path()).expect("clear"), 2);
        assert!(host.keys(&path()).is_empty());
    }

    #[test]
    fn placing_a_clip_again_moves_it() {
        let mut host = MemoryHost::new();
        let clip = ClipSpec {
            name: "LipSync".into(),
            track: "LipSync".into(),
        };
        host.place_clip("Ctrl", &clip, 1).expect("place");
        host.place_clip("Ctrl", &clip, 100).expect("move");
        assert_eq!(host.clip_count(), 1);
        assert_eq!(host.clip_start("Ctrl", &clip), Some(100));
    }

    #[test]
    fn driver_install_requires_known_target() {
        let mut host = MemoryHost::new();
        let spec = DriverSpec {
            data_path: "layers[\"AI\"].opacity".into(),
            expression: "1.0".into(),
            variables: Vec::new(),
        };
        assert_eq!(
            host.install_driver("Ghost", &spec),
            Err(HostError::UnknownTarget("Ghost".into()))
        );
    }
}
