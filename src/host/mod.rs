//! Host collaborator interfaces.
//!
//! The core never talks to a scene graph directly.  It needs three things
//! from the host, each behind its own trait:
//!
//! ```text
//! TargetGraph   what kind of container a target is, which named elements it has
//! KeyframeSink  write/clear keyframes on a control channel
//! DriverSink    install/clear per-element activation expressions
//! ```
//!
//! [`MemoryHost`] implements all three in memory; the CLI and the tests use it.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryHost;

// ---------------------------------------------------------------------------
// HostError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("target '{0}' does not exist")]
    UnknownTarget(String),

    #[error("host rejected write to {path}: {reason}")]
    Rejected { path: String, reason: String },
}

// ---------------------------------------------------------------------------
// TargetGraph
// ---------------------------------------------------------------------------

/// What a target container holds, resolved once per bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Stroke/drawing layers whose opacity is driven (`layers["name"].opacity`).
    LayerContainer,
    /// Mesh blend shapes whose weight is driven (`key_blocks["name"].value`).
    BlendChannelContainer,
}

impl TargetKind {
    /// Data path of the driven property of sub-element `element`.
    pub fn data_path(&self, element: &str) -> String {
        match self {
            TargetKind::LayerContainer => format!("layers[\"{element}\"].opacity"),
            TargetKind::BlendChannelContainer => format!("key_blocks[\"{element}\"].value"),
        }
    }
}

pub trait TargetGraph {
    /// `None` when the target exists but supports neither capability, or
    /// does not exist at all.
    fn target_kind(&self, target: &str) -> Option<TargetKind>;

    /// Names of the target's drivable sub-elements, in host order.
    fn sub_elements(&self, target: &str) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// KeyframeSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Step: the value holds until the next key.
    Constant,
    Linear,
    Bezier,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Constant
    }
}

/// Named clip on a track that keys are written into.  Keys inside are
/// clip-local; where the clip sits in the scene is set separately with
/// [`KeyframeSink::place_clip`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipSpec {
    pub name: String,
    pub track: String,
}

/// Address of one animated channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelPath {
    /// Object owning the channel (the controller).
    pub owner: String,
    /// `None` writes keys straight onto the owner's active animation.
    pub clip: Option<ClipSpec>,
    pub data_path: String,
}

impl std::fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.clip {
            Some(clip) => write!(f, "{}/{}:{}{}", clip.track, clip.name, self.owner, self.data_path),
            None => write!(f, "{}{}", self.owner, self.data_path),
        }
    }
}

pub trait KeyframeSink {
    /// Remove every key on `path`.  Returns how many were removed.
    fn clear_channel(&mut self, path: &ChannelPath) -> Result<usize, HostError>;

    /// Create `clip` on `owner` if needed and move it to `start_frame`.
    fn place_clip(&mut self, owner: &str, clip: &ClipSpec, start_frame: i64) -> Result<(), HostError>;

    fn insert_keyframe(
        &mut self,
        path: &ChannelPath,
        frame: i64,
        value: f64,
        interpolation: Interpolation,
    ) -> Result<(), HostError>;
}

// ---------------------------------------------------------------------------
// DriverSink
// ---------------------------------------------------------------------------

/// A single-property variable read by a driver expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverVariable {
    pub name: String,
    pub source_owner: String,
    pub source_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSpec {
    /// Driven property on the target, e.g. `layers["AI"].opacity`.
    pub data_path: String,
    pub expression: String,
    pub variables: Vec<DriverVariable>,
}

pub trait DriverSink {
    /// Remove every driver on `owner`.  Returns how many were removed.
    fn clear_drivers(&mut self, owner: &str) -> Result<usize, HostError>;

    fn install_driver(&mut self, owner: &str, driver: &DriverSpec) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_paths_per_kind() {
        assert_eq!(TargetKind::LayerContainer.data_path("AI"), "layers[\"AI\"].opacity");
        assert_eq!(
            TargetKind::BlendChannelContainer.data_path("mouth_O"),
            "key_blocks[\"mouth_O\"].value"
        );
    }

    #[test]
    fn channel_path_display() {
        let direct = ChannelPath {
            owner: "Ctrl".into(),
            clip: None,
            data_path: "[\"phoneme_index\"]".into(),
        };
        assert_eq!(direct.to_string(), "Ctrl[\"phoneme_index\"]");

        let clipped = ChannelPath {
            clip: Some(ClipSpec {
                name: "LipSync".into(),
                track: "LipSync".into(),
            }),
            ..direct
        };
        assert_eq!(clipped.to_string(), "LipSync/LipSync:Ctrl[\"phoneme_index\"]");
    }
}
