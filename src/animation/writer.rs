//! Writes a [`KeyframeSet`] onto the controller's control channel.

use serde::{Deserialize, Serialize};

use super::compile::KeyframeSet;
use crate::host::{ChannelPath, ClipSpec, HostError, Interpolation, KeyframeSink};

/// Custom property on the controller that carries the control value.
pub const CONTROL_PROPERTY: &str = "phoneme_index";

/// Where keys are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputForm {
    /// Straight onto the controller's active animation, at scene frames.
    Direct,
    /// Into a named clip on a track, placed at the start frame; key frames
    /// are clip-local.
    Clip { name: String, track: String },
}

impl Default for OutputForm {
    fn default() -> Self {
        OutputForm::Clip {
            name: "LipSync".into(),
            track: "LipSync".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub controller: String,
    pub form: OutputForm,
    pub interpolation: Interpolation,
    pub start_frame: i64,
}

impl WriteOptions {
    pub fn channel(&self) -> ChannelPath {
        ChannelPath {
            owner: self.controller.clone(),
            clip: match &self.form {
                OutputForm::Direct => None,
                OutputForm::Clip { name, track } => Some(ClipSpec {
                    name: name.clone(),
                    track: track.clone(),
                }),
            },
            data_path: format!("[\"{CONTROL_PROPERTY}\"]"),
        }
    }
}

/// Replace whatever is on the channel with `keys`.  Returns the number of
/// keys written.
pub fn write_keyframes(
    keys: &KeyframeSet,
    options: &WriteOptions,
    sink: &mut dyn KeyframeSink,
) -> Result<usize, HostError> {
    let channel = options.channel();
    let cleared = sink.clear_channel(&channel)?;
    if cleared > 0 {
        log::debug!("animation: cleared {cleared} old keys on {channel}");
    }
    if let Some(clip) = &channel.clip {
        sink.place_clip(&channel.owner, clip, options.start_frame)?;
    }

    let offset = match options.form {
        OutputForm::Direct => 0,
        OutputForm::Clip { .. } => options.start_frame,
    };
    for (frame, value) in keys.iter() {
        sink.insert_keyframe(&channel, frame - offset, value.as_f64(), options.interpolation)?;
    }

    log::info!("animation: wrote {} keys to {channel}", keys.len());
    Ok(keys.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
