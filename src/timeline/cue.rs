//! Cue and timeline data model with JSON export/import.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LipSyncError, Result};

// ---------------------------------------------------------------------------
// SymbolSet
// ---------------------------------------------------------------------------

/// Alphabet the cue symbols of a timeline are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolSet {
    /// Nine mouth shapes `A`–`H` plus `X` (rest), as emitted by Rhubarb.
    #[serde(alias = "rhubarb")]
    Proprietary9,
    /// Classic Preston Blair shapes (`AI`, `E`, `O`, `U`, `MBP`, …).
    PrestonBlair,
    /// CMU ARPAbet phonemes; reduced to viseme classes before compiling.
    Arpabet,
    Ipa,
    Custom,
}

impl SymbolSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolSet::Proprietary9 => "proprietary9",
            SymbolSet::PrestonBlair => "preston_blair",
            SymbolSet::Arpabet => "arpabet",
            SymbolSet::Ipa => "ipa",
            SymbolSet::Custom => "custom",
        }
    }
}

impl Default for SymbolSet {
    fn default() -> Self {
        SymbolSet::Arpabet
    }
}

impl FromStr for SymbolSet {
    type Err = LipSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proprietary9" | "rhubarb" => Ok(SymbolSet::Proprietary9),
            "preston_blair" | "prestonblair" => Ok(SymbolSet::PrestonBlair),
            "arpabet" => Ok(SymbolSet::Arpabet),
            "ipa" => Ok(SymbolSet::Ipa),
            "custom" => Ok(SymbolSet::Custom),
            other => Err(LipSyncError::Mapping(format!("unknown symbol set '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// PhonemeCue
// ---------------------------------------------------------------------------

fn full_confidence() -> f64 {
    1.0
}

/// One timed phoneme (or mouth shape) label.  Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeCue {
    #[serde(alias = "phoneme")]
    pub symbol: String,
    #[serde(alias = "start_time")]
    pub start: f64,
    #[serde(alias = "end_time")]
    pub end: f64,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

impl PhonemeCue {
    pub fn new(symbol: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            confidence: 1.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// `true` when `start <= time < end`.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

fn default_sample_rate() -> u32 {
    44_100
}

fn default_language() -> String {
    "en".into()
}

/// The full result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(alias = "phonemes")]
    pub cues: Vec<PhonemeCue>,
    #[serde(default, alias = "duration")]
    pub total_duration: f64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, alias = "phoneme_set")]
    pub symbol_set: SymbolSet,
}

impl Timeline {
    /// Build a timeline whose `total_duration` is the end of the last cue.
    pub fn new(cues: Vec<PhonemeCue>, symbol_set: SymbolSet) -> Self {
        let total_duration = cues.last().map(|c| c.end).unwrap_or(0.0);
        Self {
            cues,
            total_duration,
            sample_rate: default_sample_rate(),
            language: default_language(),
            symbol_set,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    /// The cue sounding at `time`, if any.
    pub fn cue_at(&self, time: f64) -> Option<&PhonemeCue> {
        // Starts are non-decreasing: the candidate is the last cue starting at or before `time`.
        let idx = self.cues.partition_point(|c| c.start <= time);
        idx.checked_sub(1)
            .map(|i| &self.cues[i])
            .filter(|c| c.contains(time))
    }

    /// Symbol at `time`, `None` during silence.
    pub fn symbol_at(&self, time: f64) -> Option<&str> {
        self.cue_at(time).map(|c| c.symbol.as_str())
    }

    /// Export to a user-chosen JSON file, appending `.json` when the path has
    /// no such extension.  Returns the path written.
    pub fn save_to(&self, path: &Path) -> Result<PathBuf> {
        let path = with_json_extension(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        log::info!("timeline: exported {} cues to {}", self.len(), path.display());
        Ok(path)
    }

    /// Import a timeline previously written by [`save_to`](Self::save_to).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let timeline: Self = serde_json::from_str(&content)?;
        Ok(timeline)
    }
}

fn with_json_extension(path: &Path) -> PathBuf {
    let has_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if has_json {
        path.to_path_buf()
    } else {
        let mut raw = path.as_os_str().to_os_string();
        raw.push(".json");
        PathBuf::from(raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Timeline {
        Timeline::new(
            vec![
                PhonemeCue::new("X", 0.0, 0.2),
                PhonemeCue::new("B", 0.2, 0.5),
                PhonemeCue::new("C", 0.7, 0.9),
            ],
            SymbolSet::Proprietary9,
        )
    }

    #[test]
    fn total_duration_is_last_end() {
        assert!((sample().total_duration - 0.9).abs() < 1e-12);
        assert_eq!(Timeline::new(Vec::new(), SymbolSet::Custom).total_duration, 0.0);
    }

    #[test]
    fn duration_is_end_minus_start() {
        let cue = PhonemeCue::new("A", 1.25, 1.5);
        assert!((cue.duration() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn cue_at_finds_sounding_cue_and_gaps() {
        let tl = sample();
        assert_eq!(tl.symbol_at(0.0), Some("X"));
        assert_eq!(tl.symbol_at(0.2), Some("B"));
        assert_eq!(tl.symbol_at(0.6), None);
        assert_eq!(tl.symbol_at(0.8), Some("C"));
        assert_eq!(tl.symbol_at(0.9), None);
        assert_eq!(tl.symbol_at(-1.0), None);
    }

    #[test]
    fn deserialize_applies_defaults() {
        let json = r#"{"cues":[{"symbol":"AH","start":0.0,"end":0.1}]}"#;
        let tl: Timeline = serde_json::from_str(json).expect("parse");
        assert_eq!(tl.sample_rate, 44_100);
        assert_eq!(tl.language, "en");
        assert_eq!(tl.symbol_set, SymbolSet::Arpabet);
        assert_eq!(tl.cues[0].confidence, 1.0);
    }

    #[test]
    fn rhubarb_alias_maps_to_proprietary9() {
        let json = r#"{"cues":[],"symbol_set":"rhubarb"}"#;
        let tl: Timeline = serde_json::from_str(json).expect("parse");
        assert_eq!(tl.symbol_set, SymbolSet::Proprietary9);
        assert_eq!("Rhubarb".parse::<SymbolSet>().expect("parse"), SymbolSet::Proprietary9);
    }

    #[test]
    fn unknown_symbol_set_is_rejected() {
        assert!("klingon".parse::<SymbolSet>().is_err());
    }

    #[test]
    fn save_appends_json_extension_and_loads_back() {
        let dir = tempdir().expect("temp dir");
        let written = sample().save_to(&dir.path().join("take1")).expect("save");
        assert_eq!(written.file_name().and_then(|n| n.to_str()), Some("take1.json"));

        let loaded = Timeline::load_from(&written).expect("load");
        assert_eq!(loaded, sample());
    }

    #[test]
    fn save_keeps_existing_json_extension() {
        let dir = tempdir().expect("temp dir");
        let written = sample().save_to(&dir.path().join("take.JSON")).expect("save");
        assert_eq!(written.file_name().and_then(|n| n.to_str()), Some("take.JSON"));
    }
}
