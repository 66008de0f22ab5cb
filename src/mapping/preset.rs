//! Mapping presets: built-in ones compiled into the binary plus user presets
//! stored as `<presets_dir>/<name>.json`.
//!
//! Format:
//!
//! ```json
//! { "name": "rhubarb", "phoneme_set": "proprietary9",
//!   "mappings": [ { "phoneme": "X", "index": 0 }, ... ] }
//! ```
//!
//! A user preset with the same name as a built-in one shadows it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::table::{MappingEntry, MappingTable};
use crate::error::{LipSyncError, Result};
use crate::timeline::SymbolSet;

/// Built-in presets as `(name, json)`.
pub const BUILTIN_PRESETS: &[(&str, &str)] = &[
    ("arpabet", include_str!("../../presets/arpabet.json")),
    ("preston_blair", include_str!("../../presets/preston_blair.json")),
    ("rhubarb", include_str!("../../presets/rhubarb.json")),
];

// ---------------------------------------------------------------------------
// Preset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetMapping {
    pub phoneme: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub phoneme_set: SymbolSet,
    pub mappings: Vec<PresetMapping>,
}

impl Preset {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LipSyncError::Preset(format!("malformed preset: {e}")))
    }

    /// Every mapping becomes an enabled entry.  Targets are carried over
    /// when the preset has them.
    pub fn to_table(&self) -> MappingTable {
        let mut table = MappingTable::new();
        for m in &self.mappings {
            table.insert(MappingEntry {
                symbol: m.phoneme.clone(),
                index: m.index,
                target_name: m.target.clone(),
                enabled: true,
            });
        }
        table
    }

    /// Snapshot a table as a preset, e.g. to save a user's custom mapping.
    pub fn from_table(name: &str, phoneme_set: SymbolSet, table: &MappingTable) -> Self {
        Self {
            name: name.to_string(),
            phoneme_set,
            mappings: table
                .entries()
                .into_iter()
                .map(|e| PresetMapping {
                    phoneme: e.symbol.clone(),
                    index: e.index,
                    target: e.target_name.clone(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// PresetLibrary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    dir: Option<PathBuf>,
}

impl PresetLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn builtin_only() -> Self {
        Self { dir: None }
    }

    /// Sorted, de-duplicated preset names.
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            BUILTIN_PRESETS.iter().map(|(name, _)| name.to_string()).collect();

        if let Some(dir) = &self.dir {
            match std::fs::read_dir(dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let path = entry.path();
                        if path.extension().is_some_and(|e| e == "json") {
                            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                                names.insert(stem.to_string());
                            }
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("presets: cannot read {}: {e}", dir.display()),
            }
        }
        names.into_iter().collect()
    }

    pub fn load(&self, name: &str) -> Result<Preset> {
        validate_name(name)?;
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.json"));
            if path.is_file() {
                log::debug!("presets: loading user preset {}", path.display());
                return Self::load_file(&path);
            }
        }
        BUILTIN_PRESETS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .ok_or_else(|| LipSyncError::Preset(format!("preset '{name}' not found")))
            .and_then(|(_, json)| Preset::from_json(json))
    }

    pub fn load_file(path: &Path) -> Result<Preset> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LipSyncError::Preset(format!("cannot read {}: {e}", path.display()))
        })?;
        Preset::from_json(&content)
    }

    /// Write `preset` as pretty JSON into the presets directory.
    pub fn save(&self, preset: &Preset) -> Result<PathBuf> {
        validate_name(&preset.name)?;
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| LipSyncError::Preset("no presets directory configured".into()))?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", preset.name));
        std::fs::write(&path, serde_json::to_string_pretty(preset)?)?;
        log::info!("presets: saved '{}' to {}", preset.name, path.display());
        Ok(path)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(LipSyncError::Preset(format!("invalid preset name '{name}'")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builtins_parse() {
        let lib = PresetLibrary::builtin_only();
        for (name, _) in BUILTIN_PRESETS {
            let preset = lib.load(name).expect("builtin preset");
            assert_eq!(preset.name, *name);
            assert!(!preset.mappings.is_empty());
        }
    }

    #[test]
    fn rhubarb_preset_has_nine_shapes() {
        let preset = PresetLibrary::builtin_only().load("rhubarb").expect("load");
        assert_eq!(preset.phoneme_set, SymbolSet::Proprietary9);
        let table = preset.to_table();
        assert_eq!(table.len(), 9);
        assert_eq!(table.resolve("X"), Some(0));
        assert_eq!(table.resolve("A"), Some(1));
        assert_eq!(table.resolve("H"), Some(8));
    }

    #[test]
    fn arpabet_preset_matches_viseme_indices() {
        use crate::preprocess::Viseme;
        let table = PresetLibrary::builtin_only()
            .load("arpabet")
            .expect("load")
            .to_table();
        for v in Viseme::ALL {
            assert_eq!(table.resolve(v.name()), Some(v.index()), "{}", v.name());
        }
    }

    #[test]
    fn unknown_preset_is_error() {
        let err = PresetLibrary::builtin_only().load("nope").unwrap_err();
        assert!(matches!(err, LipSyncError::Preset(_)));
    }

    #[test]
    fn user_preset_shadows_builtin_and_is_listed() {
        let dir = tempdir().expect("temp dir");
        let lib = PresetLibrary::new(dir.path());

        let mut table = MappingTable::new();
        table.insert(MappingEntry::new("X", 0).with_target("closed"));
        table.insert(MappingEntry::new("A", 4));
        lib.save(&Preset::from_table("rhubarb", SymbolSet::Proprietary9, &table))
            .expect("save");
        lib.save(&Preset::from_table("mine", SymbolSet::Custom, &table))
            .expect("save");

        let loaded = lib.load("rhubarb").expect("load").to_table();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.resolve("A"), Some(4));
        assert_eq!(
            loaded.get("X").and_then(|e| e.target_name.as_deref()),
            Some("closed")
        );

        assert_eq!(lib.list(), vec!["arpabet", "mine", "preston_blair", "rhubarb"]);
    }

    #[test]
    fn save_without_dir_or_with_bad_name_fails() {
        let preset = Preset {
            name: "x".into(),
            phoneme_set: SymbolSet::Custom,
            mappings: Vec::new(),
        };
        assert!(PresetLibrary::builtin_only().save(&preset).is_err());

        let dir = tempdir().expect("temp dir");
        let bad = Preset {
            name: "../x".into(),
            ..preset
        };
        assert!(PresetLibrary::new(dir.path()).save(&bad).is_err());
    }
}
