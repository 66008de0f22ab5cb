//! [`MappingTable`] and the bindings derived from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LipSyncError, Result};

// ---------------------------------------------------------------------------
// MappingEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub symbol: String,
    /// Control value emitted while this symbol sounds.
    pub index: u32,
    /// Sub-element (layer or blend shape) shown for this index.
    pub target_name: Option<String>,
    pub enabled: bool,
}

impl MappingEntry {
    pub fn new(symbol: impl Into<String>, index: u32) -> Self {
        Self {
            symbol: symbol.into(),
            index,
            target_name: None,
            enabled: true,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = Some(target.into());
        self
    }
}

// ---------------------------------------------------------------------------
// TargetBinding
// ---------------------------------------------------------------------------

/// One sub-element that should light up at control value `index`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TargetBinding {
    pub index: u32,
    pub target: String,
}

// ---------------------------------------------------------------------------
// MappingDiagnostic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingDiagnostic {
    /// Enabled entry with no target assigned.
    NoTarget { symbol: String },
    /// Assigned target is not among the container's elements.
    MissingTarget { symbol: String, target: String },
}

impl std::fmt::Display for MappingDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingDiagnostic::NoTarget { symbol } => write!(f, "'{symbol}' has no target assigned"),
            MappingDiagnostic::MissingTarget { symbol, target } => {
                write!(f, "'{symbol}' targets '{target}', which does not exist")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MappingTable
// ---------------------------------------------------------------------------

/// Entries keyed by symbol.  Symbol lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTable {
    entries: BTreeMap<String, MappingEntry>,
}

fn key(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for its symbol.  Returns the replaced entry.
    pub fn insert(&mut self, entry: MappingEntry) -> Option<MappingEntry> {
        self.entries.insert(key(&entry.symbol), entry)
    }

    pub fn get(&self, symbol: &str) -> Option<&MappingEntry> {
        self.entries.get(&key(symbol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by index, then symbol.
    pub fn entries(&self) -> Vec<&MappingEntry> {
        let mut out: Vec<_> = self.entries.values().collect();
        out.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.symbol.cmp(&b.symbol)));
        out
    }

    /// Index for `symbol` when an enabled entry exists.
    pub fn resolve(&self, symbol: &str) -> Option<u32> {
        self.get(symbol).filter(|e| e.enabled).map(|e| e.index)
    }

    pub fn set_target(&mut self, symbol: &str, target: Option<String>) -> Result<()> {
        self.entry_mut(symbol)?.target_name = target;
        Ok(())
    }

    pub fn set_enabled(&mut self, symbol: &str, enabled: bool) -> Result<()> {
        self.entry_mut(symbol)?.enabled = enabled;
        Ok(())
    }

    fn entry_mut(&mut self, symbol: &str) -> Result<&mut MappingEntry> {
        self.entries
            .get_mut(&key(symbol))
            .ok_or_else(|| LipSyncError::Mapping(format!("no mapping for symbol '{symbol}'")))
    }

    /// Enabled entries with a target, sorted by `(index, target)` and
    /// de-duplicated.
    pub fn bindings(&self) -> Vec<TargetBinding> {
        let mut out: Vec<TargetBinding> = self
            .entries
            .values()
            .filter(|e| e.enabled)
            .filter_map(|e| {
                e.target_name.as_ref().map(|t| TargetBinding {
                    index: e.index,
                    target: t.clone(),
                })
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Assign targets by element name: an exact (case-insensitive) match
    /// wins, otherwise the first element whose name contains the symbol.
    /// Entries without a match keep their current target.  Returns how many
    /// entries were assigned.
    pub fn auto_match_by_name(&mut self, elements: &[String]) -> usize {
        let lowered: Vec<String> = elements.iter().map(|e| e.to_lowercase()).collect();
        let mut matched = 0;

        for entry in self.entries.values_mut() {
            let needle = entry.symbol.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            let hit = lowered
                .iter()
                .position(|name| *name == needle)
                .or_else(|| lowered.iter().position(|name| name.contains(&needle)));
            if let Some(i) = hit {
                entry.target_name = Some(elements[i].clone());
                matched += 1;
            }
        }

        log::info!(
            "mapping: auto-matched {matched} of {} symbols against {} elements",
            self.entries.len(),
            elements.len()
        );
        matched
    }

    /// Problems with the enabled entries' targets, in index order.
    pub fn validate_targets(&self, elements: &[String]) -> Vec<MappingDiagnostic> {
        self.entries()
            .into_iter()
            .filter(|e| e.enabled)
            .filter_map(|e| match &e.target_name {
                None => Some(MappingDiagnostic::NoTarget {
                    symbol: e.symbol.clone(),
                }),
                Some(t) if !elements.iter().any(|el| el == t) => {
                    Some(MappingDiagnostic::MissingTarget {
                        symbol: e.symbol.clone(),
                        target: t.clone(),
                    })
                }
                Some(_) => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        let mut t = MappingTable::new();
        t.insert(MappingEntry::new("X", 0));
        t.insert(MappingEntry::new("A", 1));
        t.insert(MappingEntry::new("B", 2));
        t
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_is_case_insensitive_and_respects_enabled() {
        let mut t = table();
        assert_eq!(t.resolve("a"), Some(1));
        t.set_enabled("A", false).expect("toggle");
        assert_eq!(t.resolve("A"), None);
        assert_eq!(t.resolve("Z"), None);
    }

    #[test]
    fn insert_replaces_same_symbol() {
        let mut t = table();
        let old = t.insert(MappingEntry::new("a", 7));
        assert_eq!(old.map(|e| e.index), Some(1));
        assert_eq!(t.len(), 3);
        assert_eq!(t.resolve("A"), Some(7));
    }

    #[test]
    fn editing_unknown_symbol_is_mapping_error() {
        let mut t = table();
        assert!(matches!(
            t.set_target("Q", Some("x".into())),
            Err(LipSyncError::Mapping(_))
        ));
    }

    #[test]
    fn bindings_skip_disabled_and_untargeted() {
        let mut t = table();
        t.set_target("X", Some("rest".into())).expect("target");
        t.set_target("A", Some("open".into())).expect("target");
        t.set_target("B", Some("closed".into())).expect("target");
        t.set_enabled("B", false).expect("toggle");
        t.insert(MappingEntry::new("C", 3));

        assert_eq!(
            t.bindings(),
            vec![
                TargetBinding { index: 0, target: "rest".into() },
                TargetBinding { index: 1, target: "open".into() },
            ]
        );
    }

    #[test]
    fn bindings_dedup_shared_targets() {
        let mut t = MappingTable::new();
        t.insert(MappingEntry::new("M", 5).with_target("mbp"));
        t.insert(MappingEntry::new("B", 5).with_target("mbp"));
        assert_eq!(t.bindings().len(), 1);
    }

    #[test]
    fn auto_match_prefers_exact_name() {
        let mut t = table();
        let elements = names(&["Mouth_A_wide", "a", "rest_X"]);
        assert_eq!(t.auto_match_by_name(&elements), 2);
        assert_eq!(t.get("A").and_then(|e| e.target_name.as_deref()), Some("a"));
        assert_eq!(t.get("X").and_then(|e| e.target_name.as_deref()), Some("rest_X"));
        assert_eq!(t.get("B").and_then(|e| e.target_name.clone()), None);
    }

    #[test]
    fn auto_match_keeps_existing_target_when_nothing_matches() {
        let mut t = table();
        t.set_target("B", Some("manual".into())).expect("target");
        t.auto_match_by_name(&names(&["zzz"]));
        assert_eq!(t.get("B").and_then(|e| e.target_name.as_deref()), Some("manual"));
    }

    #[test]
    fn validate_targets_reports_missing_and_unassigned() {
        let mut t = table();
        t.set_target("X", Some("rest".into())).expect("target");
        t.set_target("A", Some("gone".into())).expect("target");
        t.set_enabled("B", false).expect("toggle");

        let diags = t.validate_targets(&names(&["rest"]));
        assert_eq!(
            diags,
            vec![MappingDiagnostic::MissingTarget {
                symbol: "A".into(),
                target: "gone".into()
            }]
        );

        t.set_enabled("B", true).expect("toggle");
        let diags = t.validate_targets(&names(&["rest"]));
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[1].to_string(), "'B' has no target assigned");
    }
}
