//! ARPAbet → viseme class reduction.
//!
//! | Class | Index | ARPAbet phonemes                      |
//! |-------|-------|---------------------------------------|
//! | REST  | 0     | REST SIL SP (and anything unknown)    |
//! | AH    | 1     | AA AE AH AW AY K G HH NG               |
//! | EE    | 2     | IH IY EH EY Y                          |
//! | OH    | 3     | AO OW OY ER R                          |
//! | OO    | 4     | UH UW W                                |
//! | M     | 5     | M B P                                  |
//! | F     | 6     | F V                                    |
//! | L     | 7     | L D T N DH TH                          |
//! | S     | 8     | S Z SH ZH CH JH                        |

use crate::timeline::{PhonemeCue, SymbolSet, Timeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Viseme {
    Rest,
    Ah,
    Ee,
    Oh,
    Oo,
    M,
    F,
    L,
    S,
}

impl Viseme {
    pub const ALL: [Viseme; 9] = [
        Viseme::Rest,
        Viseme::Ah,
        Viseme::Ee,
        Viseme::Oh,
        Viseme::Oo,
        Viseme::M,
        Viseme::F,
        Viseme::L,
        Viseme::S,
    ];

    /// Total lookup.  Case-insensitive; trailing stress digits (`AH0`,
    /// `IY1`) are ignored; unknown symbols map to [`Viseme::Rest`].
    pub fn from_phoneme(symbol: &str) -> Self {
        let base = symbol
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .to_ascii_uppercase();
        match base.as_str() {
            "AA" | "AE" | "AH" | "AW" | "AY" | "K" | "G" | "HH" | "NG" => Viseme::Ah,
            "IH" | "IY" | "EH" | "EY" | "Y" => Viseme::Ee,
            "AO" | "OW" | "OY" | "ER" | "R" => Viseme::Oh,
            "UH" | "UW" | "W" => Viseme::Oo,
            "M" | "B" | "P" => Viseme::M,
            "F" | "V" => Viseme::F,
            "L" | "D" | "T" | "N" | "DH" | "TH" => Viseme::L,
            "S" | "Z" | "SH" | "ZH" | "CH" | "JH" => Viseme::S,
            _ => Viseme::Rest,
        }
    }

    pub fn index(&self) -> u32 {
        *self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            Viseme::Rest => "REST",
            Viseme::Ah => "AH",
            Viseme::Ee => "EE",
            Viseme::Oh => "OH",
            Viseme::Oo => "OO",
            Viseme::M => "M",
            Viseme::F => "F",
            Viseme::L => "L",
            Viseme::S => "S",
        }
    }
}

/// Replace every cue symbol by its viseme class name.
pub fn reduce_to_visemes(cues: &[PhonemeCue]) -> Vec<PhonemeCue> {
    cues.iter()
        .map(|c| PhonemeCue {
            symbol: Viseme::from_phoneme(&c.symbol).name().to_string(),
            ..c.clone()
        })
        .collect()
}

/// Reduce an ARPAbet timeline.  Other symbol sets are returned unchanged;
/// the reduced timeline keeps `symbol_set = Arpabet` since its symbols are
/// the class names the ARPAbet preset is keyed by.
pub fn reduce_timeline(timeline: &Timeline) -> Timeline {
    if timeline.symbol_set != SymbolSet::Arpabet {
        return timeline.clone();
    }
    Timeline {
        cues: reduce_to_visemes(&timeline.cues),
        ..timeline.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows() {
        let rows: &[(&[&str], Viseme)] = &[
            (&["REST", "SIL", "SP"], Viseme::Rest),
            (&["AA", "AE", "AH", "AW", "AY", "K", "G", "HH", "NG"], Viseme::Ah),
            (&["IH", "IY", "EH", "EY", "Y"], Viseme::Ee),
            (&["AO", "OW", "OY", "ER", "R"], Viseme::Oh),
            (&["UH", "UW", "W"], Viseme::Oo),
            (&["M", "B", "P"], Viseme::M),
            (&["F", "V"], Viseme::F),
            (&["L", "D", "T", "N", "DH", "TH"], Viseme::L),
            (&["S", "Z", "SH", "ZH", "CH", "JH"], Viseme::S),
        ];
        for (phonemes, expected) in rows {
            for p in *phonemes {
                assert_eq!(Viseme::from_phoneme(p), *expected, "{p}");
            }
        }
    }

    #[test]
    fn indices_follow_declaration_order() {
        let indices: Vec<u32> = Viseme::ALL.iter().map(Viseme::index).collect();
        assert_eq!(indices, (0..9u32).collect::<Vec<_>>());
    }

    #[test]
    fn lookup_is_case_insensitive_and_ignores_stress() {
        assert_eq!(Viseme::from_phoneme("ah0"), Viseme::Ah);
        assert_eq!(Viseme::from_phoneme("IY1"), Viseme::Ee);
        assert_eq!(Viseme::from_phoneme(" sh "), Viseme::S);
    }

    #[test]
    fn unknown_maps_to_rest() {
        assert_eq!(Viseme::from_phoneme("QQ"), Viseme::Rest);
        assert_eq!(Viseme::from_phoneme(""), Viseme::Rest);
    }

    #[test]
    fn reduce_timeline_only_touches_arpabet() {
        let cues = vec![PhonemeCue::new("B", 0.0, 0.1), PhonemeCue::new("IY1", 0.1, 0.2)];

        let arpabet = reduce_timeline(&Timeline::new(cues.clone(), SymbolSet::Arpabet));
        let symbols: Vec<_> = arpabet.cues.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["M", "EE"]);
        assert!((arpabet.cues[1].start - 0.1).abs() < 1e-12);

        let rhubarb = reduce_timeline(&Timeline::new(cues.clone(), SymbolSet::Proprietary9));
        assert_eq!(rhubarb.cues, cues);
    }
}
