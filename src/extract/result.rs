//! Parse the tool's JSON result into a [`Timeline`].
//!
//! Cue `i` ends where cue `i + 1` starts; the last cue lasts
//! [`LAST_CUE_SECS`].  The tool's own `end` fields are ignored.

use serde::Deserialize;

use super::error::ExtractionError;
use crate::timeline::{PhonemeCue, SymbolSet, Timeline};

/// Duration given to the final cue.
pub const LAST_CUE_SECS: f64 = 0.1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolOutput {
    mouth_cues: Option<Vec<RawCue>>,
}

#[derive(Debug, Deserialize)]
struct RawCue {
    start: f64,
    value: String,
}

pub fn parse_tool_output(stdout: &str) -> Result<Timeline, ExtractionError> {
    let body = stdout.trim();
    if body.is_empty() {
        return Err(ExtractionError::MalformedResult("empty output".into()));
    }
    if !body.starts_with('{') {
        let preview: String = body.chars().take(200).collect();
        return Err(ExtractionError::MalformedResult(format!(
            "expected JSON, got: {preview}"
        )));
    }

    let output: ToolOutput = serde_json::from_str(body)
        .map_err(|e| ExtractionError::MalformedResult(e.to_string()))?;
    let raw = output
        .mouth_cues
        .ok_or_else(|| ExtractionError::MalformedResult("no mouthCues found".into()))?;
    if raw.is_empty() {
        return Err(ExtractionError::NoPhonemes);
    }

    let mut cues = Vec::with_capacity(raw.len());
    for (i, cue) in raw.iter().enumerate() {
        if !cue.start.is_finite() || cue.start < 0.0 {
            return Err(ExtractionError::MalformedResult(format!(
                "cue {i} has invalid start {}",
                cue.start
            )));
        }
        let end = match raw.get(i + 1) {
            Some(next) if next.start < cue.start => {
                return Err(ExtractionError::MalformedResult(format!(
                    "cue {} starts at {} before cue {i} at {}",
                    i + 1,
                    next.start,
                    cue.start
                )));
            }
            Some(next) => next.start,
            None => cue.start + LAST_CUE_SECS,
        };
        if end <= cue.start {
            log::warn!("extract: skipping zero-length cue {i} ('{}') at {}", cue.value, cue.start);
            continue;
        }
        cues.push(PhonemeCue::new(cue.value.clone(), cue.start, end));
    }

    Ok(Timeline::new(cues, SymbolSet::Proprietary9))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
