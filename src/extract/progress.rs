//! Machine-readable progress events on the tool's stderr.
//!
//! One JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"start","file":"a.wav","log":{"level":"Info","message":"..."}}
//! {"type":"progress","value":0.42,"log":{...}}          → round(0.42 × 100) = 42 %
//! {"type":"success","file":"a.wav","log":{...}}          → 100 %
//! {"type":"failure","reason":"...","log":{...}}          → logged, not terminal
//! {"type":"log","log":{"level":"Warn","message":"..."}}
//! ```
//!
//! Lines that are not JSON, and warnings, are kept as diagnostics for the
//! failure message.

use std::collections::VecDeque;

use serde::Deserialize;

use super::state::{update_progress, SharedProgress};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    Start {
        #[serde(default)]
        log: Option<LogRecord>,
    },
    Progress {
        value: f64,
        #[serde(default)]
        log: Option<LogRecord>,
    },
    Success {
        #[serde(default)]
        log: Option<LogRecord>,
    },
    Failure {
        #[serde(default)]
        reason: String,
    },
    Log {
        log: LogRecord,
    },
    #[serde(other)]
    Other,
}

impl ProgressEvent {
    /// `None` for lines that are not progress events.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

/// `round(value × 100)`, clamped to `0..=100`.
pub fn percent_of(value: f64) -> u8 {
    (value * 100.0).round().clamp(0.0, 100.0) as u8
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// The last few noteworthy stderr lines.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    lines: VecDeque<String>,
}

impl Diagnostics {
    const MAX_LINES: usize = 20;

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == Self::MAX_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

// ---------------------------------------------------------------------------
// Line handling
// ---------------------------------------------------------------------------

fn is_warning(level: &str) -> bool {
    matches!(
        level.to_ascii_lowercase().as_str(),
        "warn" | "warning" | "error" | "fatal"
    )
}

/// Apply one stderr line to the shared progress.
pub fn handle_line(line: &str, progress: &SharedProgress, diagnostics: &mut Diagnostics) {
    match ProgressEvent::parse(line) {
        Some(ProgressEvent::Start { .. }) => update_progress(progress, 0, "Analyzing audio"),
        Some(ProgressEvent::Progress { value, log }) => {
            let percent = percent_of(value);
            let message = log
                .map(|l| l.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Analyzing... {percent}%"));
            update_progress(progress, percent, message);
        }
        Some(ProgressEvent::Success { .. }) => update_progress(progress, 100, "Analysis complete"),
        Some(ProgressEvent::Failure { reason }) => {
            log::warn!("extract: tool reported failure: {reason}");
            diagnostics.push(reason);
        }
        Some(ProgressEvent::Log { log }) => {
            log::debug!("extract: [{}] {}", log.level, log.message);
            if is_warning(&log.level) {
                diagnostics.push(log.message);
            }
        }
        Some(ProgressEvent::Other) => {}
        None => {
            log::debug!("extract: stderr: {line}");
            diagnostics.push(line.trim());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
