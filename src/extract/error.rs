use std::path::PathBuf;

use thiserror::Error;

/// Why an extraction could not start, or why it ended without a timeline.
///
/// Validation variants are returned from [`JobManager::start`]; the rest
/// reach the caller as the message of [`JobState::Failed`].
///
/// [`JobManager::start`]: super::JobManager::start
/// [`JobState::Failed`]: super::JobState::Failed
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(
        "Rhubarb Lip Sync is not configured. Download it from \
         https://github.com/DanielSWolf/rhubarb-lip-sync/releases and set the \
         executable path in preferences (tool.path) or pass --tool"
    )]
    ToolNotConfigured,

    #[error("Rhubarb executable not found at {0}. Check the tool path in preferences")]
    ToolNotFound(PathBuf),

    #[error("audio converter '{0}' is not installed or not on PATH; install it or convert the audio to WAV first")]
    ConverterMissing(String),

    #[error("audio conversion failed: {0}")]
    ConversionFailed(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit.  `code` is `None` when the process died from a signal.
    #[error("Rhubarb failed with {}: {diagnostics}", exit_label(.code))]
    ToolFailed {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("failed to parse Rhubarb output: {0}")]
    MalformedResult(String),

    #[error("no phonemes extracted from audio")]
    NoPhonemes,
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_names_remediation() {
        let msg = ExtractionError::ToolNotConfigured.to_string();
        assert!(msg.contains("Download"));
        assert!(msg.contains("preferences"));
    }

    #[test]
    fn tool_failed_message_includes_code_and_diagnostics() {
        let err = ExtractionError::ToolFailed {
            code: Some(2),
            diagnostics: "bad input".into(),
        };
        assert_eq!(err.to_string(), "Rhubarb failed with code 2: bad input");

        let killed = ExtractionError::ToolFailed {
            code: None,
            diagnostics: String::new(),
        };
        assert!(killed.to_string().contains("a signal"));
    }
}
