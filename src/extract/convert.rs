//! Audio preparation before extraction.
//!
//! The tool decodes WAV and Ogg itself.  Anything else is converted to
//! 16-bit PCM WAV in a temporary file that lives exactly as long
//! as the returned [`PreparedAudio`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::process::Command;

use super::error::ExtractionError;

// ---------------------------------------------------------------------------
// PreparedAudio
// ---------------------------------------------------------------------------

/// Path handed to the tool.  A converted copy is deleted on drop.
#[derive(Debug)]
pub struct PreparedAudio {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl PreparedAudio {
    /// The source file itself, no cleanup.
    pub fn original(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp: None,
        }
    }

    pub fn converted(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_converted(&self) -> bool {
        self.temp.is_some()
    }
}

// ---------------------------------------------------------------------------
// AudioConverter
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Return a file the tool can read, converting if needed.
    async fn prepare(&self, audio: &Path) -> Result<PreparedAudio, ExtractionError>;
}

/// Formats passed through untouched.
#[derive(Debug, Clone)]
pub struct PassThrough;

#[async_trait]
impl AudioConverter for PassThrough {
    async fn prepare(&self, audio: &Path) -> Result<PreparedAudio, ExtractionError> {
        Ok(PreparedAudio::original(audio))
    }
}

// ---------------------------------------------------------------------------
// FfmpegConverter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    program: String,
    sample_rate: u32,
    timeout: Duration,
    native_extensions: Vec<String>,
}

impl FfmpegConverter {
    pub fn new(
        program: impl Into<String>,
        sample_rate: u32,
        timeout: Duration,
        native_extensions: Vec<String>,
    ) -> Self {
        Self {
            program: program.into(),
            sample_rate,
            timeout,
            native_extensions: native_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// `true` when the tool reads this file without conversion.
    pub fn is_native(&self, audio: &Path) -> bool {
        audio
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.native_extensions.contains(&e))
    }

    pub fn conversion_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".into(),
            input.display().to_string(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            self.sample_rate.to_string(),
            "-y".into(),
            output.display().to_string(),
        ]
    }

    async fn ensure_available(&self) -> Result<(), ExtractionError> {
        let version_check = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match tokio::time::timeout(Duration::from_secs(5), version_check).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            _ => Err(ExtractionError::ConverterMissing(self.program.clone())),
        }
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new(
            "ffmpeg",
            16_000,
            Duration::from_secs(60),
            vec!["wav".into(), "ogg".into()],
        )
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn prepare(&self, audio: &Path) -> Result<PreparedAudio, ExtractionError> {
        if self.is_native(audio) {
            return Ok(PreparedAudio::original(audio));
        }
        self.ensure_available().await?;

        let temp = tempfile::Builder::new()
            .prefix("lipsync-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| ExtractionError::ConversionFailed(format!("temp file: {e}")))?
            .into_temp_path();

        log::info!(
            "extract: converting {} to WAV at {} Hz",
            audio.display(),
            self.sample_rate
        );
        let run = Command::new(&self.program)
            .args(self.conversion_args(audio, &temp))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ExtractionError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ExtractionError::ConversionFailed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(ExtractionError::ConversionFailed(
                tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
            ));
        }
        Ok(PreparedAudio::converted(temp))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_extensions_are_case_insensitive() {
        let conv = FfmpegConverter::default();
        assert!(conv.is_native(Path::new("a.wav")));
        assert!(conv.is_native(Path::new("a.OGG")));
        assert!(!conv.is_native(Path::new("a.mp3")));
        assert!(!conv.is_native(Path::new("noext")));
    }

    #[test]
    fn leading_dots_in_configured_extensions_are_ignored() {
        let conv = FfmpegConverter::new("ffmpeg", 16_000, Duration::from_secs(1), vec![".FLAC".into()]);
        assert!(conv.is_native(Path::new("x.flac")));
    }

    #[test]
    fn conversion_args_request_pcm_at_sample_rate() {
        let conv = FfmpegConverter::default();
        let args = conv.conversion_args(Path::new("in.mp3"), Path::new("out.wav"));
        assert_eq!(
            args,
            vec!["-i", "in.mp3", "-acodec", "pcm_s16le", "-ar", "16000", "-y", "out.wav"]
        );
    }

    #[tokio::test]
    async fn native_input_is_passed_through() {
        let conv = FfmpegConverter::default();
        let prepared = conv.prepare(Path::new("/tmp/voice.wav")).await.expect("prepare");
        assert_eq!(prepared.path(), Path::new("/tmp/voice.wav"));
        assert!(!prepared.is_converted());
    }

    #[tokio::test]
    async fn missing_converter_is_reported() {
        let conv = FfmpegConverter::new(
            "lipsync-no-such-converter",
            16_000,
            Duration::from_secs(1),
            vec!["wav".into()],
        );
        let err = conv.prepare(Path::new("voice.mp3")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::ConverterMissing(_)));
    }

    #[test]
    fn converted_audio_is_removed_on_drop() {
        let temp = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .expect("temp")
            .into_temp_path();
        let prepared = PreparedAudio::converted(temp);
        let path = prepared.path().to_path_buf();
        assert!(path.exists());
        drop(prepared);
        assert!(!path.exists());
    }
}
