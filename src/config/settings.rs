//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Missing keys fall back
//! to their defaults, so a settings file only needs the values it changes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::animation::{CompileOptions, EasingOptions};
use crate::host::Interpolation;

// ---------------------------------------------------------------------------
// ToolConfig
// ---------------------------------------------------------------------------

/// The Rhubarb executable and how long it may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable path.  `None` searches the tools directory.
    pub path: Option<PathBuf>,
    /// `pocketSphinx` (English) or `phonetic` (language independent).
    pub recognizer: String,
    /// Limit for the tool process.
    pub timeout_secs: u64,
    /// Limit for conversion plus the tool.
    pub outer_timeout_secs: u64,
    /// How often a control loop should poll a running job.
    pub poll_interval_ms: u64,
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn outer_timeout(&self) -> Duration {
        Duration::from_secs(self.outer_timeout_secs.max(self.timeout_secs))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            path: None,
            recognizer: "pocketSphinx".into(),
            timeout_secs: 600,
            outer_timeout_secs: 900,
            poll_interval_ms: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// ConverterConfig
// ---------------------------------------------------------------------------

/// External converter for formats the tool cannot read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    pub timeout_secs: u64,
    /// Extensions passed to the tool unconverted.
    pub native_extensions: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".into(),
            sample_rate: 16_000,
            timeout_secs: 60,
            native_extensions: vec!["wav".into(), "ogg".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub fps: f64,
    /// Frame that audio time zero lands on.
    pub start_frame: i64,
    /// Keys closer than this to the previous key are dropped.  Also
    /// converted to seconds for the preprocessor's minimum hold.
    pub min_hold_frames: u32,
    /// Cues starting closer than this (seconds) to the previous one merge.
    pub merge_threshold: f64,
    pub interpolation: Interpolation,
    /// Write keys into a named clip instead of directly on the controller.
    pub use_clip: bool,
    pub clip_name: String,
    pub easing: Option<EasingOptions>,
    /// `0` for hard switching, otherwise the width of the driver falloff.
    pub blend_range: f64,
}

impl AnimationConfig {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            fps: self.fps,
            start_frame: self.start_frame,
            min_hold_frames: self.min_hold_frames,
            easing: self.easing,
        }
    }

    /// `min_hold_frames` expressed in seconds; `0` when fps is unusable.
    pub fn min_hold_seconds(&self) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            f64::from(self.min_hold_frames) / self.fps
        } else {
            0.0
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 24.0,
            start_frame: 1,
            min_hold_frames: 2,
            merge_threshold: 0.04,
            interpolation: Interpolation::Constant,
            use_clip: true,
            clip_name: "LipSync".into(),
            easing: None,
            blend_range: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// MappingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Preset loaded when a session starts.
    pub preset: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            preset: "rhubarb".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Record directory.  `None` uses the platform data directory.
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn resolve_dir(&self, paths: &AppPaths) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| paths.cache_dir.clone())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use lipsync::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tool: ToolConfig,
    pub converter: ConverterConfig,
    pub animation: AnimationConfig,
    pub mapping: MappingConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::EasingCurve;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.tool.path, loaded.tool.path);
        assert_eq!(original.tool.recognizer, loaded.tool.recognizer);
        assert_eq!(original.tool.timeout_secs, loaded.tool.timeout_secs);
        assert_eq!(original.converter.program, loaded.converter.program);
        assert_eq!(
            original.converter.native_extensions,
            loaded.converter.native_extensions
        );
        assert_eq!(original.animation.fps, loaded.animation.fps);
        assert_eq!(original.animation.interpolation, loaded.animation.interpolation);
        assert_eq!(original.animation.easing, loaded.animation.easing);
        assert_eq!(original.mapping.preset, loaded.mapping.preset);
        assert_eq!(original.cache.enabled, loaded.cache.enabled);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.tool.timeout_secs, AppConfig::default().tool.timeout_secs);
        assert_eq!(config.mapping.preset, "rhubarb");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.tool.path.is_none());
        assert_eq!(cfg.tool.recognizer, "pocketSphinx");
        assert_eq!(cfg.tool.timeout(), Duration::from_secs(600));
        assert_eq!(cfg.tool.outer_timeout(), Duration::from_secs(900));
        assert_eq!(cfg.tool.poll_interval(), Duration::from_millis(200));
        assert_eq!(cfg.converter.sample_rate, 16_000);
        assert_eq!(cfg.animation.fps, 24.0);
        assert_eq!(cfg.animation.start_frame, 1);
        assert_eq!(cfg.animation.min_hold_frames, 2);
        assert_eq!(cfg.animation.merge_threshold, 0.04);
        assert_eq!(cfg.animation.interpolation, Interpolation::Constant);
        assert!(cfg.animation.use_clip);
        assert_eq!(cfg.animation.clip_name, "LipSync");
        assert!(cfg.animation.easing.is_none());
        assert!(cfg.cache.enabled);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[animation]\nfps = 30.0\n\n[tool]\npath = \"/opt/rhubarb\"\n")
            .expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.animation.fps, 30.0);
        assert_eq!(cfg.animation.start_frame, 1);
        assert_eq!(cfg.tool.path, Some(PathBuf::from("/opt/rhubarb")));
        assert_eq!(cfg.tool.timeout_secs, 600);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.tool.path = Some(PathBuf::from("/usr/local/bin/rhubarb"));
        cfg.tool.recognizer = "phonetic".into();
        cfg.animation.interpolation = Interpolation::Bezier;
        cfg.animation.easing = Some(EasingOptions {
            curve: EasingCurve::EaseOut,
            duration_frames: 4,
        });
        cfg.animation.use_clip = false;
        cfg.cache.dir = Some(PathBuf::from("/var/cache/lipsync"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.tool.path, cfg.tool.path);
        assert_eq!(loaded.tool.recognizer, "phonetic");
        assert_eq!(loaded.animation.interpolation, Interpolation::Bezier);
        assert_eq!(loaded.animation.easing, cfg.animation.easing);
        assert!(!loaded.animation.use_clip);
        assert_eq!(loaded.cache.dir, cfg.cache.dir);
    }

    #[test]
    fn min_hold_seconds_follow_fps() {
        let mut anim = AnimationConfig::default();
        assert!((anim.min_hold_seconds() - 2.0 / 24.0).abs() < 1e-12);
        anim.fps = 0.0;
        assert_eq!(anim.min_hold_seconds(), 0.0);
    }

    #[test]
    fn cache_dir_falls_back_to_paths() {
        let paths = AppPaths::under(std::path::Path::new("/tmp/x"));
        let mut cache = CacheConfig::default();
        assert_eq!(cache.resolve_dir(&paths), paths.cache_dir);
        cache.dir = Some(PathBuf::from("/elsewhere"));
        assert_eq!(cache.resolve_dir(&paths), PathBuf::from("/elsewhere"));
    }
}
