//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + user presets):
//!   Windows: %APPDATA%\lipsync\
//!   macOS:   ~/Library/Application Support/lipsync/
//!   Linux:   ~/.config/lipsync/
//!
//! Data dir (cache records, bundled tool):
//!   Windows: %LOCALAPPDATA%\lipsync\
//!   macOS:   ~/Library/Application Support/lipsync/
//!   Linux:   ~/.local/share/lipsync/

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `presets/`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// User mapping presets, one JSON file each.
    pub presets_dir: PathBuf,
    /// One JSON record per analysed audio content hash.
    pub cache_dir: PathBuf,
    /// Searched recursively for the Rhubarb executable.
    pub tools_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "lipsync";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self::from_dirs(config_dir, &data_dir)
    }

    /// Everything below a single root, e.g. a temp dir in tests.
    pub fn under(root: &Path) -> Self {
        Self::from_dirs(root.join("config"), &root.join("data"))
    }

    fn from_dirs(config_dir: PathBuf, data_dir: &Path) -> Self {
        Self {
            settings_file: config_dir.join("settings.toml"),
            presets_dir: config_dir.join("presets"),
            cache_dir: data_dir.join("cache"),
            tools_dir: data_dir.join("tools"),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.cache_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths.presets_dir.ends_with("lipsync/presets"));
        assert!(paths.tools_dir.ends_with("lipsync/tools"));
    }

    #[test]
    fn under_keeps_everything_below_root() {
        let root = Path::new("/tmp/lipsync-test");
        let paths = AppPaths::under(root);
        for p in [
            &paths.config_dir,
            &paths.settings_file,
            &paths.presets_dir,
            &paths.cache_dir,
            &paths.tools_dir,
        ] {
            assert!(p.starts_with(root), "{}", p.display());
        }
    }
}
