//! Locating and checking the extraction tool executable.
//!
//! Priority: an explicit path (CLI flag / per-document setting), then the
//! configured path, then a recursive search of the tools directory.  The
//! first of the two paths that is set wins even if it turns out to be
//! missing, so a typo is reported instead of silently using another copy.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::error::ExtractionError;

/// Executable names searched for in the tools directory.
pub const TOOL_FILE_NAMES: &[&str] = &["rhubarb", "rhubarb.exe"];

const SEARCH_DEPTH: usize = 4;
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// `ToolNotConfigured` for an empty path, `ToolNotFound` when it is not a
/// regular file.
pub fn validate_tool(path: &Path) -> Result<(), ExtractionError> {
    if path.as_os_str().is_empty() {
        return Err(ExtractionError::ToolNotConfigured);
    }
    if !path.is_file() {
        return Err(ExtractionError::ToolNotFound(path.to_path_buf()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    configured: Option<PathBuf>,
    tools_dir: Option<PathBuf>,
}

impl ToolLocator {
    pub fn new(configured: Option<PathBuf>, tools_dir: Option<PathBuf>) -> Self {
        Self {
            configured: configured.filter(|p| !p.as_os_str().is_empty()),
            tools_dir,
        }
    }

    pub fn locate(&self, explicit: Option<&Path>) -> Result<PathBuf, ExtractionError> {
        let chosen = explicit
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| self.configured.clone());
        if let Some(path) = chosen {
            validate_tool(&path)?;
            return Ok(path);
        }

        let dir = self.tools_dir.as_ref().ok_or(ExtractionError::ToolNotConfigured)?;
        let found = find_in_dir(dir, SEARCH_DEPTH).ok_or(ExtractionError::ToolNotConfigured)?;
        log::info!("extract: using tool found at {}", found.display());
        #[cfg(unix)]
        if let Err(e) = ensure_executable(&found) {
            log::warn!("extract: cannot mark {} executable: {e}", found.display());
        }
        Ok(found)
    }
}

/// Depth-limited search for one of [`TOOL_FILE_NAMES`].  Entries are
/// visited in name order so the result is stable.
pub fn find_in_dir(dir: &Path, max_depth: usize) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in &entries {
        let is_tool = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| TOOL_FILE_NAMES.contains(&n));
        if is_tool && path.is_file() {
            return Some(path.clone());
        }
    }
    if max_depth == 0 {
        return None;
    }
    entries
        .iter()
        .filter(|p| p.is_dir())
        .find_map(|p| find_in_dir(p, max_depth - 1))
}

/// Add execute bits for the owner, group and others when none are set.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    if perms.mode() & 0o111 == 0 {
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// Run `tool --version` and return its first output line.
pub async fn verify_tool(path: &Path) -> Result<String, ExtractionError> {
    validate_tool(path)?;
    let run = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(VERSION_TIMEOUT, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ExtractionError::Spawn {
                program: path.display().to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(ExtractionError::ToolFailed {
                code: None,
                diagnostics: format!("no answer to --version within {}s", VERSION_TIMEOUT.as_secs()),
            })
        }
    };

    if !output.status.success() {
        return Err(ExtractionError::ToolFailed {
            code: output.status.code(),
            diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_path_is_not_configured() {
        assert!(matches!(
            validate_tool(Path::new("")),
            Err(ExtractionError::ToolNotConfigured)
        ));
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = validate_tool(Path::new("/nowhere/rhubarb")).unwrap_err();
        assert!(matches!(err, ExtractionError::ToolNotFound(_)));
        assert!(err.to_string().contains("/nowhere/rhubarb"));
    }

    #[test]
    fn explicit_path_beats_configured() {
        let dir = tempdir().expect("temp dir");
        let a = dir.path().join("a-rhubarb");
        let b = dir.path().join("b-rhubarb");
        std::fs::write(&a, b"").expect("write");
        std::fs::write(&b, b"").expect("write");

        let locator = ToolLocator::new(Some(b.clone()), None);
        assert_eq!(locator.locate(Some(&a)).expect("locate"), a);
        assert_eq!(locator.locate(None).expect("locate"), b);
    }

    #[test]
    fn configured_but_missing_is_reported() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("rhubarb"), b"").expect("write");
        let locator = ToolLocator::new(
            Some(dir.path().join("typo")),
            Some(dir.path().to_path_buf()),
        );
        assert!(matches!(locator.locate(None), Err(ExtractionError::ToolNotFound(_))));
    }

    #[test]
    fn tools_dir_is_searched_recursively() {
        let dir = tempdir().expect("temp dir");
        let nested = dir.path().join("Rhubarb-Lip-Sync-1.13.0-Linux");
        std::fs::create_dir_all(&nested).expect("mkdir");
        let exe = nested.join("rhubarb");
        std::fs::write(&exe, b"#!/bin/sh\n").expect("write");

        let locator = ToolLocator::new(None, Some(dir.path().to_path_buf()));
        assert_eq!(locator.locate(None).expect("locate"), exe);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&exe).expect("meta").permissions().mode();
            assert_ne!(mode & 0o111, 0);
        }
    }

    #[test]
    fn nothing_configured_and_nothing_found() {
        let dir = tempdir().expect("temp dir");
        let locator = ToolLocator::new(None, Some(dir.path().to_path_buf()));
        assert!(matches!(locator.locate(None), Err(ExtractionError::ToolNotConfigured)));
        assert!(matches!(
            ToolLocator::default().locate(None),
            Err(ExtractionError::ToolNotConfigured)
        ));
    }
}
