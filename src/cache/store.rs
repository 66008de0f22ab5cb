//! [`CacheStore`]: timelines keyed by audio content hash.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::record::{DirectoryStore, MemoryStore, RecordStore};
use crate::error::{LipSyncError, Result};
use crate::timeline::Timeline;

/// Key prefix shared by every cache record.
pub const NAMESPACE: &str = "lipsync_phoneme";

/// Hex SHA-256 of the file's full content.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        LipSyncError::AudioFile(format!("cannot read {}: {e}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn record_key(hash: &str) -> String {
    format!("{NAMESPACE}.{hash}")
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Persisted form of one cached analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub source_filename: String,
    pub phoneme_data: Timeline,
}

/// One line of [`CacheStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSummary {
    pub content_hash: String,
    pub source_filename: String,
    pub cue_count: usize,
}

/// Result of [`CacheStore::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    /// Nothing was stored for this content.  Informational, not an error.
    NotFound,
}

impl DeleteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DeleteOutcome::Removed => "Cached phoneme data deleted",
            DeleteOutcome::NotFound => "No data to delete",
        }
    }
}

// ---------------------------------------------------------------------------
// CacheStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CacheStore {
    records: Arc<dyn RecordStore>,
}

impl CacheStore {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub fn in_directory(dir: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(DirectoryStore::new(dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Cached timeline for the audio's current content, if any.
    ///
    /// A record whose stored hash disagrees with its key, or that no longer
    /// parses, counts as a miss.
    pub fn load(&self, audio: &Path) -> Result<Option<Timeline>> {
        let hash = content_hash(audio)?;
        let Some(raw) = self.records.get(&record_key(&hash))? else {
            log::debug!("cache: miss for {}", audio.display());
            return Ok(None);
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("cache: unreadable record for {}: {e}", audio.display());
                return Ok(None);
            }
        };
        if entry.content_hash != hash {
            log::warn!(
                "cache: hash mismatch for {} (stored {}, current {hash})",
                audio.display(),
                entry.content_hash
            );
            return Ok(None);
        }

        log::info!(
            "cache: hit for {} ({} cues)",
            audio.display(),
            entry.phoneme_data.len()
        );
        Ok(Some(entry.phoneme_data))
    }

    /// Store `timeline` for the audio's current content.  Returns the hash.
    pub fn save(&self, audio: &Path, timeline: &Timeline) -> Result<String> {
        let hash = content_hash(audio)?;
        let entry = CacheEntry {
            content_hash: hash.clone(),
            source_filename: audio
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            phoneme_data: timeline.clone(),
        };
        self.records
            .put(&record_key(&hash), &serde_json::to_string(&entry)?)?;
        log::info!("cache: stored {} cues for {}", timeline.len(), audio.display());
        Ok(hash)
    }

    pub fn contains(&self, audio: &Path) -> Result<bool> {
        let hash = content_hash(audio)?;
        Ok(self.records.get(&record_key(&hash))?.is_some())
    }

    /// Idempotent: deleting twice yields [`DeleteOutcome::NotFound`] the
    /// second time.
    pub fn delete(&self, audio: &Path) -> Result<DeleteOutcome> {
        let hash = content_hash(audio)?;
        self.delete_hash(&hash)
    }

    pub fn delete_hash(&self, hash: &str) -> Result<DeleteOutcome> {
        let outcome = if self.records.remove(&record_key(hash))? {
            DeleteOutcome::Removed
        } else {
            DeleteOutcome::NotFound
        };
        log::info!("cache: delete {hash}: {}", outcome.message());
        Ok(outcome)
    }

    /// Every readable record, in key order.
    pub fn list(&self) -> Result<Vec<CacheSummary>> {
        let mut out = Vec::new();
        for key in self.records.keys(&format!("{NAMESPACE}."))? {
            let Some(raw) = self.records.get(&key)? else { continue };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) => out.push(CacheSummary {
                    content_hash: entry.content_hash,
                    source_filename: entry.source_filename,
                    cue_count: entry.phoneme_data.len(),
                }),
                Err(e) => log::warn!("cache: skipping unreadable record {key}: {e}"),
            }
        }
        Ok(out)
    }

    /// Remove every cache record.  Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.records.keys(&format!("{NAMESPACE}."))? {
            if self.records.remove(&key)? {
                removed += 1;
            }
        }
        log::info!("cache: cleared {removed} records");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
