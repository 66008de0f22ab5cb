//! Content-addressed phoneme cache.
//!
//! Timelines are stored under the SHA-256 of the audio file's bytes, so the
//! same recording hits the cache wherever it lives on disk and an edited
//! recording misses even at the same path.
//!
//! ```text
//! CacheStore ──key "lipsync_phoneme.<sha256>"──▶ RecordStore (trait)
//!                                                  ├─ DirectoryStore (one JSON file per record)
//!                                                  └─ MemoryStore
//! ```

pub mod record;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use record::{DirectoryStore, MemoryStore, RecordStore, StoreError};
pub use store::{content_hash, CacheEntry, CacheStore, CacheSummary, DeleteOutcome, NAMESPACE};
