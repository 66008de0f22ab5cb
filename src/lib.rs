//! `lipsync` turns the mouth cues of a voice recording into a discrete
//! animation timeline that drives many visual targets through one shared
//! control value.
//!
//! ```text
//! audio ──▶ extract::JobManager ──▶ Timeline ──▶ cache::CacheStore
//!                 (or cache hit) ─────┘
//!                                     ▼
//!                     preprocess::process (reduce, merge, hold)
//!                                     ▼
//!                     animation::compile ──▶ KeyframeSet ──▶ host::KeyframeSink
//!                                     ▼
//!                     driver::DriverBinder ──▶ host::DriverSink
//! ```
//!
//! [`pipeline::LipSyncSession`] wires the stages together; every stage is
//! also usable on its own.

pub mod animation;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod host;
pub mod mapping;
pub mod pipeline;
pub mod preprocess;
pub mod timeline;

pub use error::{LipSyncError, Result};
