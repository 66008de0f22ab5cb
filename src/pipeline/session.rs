//! Session orchestrator: analyse → cache → preprocess → compile → write → bind.
//!
//! [`LipSyncSession`] owns the current timeline, the mapping table and the
//! analysis slot, and mirrors what a host UI needs into [`SharedState`].
//!
//! ```text
//! analyze(source)
//!   ├─ cache hit  → timeline replaced                       [Ready]
//!   └─ cache miss → JobManager::start                       [Analyzing]
//!                     └─ poll_analysis / wait_analysis
//!                          ├─ Succeeded → cache save, timeline replaced  [Ready]
//!                          └─ other terminal state                      [Error]
//!
//! generate(host, controller, target)
//!   reduce_timeline → process(merge, min hold) → compile
//!     → write_keyframes(controller) → DriverBinder::bind_on(target)     [Generated]
//! ```
//!
//! The session itself is synchronous.  Jobs run on the tokio runtime whose
//! handle is passed to [`LipSyncSession::new`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;

use super::state::{new_shared_state, SessionPhase, SessionState, SharedState};
use crate::animation::{compile, write_keyframes, OutputForm, WriteOptions};
use crate::cache::CacheStore;
use crate::config::{AppConfig, AppPaths};
use crate::driver::{BindReport, DriverBinder};
use crate::error::{LipSyncError, Result};
use crate::extract::{
    AudioConverter, FfmpegConverter, JobId, JobManager, JobRequest, JobState, ToolLocator,
};
use crate::host::{DriverSink, KeyframeSink, TargetGraph};
use crate::mapping::{MappingDiagnostic, MappingTable, Preset, PresetLibrary};
use crate::preprocess::{process, reduce_timeline};
use crate::timeline::{
    resolve_source, validate_audio, AudioClipRegistry, AudioSource, SymbolSet, Timeline,
};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How an [`LipSyncSession::analyze`] call proceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStart {
    /// The cache had this audio; the timeline is already loaded.
    Cached,
    Started(JobId),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateReport {
    pub keyframe_count: usize,
    /// Scene frames, independent of the output form.
    pub first_frame: Option<i64>,
    pub last_frame: Option<i64>,
    pub cue_count: usize,
    pub unmapped_count: usize,
    pub unique_indices: usize,
    /// `None` when no target was given.
    pub binding: Option<BindReport>,
}

/// Registry for plain file sources.
struct NoClips;

impl AudioClipRegistry for NoClips {
    fn clip_path(&self, _id: &str) -> Option<PathBuf> {
        None
    }
}

// ---------------------------------------------------------------------------
// LipSyncSession
// ---------------------------------------------------------------------------

pub struct LipSyncSession {
    config: AppConfig,
    cache: Option<CacheStore>,
    presets: PresetLibrary,
    table: MappingTable,
    /// Symbol set of the preset the table came from.
    phoneme_set: SymbolSet,
    timeline: Option<Timeline>,
    jobs: JobManager,
    locator: ToolLocator,
    active: Option<JobId>,
    state: SharedState,
}

impl LipSyncSession {
    /// Build a session from settings.  Loads the configured preset; fails
    /// when it does not exist.
    pub fn new(config: AppConfig, paths: &AppPaths, runtime: Handle) -> Result<Self> {
        let converter: Arc<dyn AudioConverter> = Arc::new(FfmpegConverter::new(
            config.converter.program.clone(),
            config.converter.sample_rate,
            Duration::from_secs(config.converter.timeout_secs),
            config.converter.native_extensions.clone(),
        ));
        let cache = config
            .cache
            .enabled
            .then(|| CacheStore::in_directory(config.cache.resolve_dir(paths)));
        let presets = PresetLibrary::new(paths.presets_dir.clone());
        let preset = presets.load(&config.mapping.preset)?;
        let locator = ToolLocator::new(config.tool.path.clone(), Some(paths.tools_dir.clone()));

        log::info!(
            "pipeline: session ready (preset '{}', cache {})",
            config.mapping.preset,
            if cache.is_some() { "on" } else { "off" }
        );
        Ok(Self {
            config,
            cache,
            presets,
            table: preset.to_table(),
            phoneme_set: preset.phoneme_set,
            timeline: None,
            jobs: JobManager::new(runtime, converter),
            locator,
            active: None,
            state: new_shared_state(),
        })
    }

    /// Replace the cache, e.g. with an in-memory one.
    pub fn with_cache(mut self, cache: Option<CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn shared_state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn jobs_mut(&mut self) -> &mut JobManager {
        &mut self.jobs
    }

    // -----------------------------------------------------------------------
    // Timeline
    // -----------------------------------------------------------------------

    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    /// Replace the timeline wholesale, e.g. after importing a file.
    pub fn set_timeline(&mut self, timeline: Timeline) {
        let count = timeline.len();
        self.timeline = Some(timeline);
        let mut st = self.lock_state();
        st.phase = SessionPhase::Ready;
        st.cue_count = count;
        st.status = format!("{count} phonemes loaded");
        st.error_message = None;
    }

    pub fn import_timeline(&mut self, path: &Path) -> Result<()> {
        let timeline = Timeline::load_from(path)?;
        log::info!("pipeline: imported {} cues from {}", timeline.len(), path.display());
        self.set_timeline(timeline);
        Ok(())
    }

    pub fn export_timeline(&self, path: &Path) -> Result<PathBuf> {
        self.timeline
            .as_ref()
            .ok_or_else(no_timeline)?
            .save_to(path)
    }

    // -----------------------------------------------------------------------
    // Mapping
    // -----------------------------------------------------------------------

    pub fn mapping(&self) -> &MappingTable {
        &self.table
    }

    pub fn mapping_mut(&mut self) -> &mut MappingTable {
        &mut self.table
    }

    /// Replace the mapping table with a preset's.
    pub fn load_preset(&mut self, name: &str) -> Result<()> {
        let preset = self.presets.load(name)?;
        self.table = preset.to_table();
        self.phoneme_set = preset.phoneme_set;
        self.config.mapping.preset = name.to_string();
        log::info!("pipeline: loaded preset '{name}' ({} entries)", self.table.len());
        Ok(())
    }

    /// Save the current table, targets included, as user preset `name`.
    pub fn save_preset(&self, name: &str) -> Result<PathBuf> {
        let preset = Preset::from_table(name, self.phoneme_set, &self.table);
        self.presets.save(&preset)
    }

    /// Fill empty mapping targets from the target's element names.
    pub fn auto_map(&mut self, graph: &dyn TargetGraph, target: &str) -> usize {
        let elements = graph.sub_elements(target);
        let matched = self.table.auto_match_by_name(&elements);
        log::info!("pipeline: auto-mapped {matched} of {} entries on {target}", self.table.len());
        matched
    }

    pub fn validate_mapping(&self, graph: &dyn TargetGraph, target: &str) -> Vec<MappingDiagnostic> {
        self.table.validate_targets(&graph.sub_elements(target))
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    pub fn analyze_file(&mut self, audio: &Path, tool: Option<&Path>) -> Result<AnalysisStart> {
        self.analyze(&AudioSource::File(audio.to_path_buf()), &NoClips, tool)
    }

    /// Load the timeline for `source` from the cache, or start a job.
    ///
    /// `tool` overrides the configured executable.
    pub fn analyze(
        &mut self,
        source: &AudioSource,
        registry: &dyn AudioClipRegistry,
        tool: Option<&Path>,
    ) -> Result<AnalysisStart> {
        match self.try_analyze(source, registry, tool) {
            Ok(start) => Ok(start),
            Err(e) => {
                self.set_error(e.to_string());
                Err(e)
            }
        }
    }

    fn try_analyze(
        &mut self,
        source: &AudioSource,
        registry: &dyn AudioClipRegistry,
        tool: Option<&Path>,
    ) -> Result<AnalysisStart> {
        let audio = resolve_source(source, registry)?;
        validate_audio(&audio)?;

        if let Some(cache) = &self.cache {
            match cache.load(&audio) {
                Ok(Some(timeline)) => {
                    log::info!("pipeline: using cached phonemes for {}", audio.display());
                    self.set_timeline(timeline);
                    return Ok(AnalysisStart::Cached);
                }
                Ok(None) => {}
                Err(e) => log::warn!("pipeline: cache lookup failed: {e}"),
            }
        }

        let tool = self.locator.locate(tool)?;
        let request = JobRequest::new(audio, tool, self.config.tool.timeout())
            .with_recognizer(self.config.tool.recognizer.clone())
            .with_outer_timeout(self.config.tool.outer_timeout());
        let id = self.jobs.start(request)?;
        self.active = Some(id);

        let mut st = self.lock_state();
        st.phase = SessionPhase::Analyzing;
        st.progress = 0;
        st.elapsed = Duration::ZERO;
        st.status = "Analyzing audio".into();
        st.error_message = None;
        Ok(AnalysisStart::Started(id))
    }

    /// Non-blocking check on the running job.  `Idle` when none is active.
    pub fn poll_analysis(&mut self) -> JobState {
        match self.active {
            Some(id) => {
                let state = self.jobs.poll(id);
                self.settle(id, state)
            }
            None => JobState::Idle,
        }
    }

    /// Like [`poll_analysis`](Self::poll_analysis), blocking up to `timeout`.
    pub fn wait_analysis(&mut self, timeout: Duration) -> JobState {
        match self.active {
            Some(id) => {
                let state = self.jobs.wait(id, timeout);
                self.settle(id, state)
            }
            None => JobState::Idle,
        }
    }

    /// Cancel the running job.  Returns the settled state, `None` when
    /// nothing was running.
    pub fn cancel_analysis(&mut self) -> Option<JobState> {
        let id = self.active?;
        if !self.jobs.cancel(id) {
            return None;
        }
        let state = self.jobs.poll(id);
        Some(self.settle(id, state))
    }

    fn settle(&mut self, id: JobId, state: JobState) -> JobState {
        if state.is_busy() {
            if let Some(p) = self.jobs.progress(id) {
                let mut st = self.lock_state();
                st.progress = p.percent;
                st.elapsed = p.elapsed();
                st.status = p.message;
            }
            return state;
        }

        self.active = None;
        match &state {
            JobState::Succeeded(timeline) => {
                if let (Some(cache), Some(request)) = (&self.cache, self.jobs.request(id)) {
                    if let Err(e) = cache.save(&request.audio, timeline) {
                        log::warn!("pipeline: could not cache phonemes: {e}");
                    }
                }
                self.set_timeline(timeline.clone());
                self.lock_state().progress = 100;
            }
            other => self.set_error(other.message()),
        }
        state
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Write keys for the current timeline onto `controller` and, when
    /// `target` is given, bind its elements to the control value.
    pub fn generate<H>(
        &mut self,
        host: &mut H,
        controller: &str,
        target: Option<&str>,
    ) -> Result<GenerateReport>
    where
        H: TargetGraph + KeyframeSink + DriverSink,
    {
        match self.try_generate(host, controller, target) {
            Ok(report) => {
                let mut st = self.lock_state();
                st.phase = SessionPhase::Generated;
                st.status = format!(
                    "{} keyframes from {} phonemes",
                    report.keyframe_count, report.cue_count
                );
                st.last_report = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                self.set_error(e.to_string());
                Err(e)
            }
        }
    }

    fn try_generate<H>(
        &self,
        host: &mut H,
        controller: &str,
        target: Option<&str>,
    ) -> Result<GenerateReport>
    where
        H: TargetGraph + KeyframeSink + DriverSink,
    {
        let timeline = self.timeline.as_ref().ok_or_else(no_timeline)?;
        let anim = &self.config.animation;

        let reduced = reduce_timeline(timeline);
        let cues = process(&reduced.cues, anim.merge_threshold, anim.min_hold_seconds());
        let compiled = compile(&cues, &self.table, &anim.compile_options())?;
        if compiled.unmapped_count > 0 {
            log::warn!(
                "pipeline: {} cues had no mapping and use index 0",
                compiled.unmapped_count
            );
        }

        let form = if anim.use_clip {
            OutputForm::Clip {
                name: anim.clip_name.clone(),
                track: anim.clip_name.clone(),
            }
        } else {
            OutputForm::Direct
        };
        let options = WriteOptions {
            controller: controller.to_string(),
            form,
            interpolation: anim.interpolation,
            start_frame: anim.start_frame,
        };
        write_keyframes(&compiled.keyframes, &options, &mut *host)?;

        let binding = match target {
            Some(target) => Some(
                DriverBinder::new(controller, anim.blend_range).bind_on(
                    target,
                    &compiled.bindings,
                    host,
                )?,
            ),
            None => None,
        };

        Ok(GenerateReport {
            keyframe_count: compiled.keyframes.len(),
            first_frame: compiled.keyframes.first_frame(),
            last_frame: compiled.keyframes.last_frame(),
            cue_count: compiled.cue_count,
            unmapped_count: compiled.unmapped_count,
            unique_indices: compiled.unique_indices(),
            binding,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_error(&self, message: String) {
        log::error!("pipeline error: {message}");
        let mut st = self.lock_state();
        st.phase = SessionPhase::Error;
        st.status = message.clone();
        st.error_message = Some(message);
    }
}

fn no_timeline() -> LipSyncError {
    LipSyncError::InvalidTimeline("no phoneme data; analyze audio first".into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
