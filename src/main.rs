//! Command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] (defaults on first run or when unreadable).
//! 4. Create the [`tokio`] runtime (multi-thread, 2 workers) extraction
//!    jobs run on.
//! 5. Dispatch the subcommand.  Results go to stdout, progress to stderr.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use lipsync::cache::CacheStore;
use lipsync::config::{AppConfig, AppPaths};
use lipsync::extract::{verify_tool, JobState, ToolLocator};
use lipsync::host::MemoryHost;
use lipsync::mapping::PresetLibrary;
use lipsync::pipeline::{AnalysisStart, LipSyncSession};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "lipsync")]
#[command(about = "Phoneme extraction and lip-sync keyframe generation")]
#[command(version)]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rhubarb executable, overriding the configured one
    #[arg(long, global = true, env = "LIPSYNC_TOOL")]
    tool: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract phonemes from an audio file
    Analyze {
        audio: PathBuf,
        /// Write the timeline as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Ignore and do not update the cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Compile a timeline (JSON file or audio) and print the written keys
    Generate {
        input: PathBuf,
        /// Object that carries the control property
        #[arg(long, default_value = "Rig")]
        controller: String,
        /// Object whose elements are driven by the control value
        #[arg(long)]
        target: Option<String>,
        /// Layer names of the target (default: one per mapped symbol)
        #[arg(long, value_delimiter = ',')]
        layers: Vec<String>,
        /// Treat the target as a blend-shape container instead of layers
        #[arg(long)]
        blend_shapes: bool,
        /// Mapping preset to use instead of the configured one
        #[arg(long)]
        preset: Option<String>,
        /// Save the mapping, with auto-matched targets, as a user preset
        #[arg(long, value_name = "NAME")]
        save_preset: Option<String>,
    },
    /// Inspect or clear cached analyses
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List or show mapping presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
    /// Check that the Rhubarb executable runs
    Verify,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    List,
    Delete { audio: PathBuf },
    Clear,
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    List,
    Show { name: String },
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();
    let paths = AppPaths::new();

    // 3. Configuration
    let config_file = cli.config.clone().unwrap_or_else(|| paths.settings_file.clone());
    let config = AppConfig::load_from(&config_file).unwrap_or_else(|e| {
        log::warn!("config: failed to load {} ({e}), using defaults", config_file.display());
        AppConfig::default()
    });

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 5. Dispatch
    let tool = cli.tool.as_deref();
    match cli.command {
        Command::Analyze {
            audio,
            out,
            no_cache,
        } => {
            let mut session = LipSyncSession::new(config, &paths, rt.handle().clone())?;
            if no_cache {
                session = session.with_cache(None);
            }
            analyze(&rt, &mut session, &audio, tool)?;
            let timeline = session.timeline().context("analysis produced no timeline")?;
            match out {
                Some(out) => {
                    let written = session.export_timeline(&out)?;
                    println!("{} phonemes written to {}", timeline.len(), written.display());
                }
                None => println!("{}", serde_json::to_string_pretty(timeline)?),
            }
        }
        Command::Generate {
            input,
            controller,
            target,
            layers,
            blend_shapes,
            preset,
            save_preset,
        } => {
            let mut session = LipSyncSession::new(config, &paths, rt.handle().clone())?;
            if let Some(preset) = preset {
                session.load_preset(&preset)?;
            }
            if input.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
                session.import_timeline(&input)?;
            } else {
                analyze(&rt, &mut session, &input, tool)?;
            }

            let mut host = MemoryHost::new();
            host.add_plain_target(&controller);
            if let Some(target) = &target {
                let elements: Vec<String> = if layers.is_empty() {
                    session.mapping().entries().iter().map(|e| e.symbol.clone()).collect()
                } else {
                    layers
                };
                let names: Vec<&str> = elements.iter().map(String::as_str).collect();
                if blend_shapes {
                    host.add_blend_target(target, &names);
                } else {
                    host.add_layer_target(target, &names);
                }
                session.auto_map(&host, target);
                for diagnostic in session.validate_mapping(&host, target) {
                    log::warn!("mapping: {diagnostic}");
                }
            }
            if let Some(name) = &save_preset {
                let written = session.save_preset(name)?;
                eprintln!("preset '{name}' saved to {}", written.display());
            }

            let report = session.generate(&mut host, &controller, target.as_deref())?;
            let channels: Vec<_> = host
                .channels()
                .map(|(path, keys)| serde_json::json!({ "channel": path.to_string(), "keys": keys }))
                .collect();
            let drivers = target.as_deref().map(|t| host.drivers(t).to_vec());
            let output = serde_json::json!({
                "report": report,
                "channels": channels,
                "drivers": drivers,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Cache { action } => {
            let cache = CacheStore::in_directory(config.cache.resolve_dir(&paths));
            match action {
                CacheAction::List => {
                    for entry in cache.list()? {
                        println!(
                            "{}  {:>5} cues  {}",
                            entry.content_hash, entry.cue_count, entry.source_filename
                        );
                    }
                }
                CacheAction::Delete { audio } => println!("{}", cache.delete(&audio)?.message()),
                CacheAction::Clear => println!("removed {} cached analyses", cache.clear_all()?),
            }
        }
        Command::Presets { action } => {
            let library = PresetLibrary::new(paths.presets_dir.clone());
            match action {
                PresetAction::List => {
                    for name in library.list() {
                        println!("{name}");
                    }
                }
                PresetAction::Show { name } => {
                    println!("{}", serde_json::to_string_pretty(&library.load(&name)?)?);
                }
            }
        }
        Command::Verify => {
            let locator = ToolLocator::new(config.tool.path.clone(), Some(paths.tools_dir.clone()));
            let path = locator.locate(tool)?;
            let version = rt.block_on(verify_tool(&path))?;
            println!("{}: {version}", path.display());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Analysis loop
// ---------------------------------------------------------------------------

/// Run an analysis to completion, printing progress and honouring Ctrl-C.
fn analyze(rt: &Runtime, session: &mut LipSyncSession, audio: &Path, tool: Option<&Path>) -> Result<()> {
    if session.analyze_file(audio, tool)? == AnalysisStart::Cached {
        eprintln!("using cached analysis");
        return Ok(());
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    let interval = session.config().tool.poll_interval();
    let state = loop {
        if interrupted.load(Ordering::SeqCst) {
            // `None` means the job finished first; the next wait settles it.
            if let Some(state) = session.cancel_analysis() {
                break state;
            }
        }
        let state = session.wait_analysis(interval);
        if !state.is_busy() {
            break state;
        }
        let snap = session.snapshot();
        eprint!(
            "\r{:>3}% {:>6.1}s {:<60}",
            snap.progress,
            snap.elapsed.as_secs_f64(),
            snap.status
        );
    };
    eprintln!();
    match state {
        JobState::Succeeded(_) => Ok(()),
        other => bail!(other.message()),
    }
}
