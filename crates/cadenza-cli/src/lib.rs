//! # Cadenza CLI
//!
//! Command-line host driving the Cadenza audio manager over the simulated
//! mixing engine.
//!
//! ## Commands
//! - `play` - Fire clips and run frames until they are reclaimed
//! - `info` - Print engine information and the effective configuration

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cadenza_audio::{AudioConfig, AudioManager, ClipProperties, LogSink, Vec3};
use cadenza_platform::{EngineInfo, MixerEngine, SimulatedEngine};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

/// Cadenza audio CLI
#[derive(Parser)]
#[command(name = "cadenza")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fire clips and run frames until they are reclaimed
    Play(PlayArgs),

    /// Print engine information and the effective configuration
    Info,
}

/// Arguments for `play`
#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Clip paths to fire
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Maximum number of frames to run
    #[arg(short, long, default_value = "600")]
    pub frames: u32,

    /// Frame time in seconds
    #[arg(short = 't', long, default_value = "0.016666668")]
    pub frame_time: f32,

    /// Output group
    #[arg(short, long, default_value = "0")]
    pub group: usize,

    /// Simulated clip length in seconds
    #[arg(short, long, default_value = "1.0")]
    pub length: f32,

    /// Output group volume
    #[arg(long, default_value = "1.0")]
    pub volume: f32,

    /// Place clips around the listener
    #[arg(long)]
    pub spatial: bool,

    /// Loop clips (they are never reclaimed)
    #[arg(long)]
    pub looping: bool,
}

/// Outcome of a `play` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReport {
    /// Frames actually run
    pub frames: u32,
    /// Instances reclaimed by the manager
    pub reclaimed: usize,
    /// Instances still live when the run ended
    pub remaining: usize,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    engine: Option<EngineInfo>,
    config: &'a AudioConfig,
}

/// Load the configuration file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<AudioConfig> {
    let Some(path) = path else {
        return Ok(AudioConfig::default());
    };

    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Fire every clip in `args` and run frames until all instances are reclaimed
/// or the frame limit is reached
pub fn simulate(config: &AudioConfig, args: &PlayArgs) -> Result<PlayReport> {
    let tick = Duration::try_from_secs_f32(args.frame_time).unwrap_or(Duration::ZERO);
    let length = Duration::try_from_secs_f32(args.length)
        .map_err(|_| anyhow!("invalid clip length: {}", args.length))?;

    let mut engine = SimulatedEngine::new().with_tick(tick);
    for path in &args.paths {
        engine.register_sound(path.clone(), length);
    }

    let mut manager = AudioManager::new(engine, LogSink, config.clone());
    manager.set_group_volume(args.group, args.volume);

    let mut properties = ClipProperties::empty();
    properties.set(ClipProperties::SPATIAL, args.spatial);
    properties.set(ClipProperties::LOOPING, args.looping);

    let mut clips = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let clip = manager
            .create_audio_clip(path, properties)
            .ok_or_else(|| anyhow!("failed to load {}", path.display()))?;
        clips.push(clip);
    }

    let count = clips.len();
    for (i, clip) in clips.iter().enumerate() {
        if args.spatial {
            let angle = i as f32 * TAU / count as f32;
            let position = Vec3::new(angle.cos(), 0.0, angle.sin()) * 10.0;
            manager.play_3d(*clip, args.group, position, 1.0);
        } else {
            manager.play_2d(*clip, args.group);
        }
    }
    log::info!("Fired {} clip(s), {} instance(s) live", count, manager.instance_count());

    let mut report = PlayReport {
        frames: 0,
        reclaimed: 0,
        remaining: 0,
    };
    while report.frames < args.frames && manager.instance_count() > 0 {
        let listener = Vec3::X * (report.frames as f32 * args.frame_time);
        let reclaimed = manager.update(args.frame_time, listener, Vec3::NEG_Z, Vec3::Y);
        report.frames += 1;
        report.reclaimed += reclaimed;

        if reclaimed > 0 {
            log::info!(
                "Frame {}: reclaimed {}, {} instance(s) live",
                report.frames,
                reclaimed,
                manager.instance_count()
            );
        } else {
            log::debug!("Frame {}: {} instance(s) live", report.frames, manager.instance_count());
        }
    }
    report.remaining = manager.instance_count();

    for clip in clips {
        manager.destroy_clip(clip);
    }
    Ok(report)
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play(args) => {
            let report = simulate(&config, &args)?;
            log::info!(
                "Ran {} frame(s): {} reclaimed, {} still live",
                report.frames,
                report.reclaimed,
                report.remaining
            );
        }

        Commands::Info => {
            let manager = AudioManager::new(SimulatedEngine::new(), LogSink, config);
            let report = InfoReport {
                engine: manager.engine().and_then(|engine| engine.info().ok()),
                config: manager.config(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
