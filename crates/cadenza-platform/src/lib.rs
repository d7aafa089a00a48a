//! # Cadenza Platform
//!
//! Boundary between the Cadenza audio layer and the mixing engine underneath.
//!
//! This crate provides:
//! - **Engine**: The [`MixerEngine`] capability trait and its opaque handles
//! - **Simulation**: [`SimulatedEngine`], a deterministic engine without device output

pub mod engine;
pub mod sim;

pub use engine::{
    ChannelHandle, EngineInfo, EngineSettings, GroupHandle, ListenerAttributes, MixerEngine,
    SoundHandle, SoundMode,
};
pub use sim::{EngineCalls, SimFailures, SimulatedEngine};

use std::path::PathBuf;

use thiserror::Error;

/// Mixing engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine creation failed: {0}")]
    CreateFailed(String),

    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    #[error("Sound not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid engine handle")]
    InvalidHandle,

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Engine error: {0}")]
    Backend(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
