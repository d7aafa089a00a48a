//! # Cadenza Audio
//!
//! Lifecycle management for audio playback resources on top of a mixing engine.
//!
//! ## Features
//! - Clips: loaded sound data, owned by the caller through [`ClipHandle`]
//! - Instances: 2D or positional playback sessions, either caller-managed
//!   ([`InstanceHandle`]) or fire-and-forget and reclaimed by the manager
//! - Output groups with per-group volume
//! - Per-frame update deriving listener velocity from position
//!
//! ```ignore
//! let mut audio = AudioManager::new(engine, LogSink, AudioConfig::default());
//! let clip = audio.create_audio_clip("sfx/explosion.wav", ClipProperties::SPATIAL)?;
//! audio.play_3d(clip, 0, Vec3::new(10.0, 0.0, 0.0), 5.0);
//! audio.update(dt, camera_pos, camera_forward, Vec3::Y);
//! ```

pub mod clip;
pub mod instance;
pub mod manager;

pub use clip::{Clip, ClipHandle, ClipProperties};
pub use instance::{ClipInstance, InstanceHandle, InstanceState, Ownership, Placement};
pub use manager::AudioManager;

pub use cadenza_core::{AudioLog, Level, LogSink, RecordingLog, Vec3};
pub use cadenza_platform::{EngineSettings, MixerEngine};

use serde::{Deserialize, Serialize};

/// Maximum attenuation distance applied to positional instances
pub const DEFAULT_MAX_DISTANCE: f32 = 10000.0;

/// Upper bound on the number of output groups
pub const MAX_GROUPS: usize = 256;

/// Audio manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Number of output groups; valid group indices are `0..groups`, at most [`MAX_GROUPS`]
    pub groups: usize,
    /// Maximum attenuation distance for positional instances
    pub max_distance: f32,
    /// Finished system-managed instances reclaimed per update (at least one)
    pub reclaim_budget: usize,
    /// Engine initialization parameters
    pub engine: EngineSettings,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            groups: 4,
            max_distance: DEFAULT_MAX_DISTANCE,
            reclaim_budget: 1,
            engine: EngineSettings::default(),
        }
    }
}

impl AudioConfig {
    /// Configuration with `groups` output groups and defaults elsewhere
    pub fn with_groups(groups: usize) -> Self {
        Self {
            groups,
            ..Default::default()
        }
    }

    /// Set the number of finished instances reclaimed per update
    pub fn with_reclaim_budget(mut self, budget: usize) -> Self {
        self.reclaim_budget = budget;
        self
    }
}
