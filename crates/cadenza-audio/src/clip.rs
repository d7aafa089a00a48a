//! Audio Clips
//!
//! Loaded, immutable sound data shared by any number of playing instances.

use std::path::Path;

use bitflags::bitflags;
use cadenza_core::{Handle, truncate_name};
use cadenza_platform::{EngineResult, MixerEngine, SoundHandle, SoundMode};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Properties fixed when a clip is created
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ClipProperties: u32 {
        /// Loop forever
        const LOOPING = 1 << 0;
        /// Positional (3D) playback
        const SPATIAL = 1 << 1;
    }
}

impl ClipProperties {
    /// Engine format flags for these properties
    pub fn sound_mode(self) -> SoundMode {
        let mut mode = if self.contains(Self::SPATIAL) {
            SoundMode::MODE_3D
        } else {
            SoundMode::MODE_2D
        };
        if self.contains(Self::LOOPING) {
            mode |= SoundMode::LOOP_NORMAL;
        }
        mode
    }
}

/// Caller-owned reference to a clip held by the audio manager.
///
/// Released with [`AudioManager::destroy_clip`](crate::AudioManager::destroy_clip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(pub(crate) Handle);

impl ClipHandle {
    /// Underlying arena handle
    pub fn raw(&self) -> Handle {
        self.0
    }
}

/// Loaded sound data plus its display name
#[derive(Debug)]
pub struct Clip {
    sound: SoundHandle,
    name: String,
    properties: ClipProperties,
}

impl Clip {
    pub(crate) fn new(sound: SoundHandle, source: &Path, properties: ClipProperties) -> Self {
        Self {
            sound,
            name: truncate_name(&source.to_string_lossy()),
            properties,
        }
    }

    /// Engine sound handle
    pub fn sound(&self) -> SoundHandle {
        self.sound
    }

    /// Display name (truncated source path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties the clip was created with
    pub fn properties(&self) -> ClipProperties {
        self.properties
    }

    pub fn is_looping(&self) -> bool {
        self.properties.contains(ClipProperties::LOOPING)
    }

    pub fn is_spatial(&self) -> bool {
        self.properties.contains(ClipProperties::SPATIAL)
    }

    /// Free the engine sound. Consumes the clip so the release happens once.
    pub(crate) fn release<E: MixerEngine>(self, engine: &mut E) -> EngineResult<()> {
        engine.release_sound(self.sound)
    }
}
