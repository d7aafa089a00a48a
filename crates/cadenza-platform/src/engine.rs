//! Mixing Engine Boundary
//!
//! Narrow capability interface over the underlying mixing/decoding engine.
//! The audio layer never talks to a device directly; everything goes through
//! [`MixerEngine`].

use std::path::Path;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::EngineResult;

/// Opaque handle to loaded sound data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle(pub u64);

/// Opaque handle to an output group (bus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(pub u64);

/// Opaque handle to a playing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub u64);

bitflags! {
    /// Format flags applied when creating a sound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SoundMode: u32 {
        /// Non-positional mixing
        const MODE_2D = 1 << 0;
        /// Positional mixing with distance attenuation
        const MODE_3D = 1 << 1;
        /// Loop forever
        const LOOP_NORMAL = 1 << 2;
    }
}

/// Engine initialization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum number of simultaneously mixed channels
    pub max_channels: u32,
    /// Use a right-handed coordinate system for 3D attributes
    pub right_handed: bool,
    /// Doppler effect scale
    pub doppler_scale: f32,
    /// Units per meter
    pub distance_factor: f32,
    /// Global distance rolloff scale
    pub rolloff_scale: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_channels: 100,
            right_handed: true,
            doppler_scale: 1.0,
            distance_factor: 1.0,
            rolloff_scale: 1.0,
        }
    }
}

/// Version and output driver reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    /// Engine version number
    pub version: u32,
    /// Name of the output driver in use
    pub driver: String,
}

/// Listener position and orientation for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerAttributes {
    /// Position in 3D space
    pub position: Vec3,
    /// Velocity (for Doppler effect)
    pub velocity: Vec3,
    /// Forward direction
    pub forward: Vec3,
    /// Up direction
    pub up: Vec3,
}

impl Default for ListenerAttributes {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

/// Capabilities required from a mixing engine.
///
/// All calls are synchronous and made from a single thread.
pub trait MixerEngine {
    /// Initialize the output device
    fn init(&mut self, settings: &EngineSettings) -> EngineResult<()>;

    /// Version and driver information
    fn info(&self) -> EngineResult<EngineInfo>;

    /// Global 3D parameters
    fn set_3d_settings(
        &mut self,
        doppler_scale: f32,
        distance_factor: f32,
        rolloff_scale: f32,
    ) -> EngineResult<()>;

    /// Load sound data from `path`
    fn create_sound(&mut self, path: &Path, mode: SoundMode) -> EngineResult<SoundHandle>;

    /// Free sound data
    fn release_sound(&mut self, sound: SoundHandle) -> EngineResult<()>;

    /// Create a named output group
    fn create_group(&mut self, name: &str) -> EngineResult<GroupHandle>;

    /// Free an output group
    fn release_group(&mut self, group: GroupHandle) -> EngineResult<()>;

    /// Set the gain of an output group
    fn set_group_volume(&mut self, group: GroupHandle, volume: f32) -> EngineResult<()>;

    /// Start playing `sound` routed to `group`, optionally starting paused
    fn play_sound(
        &mut self,
        sound: SoundHandle,
        group: GroupHandle,
        paused: bool,
    ) -> EngineResult<ChannelHandle>;

    /// Pause or resume a channel
    fn set_channel_paused(&mut self, channel: ChannelHandle, paused: bool) -> EngineResult<()>;

    /// Set the gain of a channel
    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> EngineResult<()>;

    /// Set channel position and, if given, velocity
    fn set_channel_3d_attributes(
        &mut self,
        channel: ChannelHandle,
        position: Vec3,
        velocity: Option<Vec3>,
    ) -> EngineResult<()>;

    /// Set channel attenuation range
    fn set_channel_min_max_distance(
        &mut self,
        channel: ChannelHandle,
        min: f32,
        max: f32,
    ) -> EngineResult<()>;

    /// Stop a channel; the handle is invalid afterwards
    fn stop_channel(&mut self, channel: ChannelHandle) -> EngineResult<()>;

    /// Whether a channel is still producing sound
    fn is_channel_playing(&self, channel: ChannelHandle) -> EngineResult<bool>;

    /// Set listener attributes for listener `index`
    fn set_listener_attributes(
        &mut self,
        index: u32,
        attributes: &ListenerAttributes,
    ) -> EngineResult<()>;

    /// Advance the engine's internal mixing state
    fn update(&mut self) -> EngineResult<()>;

    /// Close the output device
    fn close(&mut self) -> EngineResult<()>;
}

impl<E: MixerEngine + ?Sized> MixerEngine for Box<E> {
    fn init(&mut self, settings: &EngineSettings) -> EngineResult<()> {
        (**self).init(settings)
    }

    fn info(&self) -> EngineResult<EngineInfo> {
        (**self).info()
    }

    fn set_3d_settings(
        &mut self,
        doppler_scale: f32,
        distance_factor: f32,
        rolloff_scale: f32,
    ) -> EngineResult<()> {
        (**self).set_3d_settings(doppler_scale, distance_factor, rolloff_scale)
    }

    fn create_sound(&mut self, path: &Path, mode: SoundMode) -> EngineResult<SoundHandle> {
        (**self).create_sound(path, mode)
    }

    fn release_sound(&mut self, sound: SoundHandle) -> EngineResult<()> {
        (**self).release_sound(sound)
    }

    fn create_group(&mut self, name: &str) -> EngineResult<GroupHandle> {
        (**self).create_group(name)
    }

    fn release_group(&mut self, group: GroupHandle) -> EngineResult<()> {
        (**self).release_group(group)
    }

    fn set_group_volume(&mut self, group: GroupHandle, volume: f32) -> EngineResult<()> {
        (**self).set_group_volume(group, volume)
    }

    fn play_sound(
        &mut self,
        sound: SoundHandle,
        group: GroupHandle,
        paused: bool,
    ) -> EngineResult<ChannelHandle> {
        (**self).play_sound(sound, group, paused)
    }

    fn set_channel_paused(&mut self, channel: ChannelHandle, paused: bool) -> EngineResult<()> {
        (**self).set_channel_paused(channel, paused)
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> EngineResult<()> {
        (**self).set_channel_volume(channel, volume)
    }

    fn set_channel_3d_attributes(
        &mut self,
        channel: ChannelHandle,
        position: Vec3,
        velocity: Option<Vec3>,
    ) -> EngineResult<()> {
        (**self).set_channel_3d_attributes(channel, position, velocity)
    }

    fn set_channel_min_max_distance(
        &mut self,
        channel: ChannelHandle,
        min: f32,
        max: f32,
    ) -> EngineResult<()> {
        (**self).set_channel_min_max_distance(channel, min, max)
    }

    fn stop_channel(&mut self, channel: ChannelHandle) -> EngineResult<()> {
        (**self).stop_channel(channel)
    }

    fn is_channel_playing(&self, channel: ChannelHandle) -> EngineResult<bool> {
        (**self).is_channel_playing(channel)
    }

    fn set_listener_attributes(
        &mut self,
        index: u32,
        attributes: &ListenerAttributes,
    ) -> EngineResult<()> {
        (**self).set_listener_attributes(index, attributes)
    }

    fn update(&mut self) -> EngineResult<()> {
        (**self).update()
    }

    fn close(&mut self) -> EngineResult<()> {
        (**self).close()
    }
}
