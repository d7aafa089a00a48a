//! Clip Instances
//!
//! One playback session of a clip on an output group. An instance either
//! belongs to the caller, who holds an [`InstanceHandle`] and must release it,
//! or to the manager, which reclaims it once it stops playing.

use cadenza_core::{Handle, Vec3};
use cadenza_platform::{ChannelHandle, EngineResult, GroupHandle, MixerEngine, SoundHandle};

use crate::clip::{Clip, ClipHandle};

/// Who is responsible for destroying an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Returned to the caller as an [`InstanceHandle`]
    Caller,
    /// Fire-and-forget; reclaimed by the manager once finished
    System,
}

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    /// Playback never started; every control call is a no-op
    Silent,
    /// The engine reports the channel active
    Playing,
    /// The channel ran out or was stopped by the engine
    Finished,
}

/// Where an instance is mixed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Non-positional: mixed at the origin with no attenuation floor
    Flat,
    /// Positional, attenuated from `min_distance` outwards
    Spatial { position: Vec3, min_distance: f32 },
}

/// Owned token for a caller-managed instance.
///
/// Deliberately not `Clone`: exactly one holder may release the instance.
#[must_use = "caller-managed instances must be released with AudioManager::destroy_instance"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub(crate) Handle);

impl InstanceHandle {
    /// Underlying arena handle
    pub fn raw(&self) -> Handle {
        self.0
    }
}

/// A live playback session
#[derive(Debug)]
pub struct ClipInstance {
    clip: ClipHandle,
    clip_name: String,
    group: usize,
    ownership: Ownership,
    channel: Option<ChannelHandle>,
}

impl ClipInstance {
    pub(crate) fn new(
        clip: ClipHandle,
        source: &Clip,
        group: usize,
        ownership: Ownership,
        channel: Option<ChannelHandle>,
    ) -> Self {
        Self {
            clip,
            clip_name: source.name().to_string(),
            group,
            ownership,
            channel,
        }
    }

    /// Start a channel for `sound` on `group`.
    ///
    /// The channel is created paused, positioned, then released so the first
    /// mixed samples already carry the 3D attributes. Flat placement pins the
    /// channel to the origin with a zero minimum distance.
    pub(crate) fn start_channel<E: MixerEngine>(
        engine: &mut E,
        sound: SoundHandle,
        group: GroupHandle,
        placement: Placement,
        max_distance: f32,
    ) -> EngineResult<ChannelHandle> {
        let channel = engine.play_sound(sound, group, true)?;

        let (position, min_distance) = match placement {
            Placement::Flat => (Vec3::ZERO, 0.0),
            Placement::Spatial { position, min_distance } => (position, min_distance),
        };
        let _ = engine.set_channel_3d_attributes(channel, position, None);
        let _ = engine.set_channel_min_max_distance(channel, min_distance, max_distance);

        if let Err(err) = engine.set_channel_paused(channel, false) {
            // A channel stuck paused would never finish
            let _ = engine.stop_channel(channel);
            return Err(err);
        }

        Ok(channel)
    }

    /// Clip this instance plays
    pub fn clip(&self) -> ClipHandle {
        self.clip
    }

    /// Name of the clip, kept for diagnostics
    pub fn name(&self) -> &str {
        &self.clip_name
    }

    /// Output group index
    pub fn group(&self) -> usize {
        self.group
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Engine channel, `None` when playback failed to start
    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel
    }

    pub fn is_silent(&self) -> bool {
        self.channel.is_none()
    }

    pub fn set_paused<E: MixerEngine>(&self, engine: &mut E, paused: bool) {
        if let Some(channel) = self.channel {
            let _ = engine.set_channel_paused(channel, paused);
        }
    }

    pub fn set_volume<E: MixerEngine>(&self, engine: &mut E, volume: f32) {
        if let Some(channel) = self.channel {
            let _ = engine.set_channel_volume(channel, volume);
        }
    }

    /// Move the instance. Without a velocity the engine keeps the previous one.
    pub fn set_position<E: MixerEngine>(
        &self,
        engine: &mut E,
        position: Vec3,
        velocity: Option<Vec3>,
    ) {
        if let Some(channel) = self.channel {
            let _ = engine.set_channel_3d_attributes(channel, position, velocity);
        }
    }

    /// Whether the engine still reports the channel active
    pub fn is_playing<E: MixerEngine>(&self, engine: &E) -> bool {
        self.channel
            .is_some_and(|channel| engine.is_channel_playing(channel).unwrap_or(false))
    }

    pub fn state<E: MixerEngine>(&self, engine: &E) -> InstanceState {
        match self.channel {
            None => InstanceState::Silent,
            Some(_) if self.is_playing(engine) => InstanceState::Playing,
            Some(_) => InstanceState::Finished,
        }
    }

    /// Stop the channel. Consumes the instance; this is its terminal state.
    pub(crate) fn stop<E: MixerEngine>(self, engine: Option<&mut E>) {
        if let (Some(channel), Some(engine)) = (self.channel, engine) {
            let _ = engine.stop_channel(channel);
        }
    }
}
