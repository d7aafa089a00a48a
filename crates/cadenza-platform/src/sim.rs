//! Simulated Engine
//!
//! Deterministic software implementation of [`MixerEngine`] with no device
//! output. Sounds are registered up front with a length; every `update`
//! advances unpaused channels by a fixed tick and retires the ones that run
//! out. Used by the command-line host and by tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ahash::AHashMap;
use glam::Vec3;

use crate::engine::{
    ChannelHandle, EngineInfo, EngineSettings, GroupHandle, ListenerAttributes, MixerEngine,
    SoundHandle, SoundMode,
};
use crate::{EngineError, EngineResult};

/// Version number reported by the simulated engine
pub const SIM_VERSION: u32 = 0x0001_0000;

/// Driver name reported by the simulated engine
pub const SIM_DRIVER: &str = "Simulated Output";

/// Per-capability call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCalls {
    pub create_sound: u32,
    pub release_sound: u32,
    pub create_group: u32,
    pub release_group: u32,
    pub set_group_volume: u32,
    pub play_sound: u32,
    pub set_channel_paused: u32,
    pub set_channel_volume: u32,
    pub set_channel_3d_attributes: u32,
    pub set_channel_min_max_distance: u32,
    pub stop_channel: u32,
    pub set_listener_attributes: u32,
    pub update: u32,
    pub close: u32,
}

/// Capabilities that should report failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimFailures {
    pub init: bool,
    pub info: bool,
    pub create_group: bool,
    pub release_group: bool,
    pub play: bool,
    pub listener: bool,
    pub update: bool,
    pub close: bool,
}

/// Loaded sound data
#[derive(Debug, Clone)]
pub struct SimSound {
    pub path: PathBuf,
    pub length: Duration,
    pub mode: SoundMode,
}

/// Output group state
#[derive(Debug, Clone)]
pub struct SimGroup {
    pub name: String,
    pub volume: f32,
}

/// Channel state
#[derive(Debug, Clone)]
pub struct SimChannel {
    pub sound: SoundHandle,
    pub group: GroupHandle,
    pub elapsed: Duration,
    pub length: Duration,
    pub looping: bool,
    pub paused: bool,
    pub volume: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl SimChannel {
    fn is_finished(&self) -> bool {
        !self.looping && self.elapsed >= self.length
    }
}

/// Deterministic mixing engine without device output
#[derive(Debug)]
pub struct SimulatedEngine {
    tick: Duration,
    failures: SimFailures,
    settings: Option<EngineSettings>,
    settings_3d: (f32, f32, f32),
    closed: bool,
    library: AHashMap<PathBuf, Duration>,
    sounds: AHashMap<SoundHandle, SimSound>,
    groups: AHashMap<GroupHandle, SimGroup>,
    channels: AHashMap<ChannelHandle, SimChannel>,
    listeners: AHashMap<u32, ListenerAttributes>,
    next_id: u64,
    calls: EngineCalls,
}

impl SimulatedEngine {
    /// Create a simulated engine ticking at 60 Hz
    pub fn new() -> Self {
        Self {
            tick: Duration::from_secs_f64(1.0 / 60.0),
            failures: SimFailures::default(),
            settings: None,
            settings_3d: (1.0, 1.0, 1.0),
            closed: false,
            library: AHashMap::new(),
            sounds: AHashMap::new(),
            groups: AHashMap::new(),
            channels: AHashMap::new(),
            listeners: AHashMap::new(),
            next_id: 1,
            calls: EngineCalls::default(),
        }
    }

    /// Set the time each `update` advances channels by
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Make the given capabilities fail
    pub fn with_failures(mut self, failures: SimFailures) -> Self {
        self.failures = failures;
        self
    }

    /// Change failure injection at runtime
    pub fn set_failures(&mut self, failures: SimFailures) {
        self.failures = failures;
    }

    /// Make `path` loadable with the given playback length
    pub fn register_sound(&mut self, path: impl Into<PathBuf>, length: Duration) {
        self.library.insert(path.into(), length);
    }

    /// Call counters so far
    pub fn calls(&self) -> EngineCalls {
        self.calls
    }

    /// Settings passed to `init`, if it succeeded
    pub fn settings(&self) -> Option<&EngineSettings> {
        self.settings.as_ref()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of loaded sounds
    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    /// Number of live groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of active channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Look up a loaded sound
    pub fn sound(&self, sound: SoundHandle) -> Option<&SimSound> {
        self.sounds.get(&sound)
    }

    /// Look up a group
    pub fn group(&self, group: GroupHandle) -> Option<&SimGroup> {
        self.groups.get(&group)
    }

    /// Look up a group by name
    pub fn group_by_name(&self, name: &str) -> Option<&SimGroup> {
        self.groups.values().find(|g| g.name == name)
    }

    /// Look up an active channel
    pub fn channel(&self, channel: ChannelHandle) -> Option<&SimChannel> {
        self.channels.get(&channel)
    }

    /// All active channels
    pub fn channels(&self) -> impl Iterator<Item = (ChannelHandle, &SimChannel)> {
        self.channels.iter().map(|(handle, channel)| (*handle, channel))
    }

    /// Last attributes set for listener `index`
    pub fn listener(&self, index: u32) -> Option<&ListenerAttributes> {
        self.listeners.get(&index)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn channel_mut(&mut self, channel: ChannelHandle) -> EngineResult<&mut SimChannel> {
        self.channels.get_mut(&channel).ok_or(EngineError::InvalidHandle)
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MixerEngine for SimulatedEngine {
    fn init(&mut self, settings: &EngineSettings) -> EngineResult<()> {
        if self.failures.init {
            return Err(EngineError::InitFailed(String::from("simulated init failure")));
        }
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn info(&self) -> EngineResult<EngineInfo> {
        if self.failures.info {
            return Err(EngineError::Backend(String::from("driver info unavailable")));
        }
        Ok(EngineInfo {
            version: SIM_VERSION,
            driver: String::from(SIM_DRIVER),
        })
    }

    fn set_3d_settings(
        &mut self,
        doppler_scale: f32,
        distance_factor: f32,
        rolloff_scale: f32,
    ) -> EngineResult<()> {
        self.settings_3d = (doppler_scale, distance_factor, rolloff_scale);
        Ok(())
    }

    fn create_sound(&mut self, path: &Path, mode: SoundMode) -> EngineResult<SoundHandle> {
        self.calls.create_sound += 1;

        let length = *self
            .library
            .get(path)
            .ok_or_else(|| EngineError::NotFound(path.to_path_buf()))?;

        let handle = SoundHandle(self.next_id());
        self.sounds.insert(
            handle,
            SimSound {
                path: path.to_path_buf(),
                length,
                mode,
            },
        );
        Ok(handle)
    }

    fn release_sound(&mut self, sound: SoundHandle) -> EngineResult<()> {
        self.calls.release_sound += 1;
        self.sounds.remove(&sound).ok_or(EngineError::InvalidHandle)?;

        // Channels still playing this sound lose their data
        self.channels.retain(|_, channel| channel.sound != sound);
        Ok(())
    }

    fn create_group(&mut self, name: &str) -> EngineResult<GroupHandle> {
        self.calls.create_group += 1;
        if self.failures.create_group {
            return Err(EngineError::CreateFailed(format!("group {}", name)));
        }

        let handle = GroupHandle(self.next_id());
        self.groups.insert(
            handle,
            SimGroup {
                name: name.to_string(),
                volume: 1.0,
            },
        );
        Ok(handle)
    }

    fn release_group(&mut self, group: GroupHandle) -> EngineResult<()> {
        self.calls.release_group += 1;
        if self.failures.release_group {
            return Err(EngineError::Backend(String::from("simulated group release failure")));
        }
        self.groups.remove(&group).ok_or(EngineError::InvalidHandle)?;
        Ok(())
    }

    fn set_group_volume(&mut self, group: GroupHandle, volume: f32) -> EngineResult<()> {
        self.calls.set_group_volume += 1;
        let group = self.groups.get_mut(&group).ok_or(EngineError::InvalidHandle)?;
        group.volume = volume;
        Ok(())
    }

    fn play_sound(
        &mut self,
        sound: SoundHandle,
        group: GroupHandle,
        paused: bool,
    ) -> EngineResult<ChannelHandle> {
        self.calls.play_sound += 1;
        if self.failures.play {
            return Err(EngineError::PlaybackFailed(String::from("simulated playback failure")));
        }
        if !self.groups.contains_key(&group) {
            return Err(EngineError::InvalidHandle);
        }

        let data = self.sounds.get(&sound).ok_or(EngineError::InvalidHandle)?;
        let channel = SimChannel {
            sound,
            group,
            elapsed: Duration::ZERO,
            length: data.length,
            looping: data.mode.contains(SoundMode::LOOP_NORMAL),
            paused,
            volume: 1.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            min_distance: 1.0,
            max_distance: 10000.0,
        };

        let handle = ChannelHandle(self.next_id());
        self.channels.insert(handle, channel);
        Ok(handle)
    }

    fn set_channel_paused(&mut self, channel: ChannelHandle, paused: bool) -> EngineResult<()> {
        self.calls.set_channel_paused += 1;
        self.channel_mut(channel)?.paused = paused;
        Ok(())
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: f32) -> EngineResult<()> {
        self.calls.set_channel_volume += 1;
        self.channel_mut(channel)?.volume = volume;
        Ok(())
    }

    fn set_channel_3d_attributes(
        &mut self,
        channel: ChannelHandle,
        position: Vec3,
        velocity: Option<Vec3>,
    ) -> EngineResult<()> {
        self.calls.set_channel_3d_attributes += 1;
        let channel = self.channel_mut(channel)?;
        channel.position = position;
        if let Some(velocity) = velocity {
            channel.velocity = velocity;
        }
        Ok(())
    }

    fn set_channel_min_max_distance(
        &mut self,
        channel: ChannelHandle,
        min: f32,
        max: f32,
    ) -> EngineResult<()> {
        self.calls.set_channel_min_max_distance += 1;
        let channel = self.channel_mut(channel)?;
        channel.min_distance = min;
        channel.max_distance = max;
        Ok(())
    }

    fn stop_channel(&mut self, channel: ChannelHandle) -> EngineResult<()> {
        self.calls.stop_channel += 1;
        self.channels.remove(&channel).ok_or(EngineError::InvalidHandle)?;
        Ok(())
    }

    fn is_channel_playing(&self, channel: ChannelHandle) -> EngineResult<bool> {
        self.channels
            .get(&channel)
            .map(|channel| !channel.is_finished())
            .ok_or(EngineError::InvalidHandle)
    }

    fn set_listener_attributes(
        &mut self,
        index: u32,
        attributes: &ListenerAttributes,
    ) -> EngineResult<()> {
        self.calls.set_listener_attributes += 1;
        if self.failures.listener {
            return Err(EngineError::Backend(String::from("listener rejected")));
        }
        self.listeners.insert(index, *attributes);
        Ok(())
    }

    fn update(&mut self) -> EngineResult<()> {
        self.calls.update += 1;

        let tick = self.tick;
        for channel in self.channels.values_mut().filter(|c| !c.paused) {
            channel.elapsed += tick;
        }
        self.channels.retain(|_, channel| !channel.is_finished());

        if self.failures.update {
            return Err(EngineError::Backend(String::from("simulated update failure")));
        }
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        self.calls.close += 1;
        if self.failures.close {
            return Err(EngineError::Backend(String::from("simulated close failure")));
        }
        self.closed = true;
        self.channels.clear();
        Ok(())
    }
}
