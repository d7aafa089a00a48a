//! Audio manager: owns the output groups and every live clip and instance.

use std::path::Path;

use cadenza_core::{Arena, AudioLog, FrameTime, Handle, Level, Vec3};
use cadenza_platform::{EngineError, EngineResult, GroupHandle, ListenerAttributes, MixerEngine};
use indexmap::IndexSet;

use crate::{AudioConfig, MAX_GROUPS};
use crate::clip::{Clip, ClipHandle, ClipProperties};
use crate::instance::{ClipInstance, InstanceHandle, InstanceState, Ownership, Placement};

macro_rules! report {
    ($log:expr, $level:expr, $($arg:tt)+) => {
        $log.print($level, format_args!($($arg)+))
    };
}

/// Lifecycle manager for clips, instances and output groups.
///
/// Single-threaded: call everything, including [`update`](Self::update) once
/// per frame, from the host's main loop. Engine failures never propagate; they
/// are reported through the injected [`AudioLog`] and surface as `None` or a
/// no-op.
pub struct AudioManager<E: MixerEngine> {
    log: Box<dyn AudioLog>,
    /// `None` when the engine could not be created or initialized
    engine: Option<E>,
    config: AudioConfig,
    /// One slot per group index; `None` where group creation failed
    groups: Vec<Option<GroupHandle>>,
    /// Listener position from the last valid tick
    last_position: Vec3,
    clip_store: Arena<Clip>,
    instance_store: Arena<ClipInstance>,
    /// Live clips in registration order
    clips: IndexSet<Handle>,
    /// All live instances in registration order
    instances: IndexSet<Handle>,
    /// Subset of `instances` the manager reclaims
    system_managed: IndexSet<Handle>,
}

impl<E: MixerEngine> AudioManager<E> {
    /// Start the audio system on an already created engine
    pub fn new(engine: E, log: impl AudioLog + 'static, config: AudioConfig) -> Self {
        Self::start(Ok(engine), Box::new(log), config)
    }

    /// Start the audio system, creating the engine with `factory`.
    ///
    /// A failing factory leaves the manager degraded: every engine-dependent
    /// call becomes a no-op.
    pub fn from_factory<F>(
        factory: F,
        log: impl AudioLog + 'static,
        config: AudioConfig,
    ) -> Self
    where
        F: FnOnce() -> EngineResult<E>,
    {
        Self::start(factory(), Box::new(log), config)
    }

    fn start(engine: EngineResult<E>, log: Box<dyn AudioLog>, mut config: AudioConfig) -> Self {
        report!(log, Level::Info, "Initializing audio system...");

        if config.groups > MAX_GROUPS {
            report!(log, Level::Error, "Too many groups: {} (max {})", config.groups, MAX_GROUPS);
            config.groups = MAX_GROUPS;
        }

        let mut manager = Self {
            log,
            engine: None,
            groups: vec![None; config.groups],
            config,
            last_position: Vec3::ZERO,
            clip_store: Arena::new(),
            instance_store: Arena::new(),
            clips: IndexSet::new(),
            instances: IndexSet::new(),
            system_managed: IndexSet::new(),
        };

        let mut engine = match engine {
            Ok(engine) => engine,
            Err(err) => {
                report!(manager.log, Level::Error, "Failed to create mixing engine: {}", err);
                return manager;
            }
        };

        match engine.info() {
            Ok(info) => {
                report!(manager.log, Level::Info, "Engine version: {:#x}", info.version);
                report!(manager.log, Level::Info, "Engine driver: {}", info.driver);
            }
            Err(err) => {
                report!(manager.log, Level::Warning, "Failed to get engine driver info: {}", err)
            }
        }

        let settings = &manager.config.engine;
        if let Err(err) = engine.init(settings) {
            report!(manager.log, Level::Error, "Failed to initialize mixing engine: {}", err);
            return manager;
        }

        let (doppler, distance, rolloff) =
            (settings.doppler_scale, settings.distance_factor, settings.rolloff_scale);
        if let Err(err) = engine.set_3d_settings(doppler, distance, rolloff) {
            report!(manager.log, Level::Warning, "Failed to set 3d settings: {}", err);
        }

        for (index, slot) in manager.groups.iter_mut().enumerate() {
            match engine.create_group(&format!("group{}", index)) {
                Ok(group) => *slot = Some(group),
                Err(err) => {
                    report!(manager.log, Level::Error, "Failed to create group {}: {}", index, err)
                }
            }
        }

        manager.engine = Some(engine);
        manager
    }

    /// Set the gain of output group `group`
    pub fn set_group_volume(&mut self, group: usize, volume: f32) {
        let Some(slot) = self.groups.get(group) else {
            report!(self.log, Level::Error, "set_group_volume - group out of range: {}", group);
            return;
        };
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let Some(handle) = *slot else {
            report!(self.log, Level::Error, "set_group_volume - group {} unavailable", group);
            return;
        };

        if let Err(err) = engine.set_group_volume(handle, volume) {
            report!(self.log, Level::Warning, "set_group_volume - group {}: {}", group, err);
        }
    }

    /// Load a clip from `path`. The caller owns the returned handle and
    /// releases it with [`destroy_clip`](Self::destroy_clip).
    pub fn create_audio_clip(
        &mut self,
        path: impl AsRef<Path>,
        properties: ClipProperties,
    ) -> Option<ClipHandle> {
        let path = path.as_ref();
        let Some(engine) = self.engine.as_mut() else {
            report!(
                self.log,
                Level::Error,
                "Failed to create {}: no mixing engine",
                path.display()
            );
            return None;
        };

        match engine.create_sound(path, properties.sound_mode()) {
            Ok(sound) => Some(self.register_clip(Clip::new(sound, path, properties))),
            Err(err) => {
                report!(self.log, Level::Error, "Failed to create {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Release a clip. Instances still playing it are destroyed with it.
    ///
    /// Returns `false` for a stale handle.
    pub fn destroy_clip(&mut self, clip: ClipHandle) -> bool {
        if !self.clip_store.contains(clip.0) {
            report!(self.log, Level::Warning, "destroy_clip - stale clip handle {}", clip.0);
            return false;
        }

        let dependents: Vec<Handle> = self
            .instances
            .iter()
            .copied()
            .filter(|handle| self.instance_store.get(*handle).is_some_and(|i| i.clip() == clip))
            .collect();
        for handle in dependents {
            if let Some(instance) = self.unregister_clip_instance(handle) {
                if instance.ownership() == Ownership::Caller {
                    report!(
                        self.log,
                        Level::Warning,
                        "Stopping clip instance {} whose clip was destroyed",
                        instance.name()
                    );
                }
                instance.stop(self.engine.as_mut());
            }
        }

        if let Some(clip) = self.unregister_clip(clip.0) {
            self.release_clip(clip);
        }
        true
    }

    /// Play `clip` non-positionally; the manager reclaims the instance
    pub fn play_2d(&mut self, clip: ClipHandle, group: usize) {
        self.play(clip, group, Placement::Flat, Ownership::System);
    }

    /// Play `clip` non-positionally and hand the instance to the caller
    pub fn play_2d_managed(&mut self, clip: ClipHandle, group: usize) -> Option<InstanceHandle> {
        self.play(clip, group, Placement::Flat, Ownership::Caller).map(InstanceHandle)
    }

    /// Play `clip` at `position`; the manager reclaims the instance
    pub fn play_3d(&mut self, clip: ClipHandle, group: usize, position: Vec3, min_distance: f32) {
        let placement = Placement::Spatial { position, min_distance };
        self.play(clip, group, placement, Ownership::System);
    }

    /// Play `clip` at `position` and hand the instance to the caller
    pub fn play_3d_managed(
        &mut self,
        clip: ClipHandle,
        group: usize,
        position: Vec3,
        min_distance: f32,
    ) -> Option<InstanceHandle> {
        let placement = Placement::Spatial { position, min_distance };
        self.play(clip, group, placement, Ownership::Caller).map(InstanceHandle)
    }

    fn play(
        &mut self,
        clip: ClipHandle,
        group: usize,
        placement: Placement,
        ownership: Ownership,
    ) -> Option<Handle> {
        let Some(source) = self.clip_store.get(clip.0) else {
            report!(self.log, Level::Warning, "play - stale clip handle {}", clip.0);
            return None;
        };
        let Some(slot) = self.groups.get(group) else {
            report!(self.log, Level::Error, "play - group out of range: {}", group);
            return None;
        };

        let channel = match (self.engine.as_mut(), *slot) {
            (Some(engine), Some(group_handle)) => {
                let (sound, max_distance) = (source.sound(), self.config.max_distance);
                ClipInstance::start_channel(engine, sound, group_handle, placement, max_distance)
            }
            (Some(_), None) => Err(EngineError::InvalidHandle),
            (None, _) => return None,
        };

        let channel = match channel {
            Ok(channel) => Some(channel),
            Err(err) => {
                report!(self.log, Level::Warning, "Failed to play {}: {}", source.name(), err);
                None
            }
        };

        let instance = ClipInstance::new(clip, source, group, ownership, channel);
        Some(self.register_clip_instance(instance))
    }

    /// Release a caller-managed instance, stopping its channel.
    ///
    /// Returns `false` if the instance was already gone (its clip was destroyed).
    pub fn destroy_instance(&mut self, instance: InstanceHandle) -> bool {
        match self.unregister_clip_instance(instance.0) {
            Some(instance) => {
                instance.stop(self.engine.as_mut());
                true
            }
            None => {
                report!(
                    self.log,
                    Level::Warning,
                    "destroy_instance - stale instance handle {}",
                    instance.0
                );
                false
            }
        }
    }

    /// Pause or resume a caller-managed instance
    pub fn set_paused(&mut self, instance: &InstanceHandle, paused: bool) {
        self.control(instance, "set_paused", |inst, engine| inst.set_paused(engine, paused));
    }

    /// Set the gain of a caller-managed instance
    pub fn set_volume(&mut self, instance: &InstanceHandle, volume: f32) {
        self.control(instance, "set_volume", |inst, engine| inst.set_volume(engine, volume));
    }

    /// Move a caller-managed instance. Without a velocity only the position changes.
    pub fn set_position(
        &mut self,
        instance: &InstanceHandle,
        position: Vec3,
        velocity: Option<Vec3>,
    ) {
        self.control(instance, "set_position", |inst, engine| {
            inst.set_position(engine, position, velocity)
        });
    }

    /// Whether a caller-managed instance is still playing
    pub fn is_playing(&self, instance: &InstanceHandle) -> bool {
        match (self.instance_store.get(instance.0), self.engine.as_ref()) {
            (Some(inst), Some(engine)) => inst.is_playing(engine),
            _ => false,
        }
    }

    /// Playback state of a caller-managed instance; `None` for a stale handle
    pub fn instance_state(&self, instance: &InstanceHandle) -> Option<InstanceState> {
        let inst = self.instance_store.get(instance.0)?;
        Some(match self.engine.as_ref() {
            Some(engine) => inst.state(engine),
            None => InstanceState::Silent,
        })
    }

    fn control<F>(&mut self, instance: &InstanceHandle, op: &str, f: F)
    where
        F: FnOnce(&ClipInstance, &mut E),
    {
        let Some(inst) = self.instance_store.get(instance.0) else {
            report!(self.log, Level::Warning, "{} - stale instance handle {}", op, instance.0);
            return;
        };
        if let Some(engine) = self.engine.as_mut() {
            f(inst, engine);
        }
    }

    /// Advance the audio tick.
    ///
    /// For a frame time in (0, 1) seconds the listener velocity is derived from
    /// the previous position and sent to the engine with the orientation; other
    /// frame times skip the listener update. The engine is then ticked and up
    /// to `reclaim_budget` finished system-managed instances are destroyed, in
    /// registration order. Returns how many were reclaimed.
    pub fn update(&mut self, frame_time: f32, position: Vec3, forward: Vec3, up: Vec3) -> usize {
        let Some(engine) = self.engine.as_mut() else {
            return 0;
        };

        let frame_time = FrameTime::from_secs(frame_time);
        if let Some(velocity) = frame_time.derive_velocity(self.last_position, position) {
            self.last_position = position;

            let attributes = ListenerAttributes {
                position,
                velocity,
                forward,
                up,
            };
            if let Err(err) = engine.set_listener_attributes(0, &attributes) {
                report!(
                    self.log,
                    Level::Warning,
                    "Failed to set the 3d listener position: {}",
                    err
                );
            }
        }

        if let Err(err) = engine.update() {
            report!(self.log, Level::Warning, "Failed to update mixing engine: {}", err);
        }

        self.reclaim_finished()
    }

    fn reclaim_finished(&mut self) -> usize {
        let Some(engine) = self.engine.as_ref() else {
            return 0;
        };

        let finished: Vec<Handle> = self
            .system_managed
            .iter()
            .copied()
            .filter(|handle| {
                self.instance_store
                    .get(*handle)
                    .is_some_and(|instance| !instance.is_playing(engine))
            })
            .take(self.config.reclaim_budget.max(1))
            .collect();

        for handle in &finished {
            if let Some(instance) = self.unregister_clip_instance(*handle) {
                instance.stop(self.engine.as_mut());
            }
        }
        finished.len()
    }

    fn register_clip(&mut self, clip: Clip) -> ClipHandle {
        let handle = self.clip_store.insert(clip);
        self.clips.insert(handle);
        ClipHandle(handle)
    }

    fn unregister_clip(&mut self, handle: Handle) -> Option<Clip> {
        self.clips.shift_remove(&handle);
        self.clip_store.remove(handle)
    }

    fn register_clip_instance(&mut self, instance: ClipInstance) -> Handle {
        let ownership = instance.ownership();
        let handle = self.instance_store.insert(instance);
        self.instances.insert(handle);
        if ownership == Ownership::System {
            self.system_managed.insert(handle);
        }
        handle
    }

    fn unregister_clip_instance(&mut self, handle: Handle) -> Option<ClipInstance> {
        let instance = self.instance_store.remove(handle)?;
        self.instances.shift_remove(&handle);
        if instance.ownership() == Ownership::System {
            self.system_managed.shift_remove(&handle);
        }
        Some(instance)
    }

    fn release_clip(&mut self, clip: Clip) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let name = clip.name().to_string();
        if let Err(err) = clip.release(engine) {
            report!(self.log, Level::Warning, "Failed to release clip {}: {}", name, err);
        }
    }

    /// Look up a live clip
    pub fn clip(&self, clip: ClipHandle) -> Option<&Clip> {
        self.clip_store.get(clip.0)
    }

    /// Look up a live caller-managed instance
    pub fn instance(&self, instance: &InstanceHandle) -> Option<&ClipInstance> {
        self.instance_store.get(instance.0)
    }

    /// All live instances in registration order
    pub fn instances(&self) -> impl Iterator<Item = &ClipInstance> {
        self.instances.iter().filter_map(|handle| self.instance_store.get(*handle))
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn system_managed_count(&self) -> usize {
        self.system_managed.len()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Listener position recorded on the last valid tick
    pub fn listener_position(&self) -> Vec3 {
        self.last_position
    }

    /// Whether the engine failed to come up
    pub fn is_degraded(&self) -> bool {
        self.engine.is_none()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }
}

impl<E: MixerEngine> Drop for AudioManager<E> {
    fn drop(&mut self) {
        report!(self.log, Level::Info, "Shutting down audio system...");

        let system_managed: Vec<Handle> = self.system_managed.iter().copied().collect();
        for handle in system_managed {
            if let Some(instance) = self.unregister_clip_instance(handle) {
                instance.stop(self.engine.as_mut());
            }
        }

        let leaked: Vec<Handle> = self.instances.iter().copied().collect();
        for handle in leaked {
            if let Some(instance) = self.unregister_clip_instance(handle) {
                let name = instance.name();
                report!(self.log, Level::Warning, "Failed to free clip instance {}", name);
                instance.stop(self.engine.as_mut());
            }
        }

        let leaked: Vec<Handle> = self.clips.iter().copied().collect();
        for handle in leaked {
            if let Some(clip) = self.unregister_clip(handle) {
                report!(self.log, Level::Warning, "Failed to free clip {}", clip.name());
                self.release_clip(clip);
            }
        }

        if let Some(engine) = self.engine.as_mut() {
            for (index, group) in self.groups.drain(..).enumerate() {
                let Some(group) = group else {
                    continue;
                };
                if let Err(err) = engine.release_group(group) {
                    report!(self.log, Level::Warning, "Failed to release group {}: {}", index, err);
                }
            }

            if let Err(err) = engine.close() {
                report!(self.log, Level::Error, "Failed to close mixing engine: {}", err);
            }
        }

        report!(self.log, Level::Info, "done");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadenza_platform::{SimFailures, SimulatedEngine};

    use super::*;
    use crate::DEFAULT_MAX_DISTANCE;
    use cadenza_core::RecordingLog;

    const FRAME: f32 = 1.0 / 60.0;

    fn engine() -> SimulatedEngine {
        let mut engine = SimulatedEngine::new().with_tick(Duration::from_millis(100));
        engine.register_sound("short.wav", Duration::from_millis(100));
        engine.register_sound("long.wav", Duration::from_secs(10));
        engine
    }

    fn setup() -> (AudioManager<SimulatedEngine>, RecordingLog) {
        let log = RecordingLog::new();
        let manager = AudioManager::new(engine(), log.clone(), AudioConfig::with_groups(2));
        (manager, log)
    }

    fn tick(manager: &mut AudioManager<SimulatedEngine>) -> usize {
        manager.update(FRAME, Vec3::ZERO, Vec3::NEG_Z, Vec3::Y)
    }

    #[test]
    fn test_startup_creates_groups() {
        let (manager, log) = setup();
        let engine = manager.engine().unwrap();

        assert!(!manager.is_degraded());
        assert_eq!(manager.num_groups(), 2);
        assert_eq!(engine.group_count(), 2);
        assert!(engine.group_by_name("group1").is_some());
        assert!(log.contains(Level::Info, "Initializing audio system"));
        assert!(log.contains(Level::Info, "Simulated Output"));
    }

    #[test]
    fn test_set_group_volume() {
        let (mut manager, _log) = setup();
        manager.set_group_volume(1, 0.3);

        let engine = manager.engine().unwrap();
        assert_eq!(engine.calls().set_group_volume, 1);
        assert_eq!(engine.group_by_name("group1").unwrap().volume, 0.3);
    }

    #[test]
    fn test_group_out_of_range_is_noop() {
        let (mut manager, log) = setup();

        for group in [2, 3, 100, usize::MAX] {
            manager.set_group_volume(group, 0.5);
        }

        assert_eq!(manager.engine().unwrap().calls().set_group_volume, 0);
        assert_eq!(log.count(Level::Error), 4);
        assert!(log.contains(Level::Error, "group out of range: 2"));
    }

    #[test]
    fn test_create_and_destroy_clip() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();

        assert_eq!(manager.clip_count(), 1);
        assert_eq!(manager.clip(clip).unwrap().name(), "long.wav");

        assert!(manager.destroy_clip(clip));
        assert_eq!(manager.clip_count(), 0);
        assert!(manager.clip(clip).is_none());
        assert_eq!(manager.engine().unwrap().sound_count(), 0);

        // Released exactly once
        assert!(!manager.destroy_clip(clip));
        assert_eq!(manager.engine().unwrap().calls().release_sound, 1);
    }

    #[test]
    fn test_create_clip_failure() {
        let (mut manager, log) = setup();

        assert!(manager.create_audio_clip("missing.wav", ClipProperties::empty()).is_none());
        assert_eq!(manager.clip_count(), 0);
        assert!(log.contains(Level::Error, "Failed to create missing.wav"));
    }

    #[test]
    fn test_clip_properties_reach_engine() {
        let (mut manager, _log) = setup();
        let clip = manager
            .create_audio_clip("long.wav", ClipProperties::SPATIAL | ClipProperties::LOOPING)
            .unwrap();

        let sound = manager.clip(clip).unwrap().sound();
        let mode = manager.engine().unwrap().sound(sound).unwrap().mode;
        assert_eq!(mode, ClipProperties::SPATIAL.union(ClipProperties::LOOPING).sound_mode());
    }

    #[test]
    fn test_ownership_membership() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();

        manager.play_2d(clip, 0);
        assert_eq!(manager.instance_count(), 1);
        assert_eq!(manager.system_managed_count(), 1);

        let handle = manager.play_2d_managed(clip, 0).unwrap();
        assert_eq!(manager.instance_count(), 2);
        assert_eq!(manager.system_managed_count(), 1);
        assert_eq!(manager.instance(&handle).unwrap().ownership(), Ownership::Caller);

        manager.play_3d(clip, 1, Vec3::X, 2.0);
        let spatial = manager.play_3d_managed(clip, 1, Vec3::Y, 2.0).unwrap();
        assert_eq!(manager.instance_count(), 4);
        assert_eq!(manager.system_managed_count(), 2);

        assert!(manager.destroy_instance(handle));
        assert!(manager.destroy_instance(spatial));
        assert_eq!(manager.instance_count(), 2);
        assert_eq!(manager.system_managed_count(), 2);
    }

    #[test]
    fn test_play_stale_clip_is_noop() {
        let (mut manager, log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();
        manager.destroy_clip(clip);

        manager.play_2d(clip, 0);
        assert!(manager.play_2d_managed(clip, 0).is_none());
        assert_eq!(manager.instance_count(), 0);
        assert_eq!(manager.engine().unwrap().calls().play_sound, 0);
        assert!(log.contains(Level::Warning, "stale clip handle"));
    }

    #[test]
    fn test_play_group_out_of_range() {
        let (mut manager, log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();

        manager.play_2d(clip, 5);
        assert_eq!(manager.instance_count(), 0);
        assert!(log.contains(Level::Error, "play - group out of range: 5"));
    }

    #[test]
    fn test_play_3d_sets_attenuation() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::SPATIAL).unwrap();
        let position = Vec3::new(3.0, 1.0, -7.0);
        let handle = manager.play_3d_managed(clip, 0, position, 4.0).unwrap();

        let channel = manager.instance(&handle).unwrap().channel().unwrap();
        let state = manager.engine().unwrap().channel(channel).unwrap();
        assert_eq!(state.position, position);
        assert_eq!(state.min_distance, 4.0);
        assert_eq!(state.max_distance, DEFAULT_MAX_DISTANCE);
        assert!(!state.paused);

        manager.destroy_instance(handle);
    }

    #[test]
    fn test_failed_playback_is_silent() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            play: true,
            ..Default::default()
        });
        let mut manager = AudioManager::new(engine, log.clone(), AudioConfig::with_groups(1));
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();

        let handle = manager.play_2d_managed(clip, 0).unwrap();
        assert_eq!(manager.instance_state(&handle), Some(InstanceState::Silent));
        assert!(!manager.is_playing(&handle));
        assert!(log.contains(Level::Warning, "Failed to play long.wav"));

        // Silent system-managed instances are reclaimed on the next update
        manager.play_2d(clip, 0);
        assert_eq!(tick(&mut manager), 1);
        assert_eq!(manager.system_managed_count(), 0);

        manager.destroy_instance(handle);
    }

    #[test]
    fn test_caller_controls() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::SPATIAL).unwrap();
        let handle = manager.play_3d_managed(clip, 0, Vec3::ZERO, 1.0).unwrap();
        let channel = manager.instance(&handle).unwrap().channel().unwrap();

        manager.set_paused(&handle, true);
        manager.set_paused(&handle, true);
        manager.set_volume(&handle, 0.4);
        manager.set_position(&handle, Vec3::X, Some(Vec3::Z));
        manager.set_position(&handle, Vec3::Y, None);

        let state = manager.engine().unwrap().channel(channel).unwrap();
        assert!(state.paused);
        assert_eq!(state.volume, 0.4);
        assert_eq!(state.position, Vec3::Y);
        assert_eq!(state.velocity, Vec3::Z);
        assert!(manager.is_playing(&handle));

        manager.set_paused(&handle, false);
        assert!(!manager.engine().unwrap().channel(channel).unwrap().paused);

        assert!(manager.destroy_instance(handle));
        assert_eq!(manager.engine().unwrap().channel_count(), 0);
    }

    #[test]
    fn test_listener_velocity_derivation() {
        let (mut manager, _log) = setup();
        manager.update(0.016, Vec3::new(1.0, 0.0, 0.0), Vec3::NEG_Z, Vec3::Y);

        let listener = *manager.engine().unwrap().listener(0).unwrap();
        assert!((listener.velocity.x - 62.5).abs() < 1e-3);
        assert_eq!(listener.velocity.y, 0.0);
        assert_eq!(listener.forward, Vec3::NEG_Z);
        assert_eq!(manager.listener_position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_invalid_frame_time_skips_listener() {
        let (mut manager, _log) = setup();

        for frame_time in [0.0, 1.0, -0.5, 3.0] {
            manager.update(frame_time, Vec3::new(5.0, 0.0, 0.0), Vec3::NEG_Z, Vec3::Y);
        }

        let engine = manager.engine().unwrap();
        assert_eq!(engine.calls().set_listener_attributes, 0);
        assert_eq!(engine.calls().update, 4);
        assert_eq!(manager.listener_position(), Vec3::ZERO);
    }

    #[test]
    fn test_listener_failure_is_warning() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            listener: true,
            update: true,
            ..Default::default()
        });
        let mut manager = AudioManager::new(engine, log.clone(), AudioConfig::default());

        tick(&mut manager);
        assert!(log.contains(Level::Warning, "Failed to set the 3d listener position"));
        assert!(log.contains(Level::Warning, "Failed to update mixing engine"));
        assert_eq!(log.count(Level::Error), 0);
    }

    #[test]
    fn test_reclaims_at_most_one_per_update() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("short.wav", ClipProperties::empty()).unwrap();
        for _ in 0..3 {
            manager.play_2d(clip, 0);
        }

        assert_eq!(tick(&mut manager), 1);
        assert_eq!(manager.system_managed_count(), 2);
        assert_eq!(tick(&mut manager), 1);
        assert_eq!(tick(&mut manager), 1);
        assert_eq!(tick(&mut manager), 0);
        assert_eq!(manager.instance_count(), 0);
    }

    #[test]
    fn test_reclaim_budget() {
        let log = RecordingLog::new();
        let config = AudioConfig::with_groups(1).with_reclaim_budget(2);
        let mut manager = AudioManager::new(engine(), log, config);
        let clip = manager.create_audio_clip("short.wav", ClipProperties::empty()).unwrap();
        for _ in 0..3 {
            manager.play_2d(clip, 0);
        }

        assert_eq!(tick(&mut manager), 2);
        assert_eq!(tick(&mut manager), 1);
        assert_eq!(manager.system_managed_count(), 0);
    }

    #[test]
    fn test_reclaim_skips_playing_instances() {
        let (mut manager, _log) = setup();
        let long = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();
        let short = manager.create_audio_clip("short.wav", ClipProperties::empty()).unwrap();
        manager.play_2d(long, 0);
        manager.play_2d(short, 0);

        assert_eq!(tick(&mut manager), 1);
        let remaining: Vec<_> = manager.instances().map(|i| i.name().to_string()).collect();
        assert_eq!(remaining, vec!["long.wav"]);
    }

    #[test]
    fn test_caller_instances_not_reclaimed() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("short.wav", ClipProperties::empty()).unwrap();
        let handle = manager.play_2d_managed(clip, 0).unwrap();

        for _ in 0..5 {
            tick(&mut manager);
        }
        assert_eq!(manager.instance_count(), 1);
        assert_eq!(manager.instance_state(&handle), Some(InstanceState::Finished));

        assert!(manager.destroy_instance(handle));
        assert_eq!(manager.instance_count(), 0);
    }

    #[test]
    fn test_destroy_clip_stops_its_instances() {
        let (mut manager, log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();
        let other = manager.create_audio_clip("short.wav", ClipProperties::empty()).unwrap();
        manager.play_2d(clip, 0);
        manager.play_2d(other, 0);
        let handle = manager.play_2d_managed(clip, 1).unwrap();

        manager.destroy_clip(clip);
        assert_eq!(manager.instance_count(), 1);
        assert_eq!(manager.system_managed_count(), 1);
        assert!(log.contains(Level::Warning, "whose clip was destroyed"));

        // The caller's handle is now stale
        assert!(!manager.is_playing(&handle));
        assert_eq!(manager.instance_state(&handle), None);
        manager.set_volume(&handle, 0.1);
        assert!(log.contains(Level::Warning, "set_volume - stale instance handle"));
        assert!(!manager.destroy_instance(handle));
    }

    #[test]
    fn test_engine_creation_failure_degrades() {
        let log = RecordingLog::new();
        let mut manager = AudioManager::<SimulatedEngine>::from_factory(
            || Err(EngineError::CreateFailed(String::from("no device"))),
            log.clone(),
            AudioConfig::with_groups(2),
        );

        assert!(manager.is_degraded());
        assert!(log.contains(Level::Error, "Failed to create mixing engine"));

        manager.set_group_volume(0, 0.5);
        assert!(manager.create_audio_clip("long.wav", ClipProperties::empty()).is_none());
        assert_eq!(tick(&mut manager), 0);
    }

    #[test]
    fn test_init_failure_degrades() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            init: true,
            ..Default::default()
        });
        let manager = AudioManager::new(engine, log.clone(), AudioConfig::default());

        assert!(manager.is_degraded());
        assert!(manager.engine().is_none());
        assert!(log.contains(Level::Error, "Failed to initialize mixing engine"));
    }

    #[test]
    fn test_group_creation_failure() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            create_group: true,
            ..Default::default()
        });
        let mut manager = AudioManager::new(engine, log.clone(), AudioConfig::with_groups(1));
        assert!(log.contains(Level::Error, "Failed to create group 0"));

        manager.set_group_volume(0, 0.5);
        assert!(log.contains(Level::Error, "group 0 unavailable"));
        assert_eq!(manager.engine().unwrap().calls().set_group_volume, 0);
    }

    #[test]
    fn test_teardown_order_and_leaks() {
        let (mut manager, log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::empty()).unwrap();
        manager.play_2d(clip, 0);
        let _leaked = manager.play_2d_managed(clip, 0).unwrap();

        drop(manager);

        let entries = log.entries();
        let position = |needle: &str| {
            entries.iter().position(|e| e.message.contains(needle)).unwrap()
        };
        let instance_leak = position("Failed to free clip instance long.wav");
        let clip_leak = position("Failed to free clip long.wav");
        assert!(position("Shutting down") < instance_leak);
        assert!(instance_leak < clip_leak);
        assert!(clip_leak < position("done"));
        assert_eq!(log.count(Level::Warning), 2);
    }

    #[test]
    fn test_close_failure_logged() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            close: true,
            ..Default::default()
        });
        drop(AudioManager::new(engine, log.clone(), AudioConfig::default()));

        assert!(log.contains(Level::Error, "Failed to close mixing engine"));
    }

    #[test]
    fn test_info_failure_is_warning() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            info: true,
            ..Default::default()
        });
        let manager = AudioManager::new(engine, log.clone(), AudioConfig::with_groups(1));

        assert!(!manager.is_degraded());
        assert!(log.contains(Level::Warning, "Failed to get engine driver info"));
        assert!(!log.contains(Level::Info, "Engine driver"));
        assert_eq!(log.count(Level::Error), 0);
        assert_eq!(manager.engine().unwrap().group_count(), 1);
    }

    #[test]
    fn test_group_release_failure_logged() {
        let log = RecordingLog::new();
        let engine = engine().with_failures(SimFailures {
            release_group: true,
            ..Default::default()
        });
        drop(AudioManager::new(engine, log.clone(), AudioConfig::with_groups(2)));

        assert!(log.contains(Level::Warning, "Failed to release group 0"));
        assert!(log.contains(Level::Warning, "Failed to release group 1"));
        assert_eq!(log.count(Level::Error), 0);
    }

    #[test]
    fn test_group_count_clamped() {
        let log = RecordingLog::new();
        let config = AudioConfig::with_groups(usize::MAX);
        let mut manager = AudioManager::new(engine(), log.clone(), config);

        assert!(log.contains(Level::Error, "Too many groups"));
        assert_eq!(manager.num_groups(), MAX_GROUPS);
        assert_eq!(manager.config().groups, MAX_GROUPS);
        assert_eq!(manager.engine().unwrap().group_count(), MAX_GROUPS);

        manager.set_group_volume(MAX_GROUPS, 0.5);
        assert!(log.contains(Level::Error, "group out of range: 256"));
    }

    #[test]
    fn test_play_2d_pins_spatial_clip_to_origin() {
        let (mut manager, _log) = setup();
        let clip = manager.create_audio_clip("long.wav", ClipProperties::SPATIAL).unwrap();
        let handle = manager.play_2d_managed(clip, 0).unwrap();

        let channel = manager.instance(&handle).unwrap().channel().unwrap();
        let state = manager.engine().unwrap().channel(channel).unwrap();
        assert_eq!(state.position, Vec3::ZERO);
        assert_eq!(state.min_distance, 0.0);
        assert_eq!(state.max_distance, DEFAULT_MAX_DISTANCE);

        manager.destroy_instance(handle);
    }
}
