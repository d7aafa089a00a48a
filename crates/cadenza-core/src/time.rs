//! Frame Timing
//!
//! Frame-time wrapper used by the per-frame audio tick:
//! - Validity check for listener velocity derivation
//! - Velocity derivation from successive listener positions

use glam::Vec3;

/// Upper bound (exclusive) of a frame time that still counts as a valid tick.
///
/// Longer frames are treated as hitches: deriving a velocity across them would
/// produce huge spurious values.
pub const MAX_VALID_FRAME_TIME: f32 = 1.0;

/// Frame time wrapper for type safety
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FrameTime(pub f32);

impl FrameTime {
    /// Create a new frame time from seconds
    pub fn from_secs(secs: f32) -> Self {
        Self(secs)
    }

    /// Whether this frame time lies in the open interval (0, 1) seconds
    pub fn is_valid_tick(&self) -> bool {
        self.0 > 0.0 && self.0 < MAX_VALID_FRAME_TIME
    }

    /// Derive a velocity from two positions sampled one frame apart.
    ///
    /// Returns `None` when the frame time is not a valid tick.
    pub fn derive_velocity(&self, last: Vec3, current: Vec3) -> Option<Vec3> {
        self.is_valid_tick().then(|| (current - last) / self.0)
    }
}
