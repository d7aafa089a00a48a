//! # Cadenza Core
//!
//! Foundational types shared by the Cadenza audio crates:
//! - **Handles**: Generational arena with stale-handle detection
//! - **Time**: Frame-time validity and listener velocity derivation
//! - **Diagnostics**: Severity-tagged logging sink capability

pub mod diagnostics;
pub mod handle;
pub mod time;

pub use diagnostics::{AudioLog, Level, LogEntry, LogSink, RecordingLog};
pub use handle::{Arena, Handle};
pub use time::FrameTime;

pub use glam::Vec3;

/// Maximum length, in bytes, of a clip display name
pub const MAX_NAME_LEN: usize = 255;

/// Truncate a display name to [`MAX_NAME_LEN`] bytes on a character boundary
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }

    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}
