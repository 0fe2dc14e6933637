//! Audio loading and playback.
//!
//! This module provides:
//! - Audio file loading via Symphonia (WAV, MP3, FLAC)
//! - The playback clock driving the whole show (rodio output device)

pub mod loader;
pub mod player;

// Re-export commonly used types
pub use loader::{load_audio, AudioData, AudioError};
pub use player::{clamp_seek, PlaybackClock, PlayerError};
