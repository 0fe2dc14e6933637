//! Beatshow
//!
//! Beatmap-synchronized GPU light show player.
//!
//! # Features
//!
//! - Beatmap loading (difficulty + info files) with beat-to-seconds timing
//! - Audio decode via Symphonia, playback clock via rodio
//! - Instanced 3D stage rendering via wgpu into an offscreen target
//! - Multi-pass post-processing (blur chain or mip interpolation filter)
//! - Timestamp-query GPU frame profiling with averaged readouts

pub mod audio;
pub mod beatmap;
pub mod camera;
pub mod config;
pub mod frame;
pub mod gpu;
pub mod scene;

// Re-export commonly used types
pub use audio::{load_audio, AudioData, AudioError, PlaybackClock, PlayerError};
pub use beatmap::{beats_to_seconds, BeatEvent, EventKind, MapInfo, ParseError, Track};
pub use camera::Camera;
pub use config::{AppConfig, ConfigError};
pub use frame::{FrameDriver, FrameOrchestrator, SetupError};
pub use gpu::{
    FilterMode, FrameProfiler, FrameTarget, GpuError, GpuTimingAccumulator, PostProcessPipeline,
    RenderContext, MAX_MIP_LEVEL,
};
pub use scene::{SceneRenderer, SceneState};
