//! GPU rendering via wgpu.
//!
//! This module provides:
//! - Render context initialization (Metal on macOS, Vulkan on Linux)
//! - Fixed-resolution frame targets with mip chains
//! - The post-processing pass pipeline (blur chain / interpolation filter)
//! - Timestamp-query frame profiling

pub mod context;
pub mod mipmap;
pub mod postprocess;
pub mod profiler;
pub mod targets;

pub use context::{GpuError, RenderContext};
pub use mipmap::MipmapGenerator;
pub use postprocess::{FilterMode, PostProcessPipeline, MAX_MIP_LEVEL};
pub use profiler::{FrameProfiler, GpuTimingAccumulator, REPORT_INTERVAL};
pub use targets::{mip_level_count_for, FrameTarget, ReadbackBuffer, DEPTH_FORMAT};
