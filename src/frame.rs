//! Per-frame orchestration.
//!
//! [`FrameDriver`] is the seam between the host event loop and the show:
//! the loop forwards render ticks, key presses, resizes and mouse deltas,
//! and [`FrameOrchestrator`] implements them. The orchestrator owns the
//! offscreen target, the post-processing pipeline, the playback clock and
//! the only write access to the screen surface.

use std::sync::Arc;

use thiserror::Error;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window};

use crate::audio::{load_audio, AudioError, PlaybackClock, PlayerError};
use crate::beatmap::{MapInfo, ParseError, Track};
use crate::camera::Camera;
use crate::config::AppConfig;
use crate::gpu::{
    FrameProfiler, FrameTarget, GpuError, PostProcessPipeline, RenderContext, MAX_MIP_LEVEL,
};
use crate::scene::SceneRenderer;

/// Internal color format of the offscreen and filter targets.
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Errors that abort startup. There is no partial run: a missing or
/// malformed asset fails the whole application.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Beatmap error: {0}")]
    Beatmap(#[from] ParseError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Audio output error: {0}")]
    Player(#[from] PlayerError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}

/// The interface the host loop drives. Plain trait, no framework base
/// class; the windowing layer calls these between frames, so handlers run
/// strictly outside the render body.
pub trait FrameDriver {
    /// Render one frame. `frame_delta_seconds` is wall-clock and only feeds
    /// camera movement; animation time comes from the playback clock.
    fn on_render(&mut self, frame_delta_seconds: f32) -> Result<(), wgpu::SurfaceError>;

    fn on_key(&mut self, event: &KeyEvent);

    fn on_resize(&mut self, width: u32, height: u32);

    fn on_mouse_move(&mut self, dx: f32, dy: f32);
}

/// Top-level per-frame driver.
pub struct FrameOrchestrator {
    window: Arc<Window>,
    ctx: RenderContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,

    offscreen: FrameTarget,
    scene: SceneRenderer,
    postprocess: PostProcessPipeline,
    profiler: Option<FrameProfiler>,

    clock: PlaybackClock,
    camera: Camera,
    camera_enabled: bool,
}

impl FrameOrchestrator {
    /// Load every asset and build the full pipeline. Any failure is fatal.
    pub async fn new(window: Arc<Window>, config: &AppConfig) -> Result<Self, SetupError> {
        let instance = RenderContext::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuError::from)?;
        let ctx = RenderContext::for_surface(instance, &surface).await?;

        let info = ctx.adapter_info();
        log::info!("Rendering on {} ({:?})", info.name, info.backend);

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let caps = surface.get_capabilities(&ctx.adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &surface_config);

        let map_info = MapInfo::load(&config.info_path())?;
        let track = Track::load(&config.difficulty_path(), map_info.beats_per_minute)?;
        log::info!(
            "Loaded {} ({} events at {} bpm)",
            config.difficulty_path().display(),
            track.len(),
            map_info.beats_per_minute
        );

        let audio = load_audio(&config.song_path(&map_info))?;
        let mut clock = PlaybackClock::new(audio)?;
        clock.set_volume(config.volume);
        clock.seek(config.start_offset_seconds);
        clock.play();

        // Offscreen and filter targets stay at their creation resolution;
        // window resizes only touch the surface and the camera.
        let offscreen = FrameTarget::for_scene(
            &ctx.device,
            "offscreen",
            width,
            height,
            COLOR_FORMAT,
            MAX_MIP_LEVEL,
        );
        let scene = SceneRenderer::new(
            ctx.device.clone(),
            ctx.queue.clone(),
            COLOR_FORMAT,
            track,
        );
        let postprocess = PostProcessPipeline::new(
            ctx.device.clone(),
            width,
            height,
            COLOR_FORMAT,
            surface_format,
            config.filter_mode,
        );
        let profiler = FrameProfiler::new(&ctx);
        let camera = Camera::new(width as f32 / height as f32);

        Ok(Self {
            window,
            ctx,
            surface,
            surface_config,
            offscreen,
            scene,
            postprocess,
            profiler,
            clock,
            camera,
            camera_enabled: false,
        })
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn camera_enabled(&self) -> bool {
        self.camera_enabled
    }

    fn toggle_camera_mode(&mut self) {
        self.camera_enabled = !self.camera_enabled;
        // Cursor exclusivity and visibility flip together with the mode.
        self.window.set_cursor_visible(!self.camera_enabled);
        if self.camera_enabled {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(err) = grabbed {
                log::warn!("Cursor grab unavailable: {err}");
            }
        } else {
            let _ = self.window.set_cursor_grab(CursorGrabMode::None);
            self.camera.reset_movement();
        }
    }

    fn toggle_playback(&mut self) {
        // The scene reads the clock, so pausing audio freezes the show too.
        if self.clock.is_playing() {
            self.clock.pause();
        } else {
            self.clock.play();
        }
    }
}

impl FrameDriver for FrameOrchestrator {
    fn on_render(&mut self, frame_delta_seconds: f32) -> Result<(), wgpu::SurfaceError> {
        self.camera.update(frame_delta_seconds);

        // The sole time source for animation.
        let time = self.clock.current_time();

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.ctx.device, &self.surface_config);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let screen_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        if let Some(profiler) = &self.profiler {
            profiler.begin_frame(&mut encoder);
        }

        // Offscreen pass: clear, depth + cull on, scene at playback time.
        self.scene
            .render(&mut encoder, &self.offscreen, &self.camera, time);

        // Active post-processing configuration over the offscreen color.
        let filtered = self.postprocess.apply(&mut encoder, &self.offscreen);

        // Composite to screen: offscreen color on slot 0, filtered on 1.
        self.postprocess.combine(
            &mut encoder,
            self.offscreen.view(),
            filtered.view(),
            &screen_view,
        );

        if let Some(profiler) = &mut self.profiler {
            profiler.end_frame(&mut encoder);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        if let Some(profiler) = &mut self.profiler {
            profiler.after_submit();
        }

        frame.present();
        Ok(())
    }

    fn on_key(&mut self, event: &KeyEvent) {
        if self.camera_enabled {
            self.camera.process_keyboard(event);
        }

        if event.state == ElementState::Pressed && !event.repeat {
            match event.physical_key {
                PhysicalKey::Code(KeyCode::KeyC) => self.toggle_camera_mode(),
                PhysicalKey::Code(KeyCode::Space) => self.toggle_playback(),
                _ => {}
            }
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.ctx.device, &self.surface_config);
        self.camera.set_aspect(width as f32 / height as f32);
        // Offscreen and post-process targets keep their creation size; the
        // composite pass samples them across the new surface.
    }

    fn on_mouse_move(&mut self, dx: f32, dy: f32) {
        if self.camera_enabled {
            self.camera.rotate(-dx, -dy);
        }
    }
}
