//! Scene rendering.
//!
//! The renderer owns the static stage layout and the beatmap track. Each
//! frame it samples [`SceneState`] at the playback time handed to it and
//! draws the stage as instanced emissive boxes into the caller's frame
//! target. Depth test and back-face culling are baked into the pipeline;
//! no global GPU state is touched.

pub mod layout;
pub mod state;

use std::sync::Arc;

use wgpu::{BindGroup, Buffer, Device, Queue, RenderPipeline, TextureFormat};

use crate::beatmap::Track;
use crate::camera::Camera;
use crate::gpu::targets::{FrameTarget, DEPTH_FORMAT};

use layout::{Fixture, LANE_WIDTH, LANE_X, LAYER_Y, TUNNEL_LENGTH};
pub use state::{GroupState, NotePulse, ObstacleState, SceneState, LIGHT_GROUP_COUNT};

const MAX_INSTANCES: usize = 256;
const CUBE_VERTEX_COUNT: u32 = 36;

/// Uniform data for the scene shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
    time: f32,
    _padding: [f32; 3],
}

/// One cube vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

/// Per-box instance data.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneInstance {
    translation: [f32; 3],
    scale: [f32; 3],
    /// rgb = emissive color, a = event-driven intensity
    color: [f32; 4],
}

/// A unit cube, six faces wound counter-clockwise from outside.
fn cube_vertices() -> Vec<SceneVertex> {
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        // +z
        (
            [0.0, 0.0, 1.0],
            [
                [-0.5, -0.5, 0.5],
                [0.5, -0.5, 0.5],
                [0.5, 0.5, 0.5],
                [-0.5, 0.5, 0.5],
            ],
        ),
        // -z
        (
            [0.0, 0.0, -1.0],
            [
                [0.5, -0.5, -0.5],
                [-0.5, -0.5, -0.5],
                [-0.5, 0.5, -0.5],
                [0.5, 0.5, -0.5],
            ],
        ),
        // +x
        (
            [1.0, 0.0, 0.0],
            [
                [0.5, -0.5, 0.5],
                [0.5, -0.5, -0.5],
                [0.5, 0.5, -0.5],
                [0.5, 0.5, 0.5],
            ],
        ),
        // -x
        (
            [-1.0, 0.0, 0.0],
            [
                [-0.5, -0.5, -0.5],
                [-0.5, -0.5, 0.5],
                [-0.5, 0.5, 0.5],
                [-0.5, 0.5, -0.5],
            ],
        ),
        // +y
        (
            [0.0, 1.0, 0.0],
            [
                [-0.5, 0.5, 0.5],
                [0.5, 0.5, 0.5],
                [0.5, 0.5, -0.5],
                [-0.5, 0.5, -0.5],
            ],
        ),
        // -y
        (
            [0.0, -1.0, 0.0],
            [
                [-0.5, -0.5, -0.5],
                [0.5, -0.5, -0.5],
                [0.5, -0.5, 0.5],
                [-0.5, -0.5, 0.5],
            ],
        ),
    ];

    let mut vertices = Vec::with_capacity(36);
    for (normal, [a, b, c, d]) in faces {
        for position in [a, b, c, a, c, d] {
            vertices.push(SceneVertex { position, normal });
        }
    }
    vertices
}

/// Renders the light show stage.
pub struct SceneRenderer {
    device: Arc<Device>,
    queue: Arc<Queue>,
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    uniform_buffer: Buffer,
    vertex_buffer: Buffer,
    instance_buffer: Buffer,
    fixtures: Vec<Fixture>,
    track: Track,
}

impl SceneRenderer {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        format: TextureFormat,
        track: Track,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../gpu/shaders/scene.wgsl").into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("scene_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SceneVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 0,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 12,
                                shader_location: 1,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SceneInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 2,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 12,
                                shader_location: 3,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 24,
                                shader_location: 4,
                                format: wgpu::VertexFormat::Float32x4,
                            },
                        ],
                    },
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cube = cube_vertices();
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_cube_vertices"),
            size: (std::mem::size_of::<SceneVertex>() * cube.len()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&cube));

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_instances"),
            size: (std::mem::size_of::<SceneInstance>() * MAX_INSTANCES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            device,
            queue,
            pipeline,
            bind_group,
            uniform_buffer,
            vertex_buffer,
            instance_buffer,
            fixtures: layout::fixtures(),
            track,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Draw the stage at `time_seconds` into `target`.
    ///
    /// `time_seconds` must come from the playback clock, never wall time:
    /// pausing playback freezes the scene, and equal times render equal
    /// frames.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &FrameTarget,
        camera: &Camera,
        time_seconds: f64,
    ) {
        let state = SceneState::sample(&self.track, time_seconds);
        let instances = self.build_instances(&state);

        let uniforms = CameraUniforms {
            view_proj: camera.view_proj().to_cols_array_2d(),
            time: time_seconds as f32,
            _padding: [0.0; 3],
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.queue
            .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));

        let depth_view = target
            .depth_view()
            .expect("scene target must carry a depth attachment");

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.mip_view(0),
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.004,
                        g: 0.004,
                        b: 0.01,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        pass.draw(0..CUBE_VERTEX_COUNT, 0..instances.len() as u32);
    }

    fn build_instances(&self, state: &SceneState) -> Vec<SceneInstance> {
        let mut instances = Vec::with_capacity(self.fixtures.len() + 16);

        let (floor_pos, floor_scale) = layout::floor();
        instances.push(SceneInstance {
            translation: floor_pos.to_array(),
            scale: floor_scale.to_array(),
            color: [0.05, 0.05, 0.08, 0.0],
        });

        for fixture in &self.fixtures {
            let group = state.groups[fixture.group as usize];
            instances.push(SceneInstance {
                translation: fixture.translation.to_array(),
                scale: fixture.scale.to_array(),
                color: [group.color[0], group.color[1], group.color[2], group.intensity],
            });
        }

        for obstacle in &state.obstacles {
            let first = obstacle.lane.min(3) as usize;
            let last = (obstacle.lane + obstacle.width.max(1) - 1).min(3) as usize;
            let x = (LANE_X[first] + LANE_X[last]) / 2.0;
            let z = -TUNNEL_LENGTH * (1.0 - obstacle.progress);
            instances.push(SceneInstance {
                translation: [x, 2.0, z],
                scale: [obstacle.width.max(1) as f32 * LANE_WIDTH, 4.0, 2.0],
                color: [0.9, 0.15, 0.2, 0.25],
            });
        }

        for note in &state.notes {
            let x = LANE_X[note.line.min(3) as usize];
            let y = LAYER_Y[note.layer.min(2) as usize];
            let side = 0.55 * note.fade();
            let color = if note.red {
                state::RED
            } else {
                state::BLUE
            };
            instances.push(SceneInstance {
                translation: [x, y, -10.0],
                scale: [side, side, side],
                color: [color[0], color[1], color[2], note.fade()],
            });
        }

        instances.truncate(MAX_INSTANCES);
        instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::{BeatEvent, EventKind};
    use crate::gpu::{RenderContext, MAX_MIP_LEVEL};

    fn test_track() -> Track {
        Track::from_events(vec![BeatEvent {
            time_seconds: 0.0,
            kind: EventKind::Light { group: 1, value: 5 },
        }])
    }

    #[test]
    fn test_cube_is_closed() {
        let cube = cube_vertices();
        assert_eq!(cube.len(), 36);
        // Every vertex sits on the unit cube surface.
        for v in &cube {
            assert!(v
                .position
                .iter()
                .any(|c| (c.abs() - 0.5).abs() < f32::EPSILON));
        }
    }

    #[tokio::test]
    async fn test_scene_render_encodes() {
        let ctx = match RenderContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let renderer = SceneRenderer::new(
            ctx.device.clone(),
            ctx.queue.clone(),
            TextureFormat::Rgba8Unorm,
            test_track(),
        );
        let target = FrameTarget::for_scene(
            &ctx.device,
            "scene_test",
            64,
            64,
            TextureFormat::Rgba8Unorm,
            MAX_MIP_LEVEL,
        );
        let camera = Camera::new(1.0);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_test_encoder"),
            });
        renderer.render(&mut encoder, &target, &camera, 0.0);
        ctx.queue.submit(std::iter::once(encoder.finish()));
    }
}
