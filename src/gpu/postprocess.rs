//! Post-processing pipeline.
//!
//! Two configurations implement the same `apply` contract:
//! 1. Blur chain: copy -> vertical blur -> horizontal blur -> vertical blur,
//!    each blur consuming the mip chain of its input.
//! 2. Interpolation filter: build mips on the offscreen color texture, then
//!    one pass samples across the levels.
//!
//! Every pass clears its target before writing; nothing accumulates across
//! frames.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wgpu::{
    BindGroupLayout, Device, RenderPipeline, Sampler, ShaderModule, TextureFormat, TextureView,
};

use super::mipmap::MipmapGenerator;
use super::targets::FrameTarget;

/// Highest mip level the filters consume. Chains on small textures
/// terminate earlier; shaders clamp their level reads.
pub const MAX_MIP_LEVEL: u32 = 10;

/// Which post-processing configuration is active. Chosen at startup; there
/// is no runtime fallback between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    BlurChain,
    InterpolationFilter,
}

impl Default for FilterMode {
    fn default() -> Self {
        Self::InterpolationFilter
    }
}

/// Post-processing pipeline over fixed-resolution frame targets.
pub struct PostProcessPipeline {
    device: Arc<Device>,

    // Pipelines, one per shader program
    copy_pipeline: RenderPipeline,
    blur_h_pipeline: RenderPipeline,
    blur_v_pipeline: RenderPipeline,
    interpolation_pipeline: RenderPipeline,
    combine_pipeline: RenderPipeline,

    // Bind group layouts
    filter_bind_group_layout: BindGroupLayout,
    combine_bind_group_layout: BindGroupLayout,

    sampler: Sampler,
    mipmaps: MipmapGenerator,

    // Ping-pong targets for the blur chain
    blur_ping: FrameTarget,
    blur_pong: FrameTarget,
    // Output of the interpolation filter
    filter_target: FrameTarget,

    mode: FilterMode,
}

impl PostProcessPipeline {
    /// Create the pipeline with targets sized to the offscreen resolution.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        color_format: TextureFormat,
        surface_format: TextureFormat,
        mode: FilterMode,
    ) -> Self {
        let copy_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("copy_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/copy.wgsl").into()),
        });
        let blur_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blur.wgsl").into()),
        });
        let interpolation_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("interpolation_filter_shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("shaders/interpolation_filter.wgsl").into(),
            ),
        });
        let combine_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("combine_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/combine.wgsl").into()),
        });

        // Filter passes read one texture
        let filter_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("filter_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        // The combine pass reads two: slot 0 scene color, slot 1 filtered
        let combine_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("combine_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let filter_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("filter_pipeline_layout"),
                bind_group_layouts: &[&filter_bind_group_layout],
                immediate_size: 0,
            });
        let combine_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("combine_pipeline_layout"),
                bind_group_layouts: &[&combine_bind_group_layout],
                immediate_size: 0,
            });

        let fullscreen = |label: &str,
                          layout: &wgpu::PipelineLayout,
                          module: &ShaderModule,
                          fs_entry: &str,
                          format: TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(fs_entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        };

        let copy_pipeline = fullscreen(
            "copy_pipeline",
            &filter_pipeline_layout,
            &copy_shader,
            "fs_main",
            color_format,
        );
        let blur_h_pipeline = fullscreen(
            "blur_h_pipeline",
            &filter_pipeline_layout,
            &blur_shader,
            "fs_horizontal",
            color_format,
        );
        let blur_v_pipeline = fullscreen(
            "blur_v_pipeline",
            &filter_pipeline_layout,
            &blur_shader,
            "fs_vertical",
            color_format,
        );
        let interpolation_pipeline = fullscreen(
            "interpolation_filter_pipeline",
            &filter_pipeline_layout,
            &interpolation_shader,
            "fs_main",
            color_format,
        );
        let combine_pipeline = fullscreen(
            "combine_pipeline",
            &combine_pipeline_layout,
            &combine_shader,
            "fs_main",
            surface_format,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("postprocess_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let blur_ping =
            FrameTarget::for_filter(&device, "blur_ping", width, height, color_format, MAX_MIP_LEVEL);
        let blur_pong =
            FrameTarget::for_filter(&device, "blur_pong", width, height, color_format, MAX_MIP_LEVEL);
        let filter_target = FrameTarget::for_filter(
            &device,
            "interpolation_filter_target",
            width,
            height,
            color_format,
            MAX_MIP_LEVEL,
        );

        let mipmaps = MipmapGenerator::new(device.clone(), color_format);

        Self {
            device,
            copy_pipeline,
            blur_h_pipeline,
            blur_v_pipeline,
            interpolation_pipeline,
            combine_pipeline,
            filter_bind_group_layout,
            combine_bind_group_layout,
            sampler,
            mipmaps,
            blur_ping,
            blur_pong,
            filter_target,
            mode,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Run the active configuration over the scene color texture and return
    /// the target holding the filtered result.
    pub fn apply<'a>(
        &'a self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &FrameTarget,
    ) -> &'a FrameTarget {
        match self.mode {
            FilterMode::BlurChain => self.apply_blur_chain(encoder, scene),
            FilterMode::InterpolationFilter => self.apply_interpolation_filter(encoder, scene),
        }
    }

    fn apply_blur_chain<'a>(
        &'a self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &FrameTarget,
    ) -> &'a FrameTarget {
        self.filter_pass(encoder, &self.copy_pipeline, scene.view(), &self.blur_ping);
        self.mipmaps.generate(encoder, &self.blur_ping);

        self.filter_pass(
            encoder,
            &self.blur_v_pipeline,
            self.blur_ping.view(),
            &self.blur_pong,
        );
        self.mipmaps.generate(encoder, &self.blur_pong);

        self.filter_pass(
            encoder,
            &self.blur_h_pipeline,
            self.blur_pong.view(),
            &self.blur_ping,
        );
        self.mipmaps.generate(encoder, &self.blur_ping);

        self.filter_pass(
            encoder,
            &self.blur_v_pipeline,
            self.blur_ping.view(),
            &self.blur_pong,
        );
        &self.blur_pong
    }

    fn apply_interpolation_filter<'a>(
        &'a self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &FrameTarget,
    ) -> &'a FrameTarget {
        // Mips on the scene texture are rebuilt after the scene pass wrote
        // level 0 and before the filter pass reads the chain.
        self.mipmaps.generate(encoder, scene);
        self.filter_pass(
            encoder,
            &self.interpolation_pipeline,
            scene.view(),
            &self.filter_target,
        );
        &self.filter_target
    }

    /// One fullscreen pass: clear the output, sample `input`, write mip 0.
    fn filter_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &RenderPipeline,
        input: &TextureView,
        output: &FrameTarget,
    ) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter_bind_group"),
            layout: &self.filter_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("filter_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output.mip_view(0),
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Composite the direct scene color (slot 0) and the filtered result
    /// (slot 1) onto `output` (the screen). The slot assignment is part of
    /// the contract with the frame orchestrator.
    pub fn combine(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene_view: &TextureView,
        filtered_view: &TextureView,
        output: &TextureView,
    ) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("combine_bind_group"),
            layout: &self.combine_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(filtered_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("combine_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.combine_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{ReadbackBuffer, RenderContext};

    #[tokio::test]
    async fn test_postprocess_pipeline_creation() {
        let ctx = match RenderContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => {
                eprintln!("Skipping test - GPU not available");
                return;
            }
        };

        let _pipeline = PostProcessPipeline::new(
            ctx.device.clone(),
            256,
            256,
            TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            FilterMode::BlurChain,
        );
    }

    #[tokio::test]
    async fn test_interpolation_filter_is_identity_on_1x1() {
        let ctx = match RenderContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => {
                eprintln!("Skipping test - GPU not available");
                return;
            }
        };

        let pipeline = PostProcessPipeline::new(
            ctx.device.clone(),
            1,
            1,
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8Unorm,
            FilterMode::InterpolationFilter,
        );

        // A 1x1 source has a degenerate mip chain; the filter cannot blend
        // anything and must pass the color through.
        let scene = FrameTarget::for_scene(
            &ctx.device,
            "solid_scene",
            1,
            1,
            TextureFormat::Rgba8Unorm,
            MAX_MIP_LEVEL,
        );
        assert_eq!(scene.mip_level_count(), 1);

        let color = [10u8, 200, 30, 255];
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: scene.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &color,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("identity_test_encoder"),
            });
        let filtered = pipeline.apply(&mut encoder, &scene);

        let readback = ReadbackBuffer::new(&ctx.device, 1, 1);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: filtered.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: readback.buffer(),
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(readback.padded_row_bytes()),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let pixels = readback.read_pixels(&ctx.device);
        for (got, expected) in pixels.iter().zip(color.iter()) {
            assert!(
                (*got as i32 - *expected as i32).abs() <= 1,
                "filter output {:?} differs from input {:?}",
                pixels,
                color
            );
        }
    }
}
