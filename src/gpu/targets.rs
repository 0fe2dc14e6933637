//! Frame target management for offscreen rendering and post-processing.

use wgpu::{Device, Texture, TextureFormat, TextureUsages, TextureView};

/// Depth format shared by every depth-bearing target.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Number of mip levels for a `width` x `height` texture, capped at
/// `max_level` (the cap is a level index, so the count is `max_level + 1`).
///
/// Textures smaller than the cap simply get the full chain they can hold; a
/// 1x1 texture has exactly one level.
pub fn mip_level_count_for(width: u32, height: u32, max_level: u32) -> u32 {
    let largest = width.max(height).max(1);
    let full_chain = 32 - largest.leading_zeros();
    full_chain.min(max_level + 1)
}

/// A render target owning a color texture, its views, and an optional depth
/// attachment. The texture must outlive its views, so they live together.
///
/// Targets are created at a fixed resolution and never resized.
pub struct FrameTarget {
    texture: Texture,
    view: TextureView,
    mip_views: Vec<TextureView>,
    depth_view: Option<TextureView>,
    width: u32,
    height: u32,
}

impl FrameTarget {
    fn create(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        mip_level_count: u32,
        with_depth: bool,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC
                | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_views = (0..mip_level_count)
            .map(|level| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let depth_view = with_depth.then(|| {
            let depth = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            depth.create_view(&wgpu::TextureViewDescriptor::default())
        });

        Self {
            texture,
            view,
            mip_views,
            depth_view,
            width,
            height,
        }
    }

    /// Target for scene rendering: depth attachment plus a mip chain so the
    /// interpolation filter can consume the color texture directly.
    pub fn for_scene(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        max_mip_level: u32,
    ) -> Self {
        let mips = mip_level_count_for(width, height, max_mip_level);
        Self::create(device, label, width, height, format, mips, true)
    }

    /// Target for a post-processing pass: mip chain, no depth.
    pub fn for_filter(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        max_mip_level: u32,
    ) -> Self {
        let mips = mip_level_count_for(width, height, max_mip_level);
        Self::create(device, label, width, height, format, mips, false)
    }

    /// View over the whole mip chain, for sampling.
    pub fn view(&self) -> &TextureView {
        &self.view
    }

    /// Render/sample view restricted to a single mip level.
    pub fn mip_view(&self, level: u32) -> &TextureView {
        &self.mip_views[level as usize]
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_views.len() as u32
    }

    pub fn depth_view(&self) -> Option<&TextureView> {
        self.depth_view.as_ref()
    }

    /// Get the underlying texture (for copy operations).
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Readback buffer for copying GPU texture data to CPU. Test-and-tooling
/// path only; the render loop never maps buffers.
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row_bytes: u32,
    unpadded_row_bytes: u32,
}

impl ReadbackBuffer {
    /// Create a new readback buffer sized for the given dimensions.
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let bytes_per_pixel = 4u32;
        let unpadded_row_bytes = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row_bytes = unpadded_row_bytes.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: (padded_row_bytes * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            width,
            height,
            padded_row_bytes,
            unpadded_row_bytes,
        }
    }

    /// Get the underlying buffer.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Get the padded bytes per row (for texture copy).
    pub fn padded_row_bytes(&self) -> u32 {
        self.padded_row_bytes
    }

    /// Read pixels from the mapped buffer, removing row padding. Blocks
    /// until the copy completes.
    pub fn read_pixels(&self, device: &wgpu::Device) -> Vec<u8> {
        let buffer_slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).unwrap();
        });
        device.poll(wgpu::PollType::wait_indefinitely()).unwrap();
        receiver.recv().unwrap().unwrap();

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((self.width * self.height * 4) as usize);
        for row in 0..self.height {
            let start = (row * self.padded_row_bytes) as usize;
            let end = start + self.unpadded_row_bytes as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        self.buffer.unmap();
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RenderContext;

    #[test]
    fn test_mip_level_count_caps_at_max_level() {
        // 1920x1080: full chain is 11 levels, the cap allows all of them.
        assert_eq!(mip_level_count_for(1920, 1080, 10), 11);
        // 4096 wide would have 13, the cap trims it.
        assert_eq!(mip_level_count_for(4096, 4096, 10), 11);
    }

    #[test]
    fn test_mip_level_count_terminates_early_for_small_textures() {
        assert_eq!(mip_level_count_for(1, 1, 10), 1);
        assert_eq!(mip_level_count_for(2, 2, 10), 2);
        assert_eq!(mip_level_count_for(256, 256, 10), 9);
        assert_eq!(mip_level_count_for(256, 1, 10), 9);
    }

    #[tokio::test]
    async fn test_frame_target_creation() {
        let ctx = match RenderContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let target = FrameTarget::for_scene(
            &ctx.device,
            "test",
            256,
            256,
            TextureFormat::Rgba8Unorm,
            10,
        );
        assert_eq!(target.mip_level_count(), 9);
        assert!(target.depth_view().is_some());

        let filter = FrameTarget::for_filter(
            &ctx.device,
            "test_filter",
            256,
            256,
            TextureFormat::Rgba8Unorm,
            10,
        );
        assert!(filter.depth_view().is_none());
    }

    #[tokio::test]
    async fn test_readback_buffer_creation() {
        let ctx = match RenderContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let buffer = ReadbackBuffer::new(&ctx.device, 256, 256);
        assert!(buffer.padded_row_bytes() >= 256 * 4);
    }
}
