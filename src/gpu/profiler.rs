//! GPU frame timing via timestamp queries.
//!
//! A query pair brackets the whole frame body. The result is read back
//! without ever blocking: the staging buffer is mapped asynchronously and
//! polled once per frame; a sample that is not ready yet is simply skipped.

use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;

use wgpu::{Buffer, Device, QuerySet};

use super::context::RenderContext;

/// Frames between averaged profiling readouts.
pub const REPORT_INTERVAL: u32 = 60;

const TIMESTAMP_COUNT: u32 = 2;
const TIMESTAMP_BYTES: u64 = TIMESTAMP_COUNT as u64 * 8;

/// Running sum of elapsed GPU time, reported and reset every
/// [`REPORT_INTERVAL`] samples.
#[derive(Debug, Default)]
pub struct GpuTimingAccumulator {
    total_ms: f64,
    samples: u32,
}

impl GpuTimingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample. Returns the average when the report interval is
    /// reached, resetting the accumulator.
    pub fn record(&mut self, elapsed_ms: f64) -> Option<f64> {
        self.total_ms += elapsed_ms;
        self.samples += 1;
        if self.samples >= REPORT_INTERVAL {
            let average = self.total_ms / self.samples as f64;
            self.total_ms = 0.0;
            self.samples = 0;
            Some(average)
        } else {
            None
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.samples
    }
}

/// Per-frame GPU timer. `None` when the adapter lacks timestamp support.
pub struct FrameProfiler {
    device: Arc<Device>,
    query_set: QuerySet,
    resolve_buffer: Buffer,
    staging_buffer: Buffer,
    map_receiver: Option<Receiver<Result<(), wgpu::BufferAsyncError>>>,
    armed: bool,
    period_ns: f32,
    accumulator: GpuTimingAccumulator,
}

impl FrameProfiler {
    pub fn new(ctx: &RenderContext) -> Option<Self> {
        if !ctx.supports_frame_timestamps() {
            log::info!("GPU timestamp queries unavailable, frame profiling disabled");
            return None;
        }

        let query_set = ctx.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("frame_timing_queries"),
            ty: wgpu::QueryType::Timestamp,
            count: TIMESTAMP_COUNT,
        });

        let resolve_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_timing_resolve"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_timing_staging"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Some(Self {
            device: ctx.device.clone(),
            query_set,
            resolve_buffer,
            staging_buffer,
            map_receiver: None,
            armed: false,
            period_ns: ctx.queue.get_timestamp_period(),
            accumulator: GpuTimingAccumulator::new(),
        })
    }

    /// Write the opening timestamp. Call before encoding the frame body.
    pub fn begin_frame(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.write_timestamp(&self.query_set, 0);
    }

    /// Write the closing timestamp and, when the staging buffer is free,
    /// schedule the resolve. A readback still in flight means this frame's
    /// sample is dropped rather than waited for.
    pub fn end_frame(&mut self, encoder: &mut wgpu::CommandEncoder) {
        encoder.write_timestamp(&self.query_set, 1);
        if self.map_receiver.is_none() {
            encoder.resolve_query_set(&self.query_set, 0..TIMESTAMP_COUNT, &self.resolve_buffer, 0);
            encoder.copy_buffer_to_buffer(
                &self.resolve_buffer,
                0,
                &self.staging_buffer,
                0,
                TIMESTAMP_BYTES,
            );
            self.armed = true;
        }
    }

    /// Collect any finished sample. Never blocks: the device is polled in
    /// non-waiting mode and an unready mapping is left for a later frame.
    pub fn after_submit(&mut self) {
        if self.armed {
            let (sender, receiver) = channel();
            self.staging_buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    let _ = sender.send(result);
                });
            self.map_receiver = Some(receiver);
            self.armed = false;
        }

        let _ = self.device.poll(wgpu::PollType::Poll);

        let Some(receiver) = &self.map_receiver else {
            return;
        };
        match receiver.try_recv() {
            Ok(Ok(())) => {
                let elapsed_ms = {
                    let data = self.staging_buffer.slice(..).get_mapped_range();
                    let begin: u64 = bytemuck::pod_read_unaligned(&data[0..8]);
                    let end: u64 = bytemuck::pod_read_unaligned(&data[8..16]);
                    end.saturating_sub(begin) as f64 * self.period_ns as f64 / 1e6
                };
                self.staging_buffer.unmap();
                self.map_receiver = None;

                if let Some(average) = self.accumulator.record(elapsed_ms) {
                    log::info!("GPU frame average: {:.4} ms", average);
                }
            }
            Ok(Err(_)) | Err(TryRecvError::Disconnected) => {
                // Mapping failed; drop the sample and free the slot.
                self.map_receiver = None;
            }
            Err(TryRecvError::Empty) => {
                // Query not resolved yet; skip this frame's sample.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_reports_every_interval() {
        let mut acc = GpuTimingAccumulator::new();
        for _ in 0..REPORT_INTERVAL - 1 {
            assert_eq!(acc.record(2.0), None);
        }
        let avg = acc.record(2.0).expect("report on the 60th sample");
        assert!((avg - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_accumulator_resets_after_report() {
        let mut acc = GpuTimingAccumulator::new();
        for _ in 0..REPORT_INTERVAL {
            acc.record(4.0);
        }
        assert_eq!(acc.sample_count(), 0);
        // The next interval averages only its own samples.
        for _ in 0..REPORT_INTERVAL - 1 {
            assert_eq!(acc.record(1.0), None);
        }
        let avg = acc.record(1.0).expect("second report");
        assert!((avg - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_profiler_never_blocks_on_unready_queries() {
        let ctx = match crate::gpu::RenderContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };
        let Some(mut profiler) = FrameProfiler::new(&ctx) else {
            return;
        };

        // Several empty frames in a row; after_submit must return whether or
        // not the query has resolved.
        for _ in 0..3 {
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("profiler_test_encoder"),
                });
            profiler.begin_frame(&mut encoder);
            profiler.end_frame(&mut encoder);
            ctx.queue.submit(std::iter::once(encoder.finish()));
            profiler.after_submit();
        }
    }
}
