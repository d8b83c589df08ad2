use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;

use crate::backdrop::{FrameTarget, RenderError};
use crate::compile::fragment_source;
use crate::types::{AdapterProfile, SurfaceSize};
use crate::uniforms::ShaderUniforms;

use super::context::GpuContext;
use super::pipeline::{BlitPipeline, BlobPipeline};
use super::uniforms::BlobUniforms;

/// Density-1 colour target the blob pass renders into before the upscale.
struct OffscreenFrame {
    size: SurfaceSize,
    view: wgpu::TextureView,
    blit_bind_group: wgpu::BindGroup,
}

impl OffscreenFrame {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        blit: &BlitPipeline,
        size: SurfaceSize,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("blob offscreen frame"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let blit_bind_group = blit.bind(device, &view);
        Self {
            size,
            view,
            blit_bind_group,
        }
    }
}

/// Live GPU target: surface, blob and blit pipelines, the density-1
/// offscreen frame, and the uniform buffer the blob pass reads.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: BlobPipeline,
    blit: BlitPipeline,
    offscreen: OffscreenFrame,
    scale_factor: f64,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    frame_count: u64,
    last_fps_update: Instant,
    frames_since_last_update: u32,
}

impl GpuState {
    pub(crate) fn new<W>(
        window: Arc<W>,
        initial_size: SurfaceSize,
        scale_factor: f64,
    ) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle + Send + Sync + 'static,
    {
        let context = GpuContext::new(window, initial_size)?;
        let format = context.surface_format;
        let pipeline = BlobPipeline::new(&context.device, format, &fragment_source())?;
        let blit = BlitPipeline::new(&context.device, format)?;
        let offscreen = OffscreenFrame::new(
            &context.device,
            format,
            &blit,
            context.size.at_unit_density(scale_factor),
        );
        debug!(
            surface = %context.size,
            render = %offscreen.size,
            scale_factor,
            "GPU frame target sized"
        );

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("blob uniform buffer"),
            size: std::mem::size_of::<BlobUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("blob uniform bind group"),
                layout: &pipeline.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        Ok(Self {
            context,
            pipeline,
            blit,
            offscreen,
            scale_factor,
            uniform_buffer,
            uniform_bind_group,
            frame_count: 0,
            last_fps_update: Instant::now(),
            frames_since_last_update: 0,
        })
    }

    pub(crate) fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    /// Rebuilds the offscreen frame when the density-1 size has changed.
    fn sync_offscreen(&mut self) {
        let size = self.context.size.at_unit_density(self.scale_factor);
        if size == self.offscreen.size {
            return;
        }
        debug!(surface = %self.context.size, render = %size, "resizing offscreen frame");
        self.offscreen = OffscreenFrame::new(
            &self.context.device,
            self.context.surface_format,
            &self.blit,
            size,
        );
    }

    fn record_frame(&mut self, uniforms: &ShaderUniforms) {
        self.frame_count += 1;
        self.frames_since_last_update += 1;
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_fps_update);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_last_update as f32 / elapsed.as_secs_f32();
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
            debug!(
                fps = fps.round(),
                frame_count = self.frame_count,
                time = uniforms.elapsed_time,
                "render stats"
            );
        }
    }
}

impl FrameTarget for GpuState {
    fn size(&self) -> SurfaceSize {
        self.context.size
    }

    fn render_size(&self) -> SurfaceSize {
        self.offscreen.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.context.resize(size);
        self.sync_offscreen();
    }

    fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
        self.sync_offscreen();
    }

    fn draw(&mut self, uniforms: &ShaderUniforms) -> Result<(), RenderError> {
        let frame = self.context.surface.get_current_texture()?;

        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&BlobUniforms::from(uniforms)),
        );

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("blob encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blob pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.blit.pipeline);
            pass.set_bind_group(0, &self.offscreen.blit_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.record_frame(uniforms);
        Ok(())
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        debug!(frames = self.frame_count, "releasing GPU resources");
    }
}
