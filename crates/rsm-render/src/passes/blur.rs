//! Separable box blur over the noisy indirect buffer
//!
//! Horizontal into the temp target, then vertical into the blurred target.
//! The source is never written, so no texture is sampled and rendered to at
//! the same time.

use super::{clear_color, texture_entry, uniform_entry, UNFILTERABLE};
use crate::graph::{FrameState, PassContext, PassResourceBuilder, RenderPass, SetupContext};
use crate::pipeline::{PipelineDescriptor, PipelineVariant};
use crate::resources::{BLUR_FORMAT, BLUR_OUTPUT, BLUR_TEMP, GBUFFER_INDIRECT};
use crate::{Error, Result};
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Must match `BlurParams` in blur.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    direction: [i32; 2],
    radius: i32,
    _pad: i32,
}

struct BlurResources {
    pipeline: Arc<wgpu::RenderPipeline>,
    horizontal: wgpu::BindGroup,
    vertical: wgpu::BindGroup,
    _params: [wgpu::Buffer; 2],
}

pub struct BlurPass {
    radius: u32,
    resources: Option<BlurResources>,
}

impl BlurPass {
    pub fn new(radius: u32) -> Self {
        Self { radius, resources: None }
    }
}

impl RenderPass for BlurPass {
    fn name(&self) -> &str {
        "blur"
    }

    fn stage(&self) -> FrameState {
        FrameState::Blur
    }

    /// The horizontal step renders `BLUR_TEMP` and the vertical step samples
    /// it inside this same pass, so it is declared write-then-read rather
    /// than as an input of any other pass.
    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(GBUFFER_INDIRECT)
            .write_then_read(BLUR_TEMP)
            .write(BLUR_OUTPUT);
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Layout"),
            entries: &[uniform_entry(0), texture_entry(1, UNFILTERABLE)],
        });

        let radius = self.radius as i32;
        let make = |label: &str, direction: [i32; 2], source: &wgpu::TextureView| {
            let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&BlurParams { direction, radius, _pad: 0 }),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(source) },
                ],
            });
            (buffer, bind_group)
        };

        let (h_buffer, horizontal) = make("Blur Horizontal", [1, 0], ctx.targets.view(GBUFFER_INDIRECT)?);
        let (v_buffer, vertical) = make("Blur Vertical", [0, 1], ctx.targets.view(BLUR_TEMP)?);

        let pipeline = ctx.pipelines.get_or_create(&PipelineDescriptor {
            shader_id: "blur",
            source: include_str!("../../shaders/passes/blur.wgsl"),
            defines: &[],
            variant: PipelineVariant::Fullscreen,
            bind_group_layouts: &[&layout],
            color_targets: &[BLUR_FORMAT],
            depth_format: None,
        })?;
        log::debug!("Blur radius {} ({} taps per axis)", self.radius, 2 * self.radius + 1);

        self.resources = Some(BlurResources {
            pipeline,
            horizontal,
            vertical,
            _params: [h_buffer, v_buffer],
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| Error::Pipeline("blur pass executed before setup".into()))?;

        let steps = [
            ("Blur Pass (horizontal)", &resources.horizontal, BLUR_TEMP),
            ("Blur Pass (vertical)", &resources.vertical, BLUR_OUTPUT),
        ];
        for (label, bind_group, target) in steps {
            let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[clear_color(ctx.targets.view(target)?)],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&resources.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        Ok(())
    }
}
