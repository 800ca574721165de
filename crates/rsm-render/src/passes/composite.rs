//! Composite pass: albedo * (direct * shadow + ambient + indirect) into the back buffer

use super::{texture_entry, uniform_entry, UNFILTERABLE};
use crate::config::{CompositeSettings, LightView};
use crate::graph::{FrameState, PassContext, PassResourceBuilder, RenderPass, SetupContext};
use crate::pipeline::{PipelineDescriptor, PipelineVariant};
use crate::resources::{BACK_BUFFER, BLUR_OUTPUT, GBUFFER_ALBEDO, GBUFFER_NORMAL};
use crate::{Error, Result};
use std::sync::Arc;

/// Must match `CompositeParams` in composite.wgsl (64 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeParams {
    light_direction: [f32; 4],
    light_color: [f32; 4],
    background: [f32; 4],
    ambient: f32,
    indirect_strength: f32,
    scale: [f32; 2],
}

struct CompositeResources {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    uploaded: Option<CompositeParams>,
}

pub struct CompositePass {
    light: LightView,
    settings: CompositeSettings,
    gbuffer_size: (u32, u32),
    resources: Option<CompositeResources>,
}

impl CompositePass {
    pub fn new(light: LightView, settings: CompositeSettings) -> Self {
        Self { light, settings, gbuffer_size: (1, 1), resources: None }
    }

    fn params(&self, output_size: (u32, u32)) -> CompositeParams {
        let gbuffer_size = self.gbuffer_size;
        CompositeParams {
            light_direction: self.light.direction().extend(0.0).to_array(),
            light_color: self.light.color.extend(1.0).to_array(),
            background: self.settings.background.extend(1.0).to_array(),
            ambient: self.settings.ambient,
            indirect_strength: self.settings.indirect_strength,
            scale: [
                gbuffer_size.0 as f32 / output_size.0.max(1) as f32,
                gbuffer_size.1 as f32 / output_size.1.max(1) as f32,
            ],
        }
    }
}

impl RenderPass for CompositePass {
    fn name(&self) -> &str {
        "composite"
    }

    fn stage(&self) -> FrameState {
        FrameState::Composite
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(GBUFFER_NORMAL)
            .read(GBUFFER_ALBEDO)
            .read(BLUR_OUTPUT)
            .write(BACK_BUFFER);
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        self.gbuffer_size = ctx.targets.get(GBUFFER_ALBEDO)?.size();

        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composite Params"),
            size: std::mem::size_of::<CompositeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1, UNFILTERABLE),
                texture_entry(2, UNFILTERABLE),
                texture_entry(3, UNFILTERABLE),
            ],
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(GBUFFER_NORMAL)?),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(GBUFFER_ALBEDO)?),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(BLUR_OUTPUT)?),
                },
            ],
        });

        let pipeline = ctx.pipelines.get_or_create(&PipelineDescriptor {
            shader_id: "composite",
            source: include_str!("../../shaders/passes/composite.wgsl"),
            defines: &[],
            variant: PipelineVariant::Fullscreen,
            bind_group_layouts: &[&layout],
            color_targets: &[ctx.config.surface_format],
            depth_format: None,
        })?;

        self.resources = Some(CompositeResources {
            pipeline,
            bind_group,
            params_buffer,
            uploaded: None,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let params = self.params(ctx.frame.output_size);
        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| Error::Pipeline("composite pass executed before setup".into()))?;
        if resources.uploaded != Some(params) {
            ctx.queue.write_buffer(&resources.params_buffer, 0, bytemuck::bytes_of(&params));
            resources.uploaded = Some(params);
        }

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&resources.pipeline);
        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_shader_layout() {
        assert_eq!(std::mem::size_of::<CompositeParams>(), 64);
    }

    #[test]
    fn scale_maps_output_onto_gbuffer() {
        let mut pass = CompositePass::new(LightView::default(), CompositeSettings::default());
        pass.gbuffer_size = (960, 540);
        let params = pass.params((1920, 1080));
        assert_eq!(params.scale, [0.5, 0.5]);
        let params = pass.params((960, 540));
        assert_eq!(params.scale, [1.0, 1.0]);
    }
}
