//! Reflective shadow map pass
//!
//! Rasterizes every object from the static light into three parallel color
//! targets (world position, normal, flux) plus depth. Both windings are
//! rasterized; the gather pass does not rely on culling.

use super::{clear_color, clear_depth};
use crate::config::LightView;
use crate::graph::{FrameState, PassContext, PassResourceBuilder, RenderPass, SetupContext};
use crate::pipeline::{PipelineDescriptor, PipelineVariant};
use crate::resources::{
    FrameConstants, DEPTH_FORMAT, RSM_DEPTH, RSM_FLUX, RSM_FLUX_FORMAT, RSM_NORMAL, RSM_NORMAL_FORMAT,
    RSM_POSITION, RSM_POSITION_FORMAT,
};
use crate::{Error, Result};
use std::sync::Arc;

pub struct RsmPass {
    light: LightView,
    pipeline: Option<Arc<wgpu::RenderPipeline>>,
}

impl RsmPass {
    pub fn new(light: LightView) -> Self {
        Self { light, pipeline: None }
    }
}

impl RenderPass for RsmPass {
    fn name(&self) -> &str {
        "rsm"
    }

    fn stage(&self) -> FrameState {
        FrameState::Rsm
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .write(RSM_POSITION)
            .write(RSM_NORMAL)
            .write(RSM_FLUX)
            .write_depth(RSM_DEPTH);
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let pipeline = ctx.pipelines.get_or_create(&PipelineDescriptor {
            shader_id: "rsm",
            source: include_str!("../../shaders/passes/rsm.wgsl"),
            defines: &[],
            variant: PipelineVariant::Mesh { cull_mode: None },
            bind_group_layouts: &[ctx.uniforms.layout()],
            color_targets: &[RSM_POSITION_FORMAT, RSM_NORMAL_FORMAT, RSM_FLUX_FORMAT],
            depth_format: Some(DEPTH_FORMAT),
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| Error::Pipeline("rsm pass executed before setup".into()))?;

        let view = self.light.view();
        let projection = self.light.projection();
        let offsets = ctx
            .frame
            .objects
            .iter()
            .map(|object| {
                ctx.uniforms.push(&FrameConstants {
                    model: object.model,
                    view,
                    projection,
                    normal_matrix: object.normal_matrix(),
                    tint: (object.albedo * self.light.color).extend(1.0),
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        ctx.uniforms.flush(ctx.queue);

        let targets = ctx.targets;
        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("RSM Pass"),
            color_attachments: &[
                clear_color(targets.view(RSM_POSITION)?),
                clear_color(targets.view(RSM_NORMAL)?),
                clear_color(targets.view(RSM_FLUX)?),
            ],
            depth_stencil_attachment: Some(clear_depth(targets.view(RSM_DEPTH)?)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(pipeline);
        for (object, offset) in ctx.frame.objects.iter().zip(offsets) {
            pass.set_bind_group(0, ctx.uniforms.bind_group(), &[offset]);
            object.mesh.draw(&mut pass);
        }

        Ok(())
    }
}
