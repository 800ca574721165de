//! GBuffer + indirect gather pass
//!
//! Rasterizes the scene from the camera. Every covered pixel writes its
//! normal and albedo, tests itself against the RSM depth for direct shadow,
//! and gathers one bounce of indirect light from the RSM with the rotated
//! sample kernel. The indirect target holds radiance in RGB and the shadow
//! factor in alpha.

use super::{clear_color, clear_depth, texture_entry, uniform_entry, UNFILTERABLE};
use crate::config::{GatherSettings, LightView};
use crate::graph::{FrameState, PassContext, PassResourceBuilder, RenderPass, SetupContext};
use crate::pipeline::{PipelineDescriptor, PipelineVariant, ShaderDefine};
use crate::resources::{
    FrameConstants, DEPTH_FORMAT, GBUFFER_ALBEDO, GBUFFER_ALBEDO_FORMAT, GBUFFER_DEPTH, GBUFFER_INDIRECT,
    GBUFFER_INDIRECT_FORMAT, GBUFFER_NORMAL, GBUFFER_NORMAL_FORMAT, RSM_DEPTH, RSM_FLUX, RSM_NORMAL,
    RSM_POSITION,
};
use crate::{Error, Result};
use glam::Mat4;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Gather uniform, must match `GatherParams` in gbuffer.wgsl (96 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GatherParams {
    light_view_proj: Mat4,
    sample_radius: f32,
    intensity: f32,
    distance_epsilon: f32,
    shadow_bias: f32,
    sample_count: u32,
    _pad0: u32,
    rsm_size: [u32; 2],
}

/// Gather bind group layout: params, kernel, noise, the three RSM color
/// targets, then RSM depth with its comparison sampler.
fn gather_layout_entries() -> [wgpu::BindGroupLayoutEntry; 8] {
    [
        uniform_entry(0),
        uniform_entry(1),
        uniform_entry(2),
        texture_entry(3, UNFILTERABLE),
        texture_entry(4, UNFILTERABLE),
        texture_entry(5, UNFILTERABLE),
        texture_entry(6, wgpu::TextureSampleType::Depth),
        wgpu::BindGroupLayoutEntry {
            binding: 7,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
            count: None,
        },
    ]
}

struct GBufferResources {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_group: wgpu::BindGroup,
    _shadow_sampler: wgpu::Sampler,
    _params: wgpu::Buffer,
    _kernel: wgpu::Buffer,
    _noise: wgpu::Buffer,
}

pub struct GBufferPass {
    light: LightView,
    settings: GatherSettings,
    resources: Option<GBufferResources>,
}

impl GBufferPass {
    pub fn new(light: LightView, settings: GatherSettings) -> Self {
        Self { light, settings, resources: None }
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &str {
        "gbuffer"
    }

    fn stage(&self) -> FrameState {
        FrameState::GBuffer
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(RSM_POSITION)
            .read(RSM_NORMAL)
            .read(RSM_FLUX)
            .read(RSM_DEPTH)
            .write(GBUFFER_NORMAL)
            .write(GBUFFER_INDIRECT)
            .write(GBUFFER_ALBEDO)
            .write_depth(GBUFFER_DEPTH);
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let rsm_size = ctx.targets.get(RSM_POSITION)?.size();
        let params = GatherParams {
            light_view_proj: self.light.view_proj(),
            sample_radius: self.settings.sample_radius,
            intensity: self.settings.intensity,
            distance_epsilon: self.settings.distance_epsilon,
            shadow_bias: self.settings.shadow_bias,
            sample_count: self.settings.sample_count.min(ctx.kernel.len() as u32),
            _pad0: 0,
            rsm_size: [rsm_size.0, rsm_size.1],
        };
        log::debug!(
            "GBuffer gather: {} samples, radius {}, RSM {}x{}",
            params.sample_count,
            params.sample_radius,
            rsm_size.0,
            rsm_size.1
        );

        let params_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Gather Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let kernel_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Gather Kernel"),
            contents: bytemuck::cast_slice(&ctx.kernel.to_gpu()),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let noise_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Gather Noise"),
            contents: bytemuck::cast_slice(&ctx.noise.to_gpu()),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // Nearest + LessEqual: 1.0 when the biased depth is not behind the stored one
        let shadow_sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("RSM Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Gather Layout"),
            entries: &gather_layout_entries(),
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Gather Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: kernel_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: noise_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(RSM_POSITION)?),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(RSM_NORMAL)?),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(RSM_FLUX)?),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(ctx.targets.view(RSM_DEPTH)?),
                },
                wgpu::BindGroupEntry { binding: 7, resource: wgpu::BindingResource::Sampler(&shadow_sampler) },
            ],
        });

        let pipeline = ctx.pipelines.get_or_create(&PipelineDescriptor {
            shader_id: "gbuffer",
            source: include_str!("../../shaders/passes/gbuffer.wgsl"),
            defines: &[
                ("KERNEL_SIZE", ShaderDefine::U32(ctx.kernel.len() as u32)),
                ("NOISE_SIZE", ShaderDefine::U32(ctx.noise.vectors().len() as u32)),
            ],
            variant: PipelineVariant::Mesh { cull_mode: Some(wgpu::Face::Back) },
            bind_group_layouts: &[ctx.uniforms.layout(), &layout],
            color_targets: &[GBUFFER_NORMAL_FORMAT, GBUFFER_INDIRECT_FORMAT, GBUFFER_ALBEDO_FORMAT],
            depth_format: Some(DEPTH_FORMAT),
        })?;

        self.resources = Some(GBufferResources {
            pipeline,
            bind_group,
            _shadow_sampler: shadow_sampler,
            _params: params_buffer,
            _kernel: kernel_buffer,
            _noise: noise_buffer,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext) -> Result<()> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| Error::Pipeline("gbuffer pass executed before setup".into()))?;

        let view = ctx.frame.camera_view;
        let projection = ctx.frame.camera_projection;
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
                    tint: object.albedo.extend(1.0),
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        ctx.uniforms.flush(ctx.queue);

        let targets = ctx.targets;
        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GBuffer Pass"),
            color_attachments: &[
                clear_color(targets.view(GBUFFER_NORMAL)?),
                clear_color(targets.view(GBUFFER_INDIRECT)?),
                clear_color(targets.view(GBUFFER_ALBEDO)?),
            ],
            depth_stencil_attachment: Some(clear_depth(targets.view(GBUFFER_DEPTH)?)),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&resources.pipeline);
        pass.set_bind_group(1, &resources.bind_group, &[]);
        for (object, offset) in ctx.frame.objects.iter().zip(offsets) {
            pass.set_bind_group(0, ctx.uniforms.bind_group(), &[offset]);
            object.mesh.draw(&mut pass);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_params_match_shader_layout() {
        assert_eq!(std::mem::size_of::<GatherParams>(), 96);
    }

    #[test]
    fn rsm_depth_is_bound_for_comparison_sampling() {
        let entries = gather_layout_entries();
        assert!(matches!(
            entries[6].ty,
            wgpu::BindingType::Texture { sample_type: wgpu::TextureSampleType::Depth, .. }
        ));
        assert_eq!(entries[7].binding, 7);
        assert!(matches!(
            entries[7].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        ));
    }

    #[test]
    fn shadow_test_reads_depth_through_the_comparison_sampler() {
        // GLSL backends cannot translate a textureLoad from a depth texture
        let source = include_str!("../../shaders/passes/gbuffer.wgsl");
        assert!(source.contains("var rsm_shadow_sampler: sampler_comparison;"));
        assert!(source.contains("textureSampleCompareLevel(rsm_depth, rsm_shadow_sampler"));
        assert!(!source.contains("textureLoad(rsm_depth"));
    }
}
