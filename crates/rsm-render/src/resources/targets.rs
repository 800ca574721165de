//! Render targets owned by the renderer
//!
//! Every intermediate texture is created once at initialization and lives
//! until the renderer is dropped. Targets are never reallocated on resize.

use crate::config::RendererConfig;
use crate::graph::ResourceHandle;
use crate::{Error, Result};
use bitflags::bitflags;
use std::collections::HashMap;

pub const RSM_POSITION: ResourceHandle = ResourceHandle::named("rsm_position");
pub const RSM_NORMAL: ResourceHandle = ResourceHandle::named("rsm_normal");
pub const RSM_FLUX: ResourceHandle = ResourceHandle::named("rsm_flux");
pub const RSM_DEPTH: ResourceHandle = ResourceHandle::named("rsm_depth");
pub const GBUFFER_NORMAL: ResourceHandle = ResourceHandle::named("gbuffer_normal");
/// Noisy indirect radiance (RGB) + shadow factor (A)
pub const GBUFFER_INDIRECT: ResourceHandle = ResourceHandle::named("gbuffer_indirect");
pub const GBUFFER_ALBEDO: ResourceHandle = ResourceHandle::named("gbuffer_albedo");
pub const GBUFFER_DEPTH: ResourceHandle = ResourceHandle::named("gbuffer_depth");
pub const BLUR_TEMP: ResourceHandle = ResourceHandle::named("blur_temp");
pub const BLUR_OUTPUT: ResourceHandle = ResourceHandle::named("blur_output");
/// Caller-owned back buffer; not a [`RenderTarget`]
pub const BACK_BUFFER: ResourceHandle = ResourceHandle::named("back_buffer");

/// Half float keeps the target render-attachable on downlevel (GL) adapters
pub const RSM_POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const RSM_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const RSM_FLUX_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GBUFFER_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GBUFFER_INDIRECT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GBUFFER_ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const BLUR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

bitflags! {
    /// How a render target may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetUsage: u32 {
        const RENDER_TARGET = 1 << 0;
        const DEPTH         = 1 << 1;
        const SAMPLED       = 1 << 2;
    }
}

impl TargetUsage {
    pub fn to_wgpu(self) -> wgpu::TextureUsages {
        // Copy-out is always allowed so targets can be read back for inspection
        let mut usage = wgpu::TextureUsages::COPY_SRC;
        if self.intersects(TargetUsage::RENDER_TARGET | TargetUsage::DEPTH) {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.contains(TargetUsage::SAMPLED) {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        usage
    }
}

/// Size, format and usage of one render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub handle: ResourceHandle,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: TargetUsage,
}

impl TargetDesc {
    fn color(handle: ResourceHandle, (width, height): (u32, u32), format: wgpu::TextureFormat) -> Self {
        Self {
            handle,
            width,
            height,
            format,
            usage: TargetUsage::RENDER_TARGET | TargetUsage::SAMPLED,
        }
    }

    fn depth(handle: ResourceHandle, (width, height): (u32, u32)) -> Self {
        Self {
            handle,
            width,
            height,
            format: DEPTH_FORMAT,
            usage: TargetUsage::DEPTH | TargetUsage::SAMPLED,
        }
    }
}

/// A texture + default view with its creation parameters
#[derive(Debug)]
pub struct RenderTarget {
    desc: TargetDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, desc: TargetDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.handle.name()),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage.to_wgpu(),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!(
            "Created render target '{}' {}x{} {:?}",
            desc.handle.name(),
            desc.width,
            desc.height,
            desc.format
        );
        Self { desc, texture, view }
    }

    pub fn desc(&self) -> &TargetDesc {
        &self.desc
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }
}

/// All intermediate targets of the frame, keyed by graph handle
#[derive(Debug)]
pub struct FrameTargets {
    targets: HashMap<ResourceHandle, RenderTarget>,
}

impl FrameTargets {
    /// Target table for `config`: RSM targets at the RSM size, everything
    /// else at the output size.
    pub fn descriptors(config: &RendererConfig) -> Vec<TargetDesc> {
        let rsm = config.rsm_extent();
        let screen = (config.width, config.height);
        vec![
            TargetDesc::color(RSM_POSITION, rsm, RSM_POSITION_FORMAT),
            TargetDesc::color(RSM_NORMAL, rsm, RSM_NORMAL_FORMAT),
            TargetDesc::color(RSM_FLUX, rsm, RSM_FLUX_FORMAT),
            TargetDesc::depth(RSM_DEPTH, rsm),
            TargetDesc::color(GBUFFER_NORMAL, screen, GBUFFER_NORMAL_FORMAT),
            TargetDesc::color(GBUFFER_INDIRECT, screen, GBUFFER_INDIRECT_FORMAT),
            TargetDesc::color(GBUFFER_ALBEDO, screen, GBUFFER_ALBEDO_FORMAT),
            TargetDesc::depth(GBUFFER_DEPTH, screen),
            TargetDesc::color(BLUR_TEMP, screen, BLUR_FORMAT),
            TargetDesc::color(BLUR_OUTPUT, screen, BLUR_FORMAT),
        ]
    }

    pub fn new(device: &wgpu::Device, config: &RendererConfig) -> Self {
        let targets: HashMap<_, _> = Self::descriptors(config)
            .into_iter()
            .map(|desc| (desc.handle, RenderTarget::new(device, desc)))
            .collect();
        log::info!("Created {} render targets", targets.len());
        Self { targets }
    }

    pub fn get(&self, handle: ResourceHandle) -> Result<&RenderTarget> {
        self.targets
            .get(&handle)
            .ok_or_else(|| Error::Resource(format!("unknown render target '{}'", handle.name())))
    }

    pub fn view(&self, handle: ResourceHandle) -> Result<&wgpu::TextureView> {
        self.get(handle).map(RenderTarget::view)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_flags_map_to_wgpu() {
        let usage = (TargetUsage::RENDER_TARGET | TargetUsage::SAMPLED).to_wgpu();
        assert!(usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));

        let depth_only = TargetUsage::DEPTH.to_wgpu();
        assert!(depth_only.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(!depth_only.contains(wgpu::TextureUsages::TEXTURE_BINDING));
    }

    #[test]
    fn color_targets_are_attachable_on_downlevel_adapters() {
        let config = RendererConfig::new(64, 64, wgpu::TextureFormat::Bgra8Unorm);
        for desc in FrameTargets::descriptors(&config) {
            if desc.format.is_depth_stencil_format() {
                continue;
            }
            assert!(
                matches!(desc.format, wgpu::TextureFormat::Rgba16Float | wgpu::TextureFormat::Rgba8Unorm),
                "{} uses {:?}",
                desc.handle.name(),
                desc.format
            );
        }
    }

    #[test]
    fn attachment_sets_fit_the_downlevel_per_sample_budget() {
        let budget = wgpu::Limits::downlevel_webgl2_defaults().max_color_attachment_bytes_per_sample;
        let bytes = |formats: &[wgpu::TextureFormat]| -> u32 {
            formats.iter().filter_map(|f| f.block_copy_size(None)).sum()
        };
        assert_eq!(bytes(&[RSM_POSITION_FORMAT, RSM_NORMAL_FORMAT, RSM_FLUX_FORMAT]), 24);
        assert!(bytes(&[RSM_POSITION_FORMAT, RSM_NORMAL_FORMAT, RSM_FLUX_FORMAT]) <= budget);
        assert!(bytes(&[GBUFFER_NORMAL_FORMAT, GBUFFER_INDIRECT_FORMAT, GBUFFER_ALBEDO_FORMAT]) <= budget);
    }

    #[test]
    fn descriptor_table_uses_rsm_and_screen_sizes() {
        let config = RendererConfig::new(320, 200, wgpu::TextureFormat::Bgra8Unorm).with_rsm_size(512, 512);
        let descs = FrameTargets::descriptors(&config);
        assert_eq!(descs.len(), 10);

        let find = |h: ResourceHandle| descs.iter().find(|d| d.handle == h).copied();
        assert_eq!(find(RSM_FLUX).map(|d| (d.width, d.height)), Some((512, 512)));
        assert_eq!(find(BLUR_OUTPUT).map(|d| (d.width, d.height)), Some((320, 200)));
        assert_eq!(find(GBUFFER_DEPTH).map(|d| d.format), Some(DEPTH_FORMAT));
        assert!(find(BACK_BUFFER).is_none());
    }
}
