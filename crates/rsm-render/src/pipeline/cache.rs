//! Pipeline cache keyed by shader and variant

use super::{PipelineDescriptor, PipelineVariant, ShaderDefine};
use crate::mesh::Vertex;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Entry points every pass shader exports
const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Key for pipeline cache lookup
///
/// `defines` holds the rendered define prelude, so one shader compiled with
/// two define sets yields two keys.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct PipelineKey {
    pub shader_id: String,
    pub defines: String,
    pub variant: PipelineVariant,
    pub color_targets: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl PipelineKey {
    pub fn new(desc: &PipelineDescriptor) -> Self {
        Self {
            shader_id: desc.shader_id.to_string(),
            defines: define_prelude(desc.defines),
            variant: desc.variant,
            color_targets: desc.color_targets.to_vec(),
            depth_format: desc.depth_format,
        }
    }

    /// Key of the shader module this pipeline is built from
    fn module_key(&self) -> (String, String) {
        (self.shader_id.clone(), self.defines.clone())
    }
}

/// Pipeline cache; every pass asks it for pipelines during setup
pub struct PipelineCache {
    device: Arc<wgpu::Device>,
    cache: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
    shader_modules: HashMap<(String, String), Arc<wgpu::ShaderModule>>,
}

impl PipelineCache {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        Self {
            device,
            cache: HashMap::new(),
            shader_modules: HashMap::new(),
        }
    }

    /// Get or create a pipeline variant
    pub fn get_or_create(&mut self, desc: &PipelineDescriptor) -> Result<Arc<wgpu::RenderPipeline>> {
        let key = PipelineKey::new(desc);

        if let Some(pipeline) = self.cache.get(&key) {
            log::trace!("Using cached pipeline: {:?}", key);
            return Ok(pipeline.clone());
        }

        if desc.color_targets.is_empty() {
            return Err(Error::Pipeline(format!("pipeline '{}' has no color targets", desc.shader_id)));
        }
        if desc.variant == PipelineVariant::Fullscreen && desc.depth_format.is_some() {
            return Err(Error::Pipeline(format!(
                "fullscreen pipeline '{}' cannot use a depth attachment",
                desc.shader_id
            )));
        }

        log::info!("Creating new pipeline variant: {:?}", key);

        let module_key = key.module_key();
        let shader_module = match self.shader_modules.get(&module_key) {
            Some(module) => module.clone(),
            None => {
                let processed = apply_defines(desc.source, desc.defines);
                let module = Arc::new(self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(desc.shader_id),
                    source: wgpu::ShaderSource::Wgsl(processed.into()),
                }));
                self.shader_modules.insert(module_key, module.clone());
                module
            }
        };

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_layout", desc.shader_id)),
            bind_group_layouts: desc.bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = Arc::new(self.create_pipeline(desc, &pipeline_layout, &shader_module));
        self.cache.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn create_pipeline(
        &self,
        desc: &PipelineDescriptor,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let vertex_buffers = [Vertex::layout()];
        let (buffers, cull_mode): (&[wgpu::VertexBufferLayout], _) = match desc.variant {
            PipelineVariant::Mesh { cull_mode } => (&vertex_buffers, cull_mode),
            PipelineVariant::Fullscreen => (&[], None),
        };

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let depth_stencil = desc.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.shader_id),
            layout: Some(layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: VERTEX_ENTRY,
                buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: FRAGMENT_ENTRY,
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Prepend `const` declarations for every define to the shader source
pub(crate) fn apply_defines(source: &str, defines: &[(&str, ShaderDefine)]) -> String {
    let mut result = define_prelude(defines);
    result.push_str(source);
    result
}

/// One `const` line per define, in declaration order
fn define_prelude(defines: &[(&str, ShaderDefine)]) -> String {
    let mut result = String::new();

    for (name, value) in defines {
        let line = match value {
            ShaderDefine::Bool(b) => format!("const {name}: bool = {b};\n"),
            ShaderDefine::U32(u) => format!("const {name}: u32 = {u}u;\n"),
            ShaderDefine::I32(i) => format!("const {name}: i32 = {i}i;\n"),
            ShaderDefine::F32(f) => format!("const {name}: f32 = {f:?};\n"),
        };
        result.push_str(&line);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_are_prepended_as_consts() {
        let out = apply_defines(
            "fn main() {}",
            &[
                ("KERNEL_SIZE", ShaderDefine::U32(256)),
                ("RADIUS", ShaderDefine::I32(-4)),
                ("EPS", ShaderDefine::F32(1.0)),
                ("ON", ShaderDefine::Bool(true)),
            ],
        );
        assert_eq!(
            out,
            "const KERNEL_SIZE: u32 = 256u;\nconst RADIUS: i32 = -4i;\nconst EPS: f32 = 1.0;\nconst ON: bool = true;\nfn main() {}"
        );
    }

    fn descriptor<'a>(defines: &'a [(&'a str, ShaderDefine)]) -> PipelineDescriptor<'a> {
        PipelineDescriptor {
            shader_id: "gbuffer",
            source: "fn main() {}",
            defines,
            variant: PipelineVariant::Fullscreen,
            bind_group_layouts: &[],
            color_targets: &[wgpu::TextureFormat::Rgba16Float],
            depth_format: None,
        }
    }

    #[test]
    fn same_shader_with_other_defines_gets_its_own_key() {
        let small = [("KERNEL_SIZE", ShaderDefine::U32(16))];
        let large = [("KERNEL_SIZE", ShaderDefine::U32(256))];

        let a = PipelineKey::new(&descriptor(&small));
        let b = PipelineKey::new(&descriptor(&large));
        assert_ne!(a, b);
        assert_ne!(a.module_key(), b.module_key());

        let again = PipelineKey::new(&descriptor(&small));
        assert_eq!(a, again);
        assert_eq!(a.module_key(), again.module_key());
    }

    #[test]
    fn every_pass_shader_exports_the_pipeline_entry_points() {
        let shaders = [
            ("rsm", include_str!("../../shaders/passes/rsm.wgsl")),
            ("gbuffer", include_str!("../../shaders/passes/gbuffer.wgsl")),
            ("blur", include_str!("../../shaders/passes/blur.wgsl")),
            ("composite", include_str!("../../shaders/passes/composite.wgsl")),
        ];
        for (name, source) in shaders {
            assert!(source.contains(&format!("fn {VERTEX_ENTRY}(")), "{name} has no vertex entry");
            assert!(source.contains(&format!("fn {FRAGMENT_ENTRY}(")), "{name} has no fragment entry");
        }
    }
}
