//! Pipeline variants and shader specialization constants

/// Pipeline variant type
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum PipelineVariant {
    /// Mesh geometry with the interleaved position + normal vertex layout
    Mesh { cull_mode: Option<wgpu::Face> },
    /// Vertex-buffer-less fullscreen triangle, no depth
    Fullscreen,
}

/// Value of a constant injected ahead of a shader's source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderDefine {
    Bool(bool),
    U32(u32),
    I32(i32),
    F32(f32),
}

/// Everything needed to build (or look up) one render pipeline
pub struct PipelineDescriptor<'a> {
    pub shader_id: &'a str,
    pub source: &'a str,
    pub defines: &'a [(&'a str, ShaderDefine)],
    pub variant: PipelineVariant,
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    pub color_targets: &'a [wgpu::TextureFormat],
    pub depth_format: Option<wgpu::TextureFormat>,
}
