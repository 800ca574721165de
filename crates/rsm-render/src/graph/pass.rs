//! Render pass trait and execution context

use super::{FrameState, PassResourceBuilder};
use crate::config::RendererConfig;
use crate::kernel::{NoiseTile, SampleKernel};
use crate::pipeline::PipelineCache;
use crate::resources::{DrawUniforms, FrameTargets};
use crate::scene::SceneObject;
use crate::Result;
use glam::Mat4;

/// Render pass trait - implemented by all rendering passes
pub trait RenderPass: Send + Sync {
    /// Unique name for this pass
    fn name(&self) -> &str;

    /// Frame stage this pass records
    fn stage(&self) -> FrameState;

    /// Declare resource dependencies
    ///
    /// Called once when the pass is added, to determine pass ordering and
    /// to check for read/write hazards.
    fn declare_resources(&self, _builder: &mut PassResourceBuilder) {
        // Default: no resource dependencies
    }

    /// Create pipelines, bind groups and pass-owned buffers
    ///
    /// Called once after the graph is built. Everything created here lives
    /// until the pass is dropped.
    fn setup(&mut self, _ctx: &mut SetupContext) -> Result<()> {
        Ok(())
    }

    /// Record the pass
    ///
    /// Called every frame during graph execution.
    fn execute(&mut self, ctx: &mut PassContext) -> Result<()>;
}

/// Context handed to [`RenderPass::setup`]
pub struct SetupContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub config: &'a RendererConfig,
    pub targets: &'a FrameTargets,
    pub uniforms: &'a DrawUniforms,
    pub pipelines: &'a mut PipelineCache,
    pub kernel: &'a SampleKernel,
    pub noise: &'a NoiseTile,
}

/// Per-frame inputs shared by every pass
pub struct FrameInputs<'a> {
    pub objects: &'a [SceneObject],
    pub camera_view: Mat4,
    pub camera_projection: Mat4,
    /// Back-buffer size this frame (may differ from the target size after a resize)
    pub output_size: (u32, u32),
    pub frame: u64,
}

/// Context for pass execution
pub struct PassContext<'a> {
    /// Command encoder for recording GPU commands
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub queue: &'a wgpu::Queue,
    pub targets: &'a FrameTargets,
    /// Per-draw constant arena, reserved for this frame
    pub uniforms: &'a mut DrawUniforms,
    pub frame: &'a FrameInputs<'a>,
    /// Back buffer the composite pass writes into
    pub output: &'a wgpu::TextureView,
}
