//! GPU resources owned by the renderer: render targets and per-draw uniforms

mod targets;
mod uniforms;

pub use targets::{
    FrameTargets, RenderTarget, TargetDesc, TargetUsage, BACK_BUFFER, BLUR_FORMAT, BLUR_OUTPUT,
    BLUR_TEMP, DEPTH_FORMAT, GBUFFER_ALBEDO, GBUFFER_ALBEDO_FORMAT, GBUFFER_DEPTH, GBUFFER_INDIRECT,
    GBUFFER_INDIRECT_FORMAT, GBUFFER_NORMAL, GBUFFER_NORMAL_FORMAT, RSM_DEPTH, RSM_FLUX,
    RSM_FLUX_FORMAT, RSM_NORMAL, RSM_NORMAL_FORMAT, RSM_POSITION, RSM_POSITION_FORMAT,
};
pub use uniforms::{DrawUniforms, FrameConstants};
