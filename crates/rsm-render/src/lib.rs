//! RSM Render - deferred renderer with one-bounce indirect illumination
//!
//! The scene is rasterized from a static light into a reflective shadow map
//! (world position, normal, flux), then from the camera into a GBuffer where
//! every pixel gathers bounced light from the RSM with a fixed stochastic
//! kernel. A separable blur removes the sampling noise and a composite pass
//! writes the final image into the caller's back buffer.
//!
//! - Render graph with explicit read/write declarations per pass
//! - Resource state tracking between passes (no read of an unwritten target)
//! - Strictly sequential frame state machine: RSM → GBuffer → Blur → Composite
//! - CPU reference implementation of the pass math for testing
//! - Pipelines cached per shader, define set and attachment formats

pub mod config;
pub mod graph;
pub mod kernel;
pub mod mesh;
pub mod passes;
pub mod pipeline;
pub mod reference;
pub mod resources;
pub mod scene;

mod camera;
mod renderer;

pub use camera::CameraPose;
pub use config::{BlurSettings, CompositeSettings, GatherSettings, LightView, RendererConfig};
pub use kernel::{KernelSample, NoiseTile, SampleKernel};
pub use mesh::{GpuMesh, MeshData, MeshError, Submesh, Vertex};
pub use renderer::{FrameStats, Renderer};
pub use scene::SceneObject;

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during rendering
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Device, target or pipeline creation failed; the renderer cannot run.
    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Resource error: {0}")]
    Resource(String),

    /// A `render_frame` precondition was violated by the caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("WGPU error: {0}")]
    Wgpu(String),
}

impl From<wgpu::Error> for Error {
    fn from(err: wgpu::Error) -> Self {
        Error::Wgpu(err.to_string())
    }
}
