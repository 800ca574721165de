//! CPU reference implementation of the frame
//!
//! Mirrors the WGSL passes step for step (same texel addressing, same
//! gather weight, same blur and composite) on plain images, so the frame's
//! properties can be checked without a GPU.

pub mod blur;
pub mod composite;
pub mod gather;
pub mod raster;
pub mod rsm;

pub use blur::box_blur;
pub use composite::composite;
pub use gather::{gather_indirect, light_uv, render_gbuffer, shadow_factor, GBufferImages, GatherInputs};
pub use rsm::{render_rsm, RsmImages};

use crate::camera::CameraPose;
use crate::config::RendererConfig;
use crate::kernel::{generate_kernel, generate_noise_tile, NoiseTile, SampleKernel};
use crate::mesh::MeshData;
use crate::renderer::validate_frame_inputs;
use crate::Result;
use glam::{Mat4, Vec3, Vec4};

/// Row-major 2-D image
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: u32,
    height: u32,
    pixels: Vec<T>,
}

impl<T: Copy> Image<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> T {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) {
        self.pixels[(y * self.width + x) as usize] = value;
    }

    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }
}

/// A CPU mesh placed in the world
#[derive(Debug, Clone, Copy)]
pub struct ReferenceObject<'a> {
    pub mesh: &'a MeshData,
    pub model: Mat4,
    pub albedo: Vec3,
}

impl<'a> ReferenceObject<'a> {
    pub fn new(mesh: &'a MeshData, model: Mat4, albedo: Vec3) -> Self {
        Self { mesh, model, albedo }
    }
}

/// Every intermediate image of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    pub rsm: RsmImages,
    pub gbuffer: GBufferImages,
    pub blurred: Image<Vec4>,
    pub output: Image<Vec4>,
}

/// Runs the four passes on the CPU with the same configuration, kernel and
/// noise the GPU renderer would use.
pub struct ReferenceRenderer {
    config: RendererConfig,
    kernel: SampleKernel,
    noise: NoiseTile,
}

impl ReferenceRenderer {
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let kernel = generate_kernel(config.gather.sample_count, config.kernel_seed);
        let noise = generate_noise_tile(config.noise_size, config.noise_seed);
        Ok(Self { config, kernel, noise })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn kernel(&self) -> &SampleKernel {
        &self.kernel
    }

    pub fn noise(&self) -> &NoiseTile {
        &self.noise
    }

    pub fn render_frame(
        &self,
        camera: &CameraPose,
        objects: &[ReferenceObject],
        delta_time: f32,
    ) -> Result<ReferenceFrame> {
        validate_frame_inputs(camera, objects.len(), delta_time)?;

        let config = &self.config;
        let size = (config.width, config.height);
        let aspect = config.width as f32 / config.height as f32;

        let rsm = render_rsm(objects, &config.light, config.rsm_extent());
        let gbuffer = render_gbuffer(
            objects,
            camera.view_proj(aspect),
            size,
            &GatherInputs {
                rsm: &rsm,
                kernel: &self.kernel,
                noise: &self.noise,
                light_view_proj: config.light.view_proj(),
                settings: &config.gather,
            },
        );
        let blurred = box_blur(&gbuffer.indirect, config.blur.radius);
        let output = composite(&gbuffer, &blurred, &config.light, &config.composite, size);

        Ok(ReferenceFrame { rsm, gbuffer, blurred, output })
    }
}
