//! Renderer configuration
//!
//! All values are fixed for the lifetime of a [`Renderer`](crate::Renderer):
//! the light never moves and the intermediate targets are never reallocated.

use crate::kernel::{DEFAULT_KERNEL_SIZE, DEFAULT_NOISE_SIZE};
use crate::{Error, Result};
use glam::{Mat4, Vec3};

/// Largest blur radius the blur shader loop accepts (texels)
pub const MAX_BLUR_RADIUS: u32 = 16;

/// Static light with an orthographic frustum
///
/// The RSM is rendered through this view every frame. It is a session
/// constant: there is no dynamic relighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightView {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
    /// Linear RGB radiance of the light
    pub color: Vec3,
}

impl LightView {
    /// Overhead light pointing straight down at `target`
    pub fn overhead(target: Vec3, height: f32, half_extent: f32) -> Self {
        Self {
            position: target + Vec3::Y * height,
            target,
            up: Vec3::NEG_Z,
            left: -half_extent,
            right: half_extent,
            bottom: -half_extent,
            top: half_extent,
            near: 0.1,
            far: height * 2.0,
            color: Vec3::ONE,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Unit vector the light travels along (from the light towards its target)
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    fn validate(&self) -> Result<()> {
        let forward = self.target - self.position;
        if forward.length_squared() <= f32::EPSILON {
            return Err(Error::InvalidInput("light position equals its target".into()));
        }
        if forward.normalize().cross(self.up.normalize_or_zero()).length_squared() <= 1e-6 {
            return Err(Error::InvalidInput("light up vector is parallel to its direction".into()));
        }
        if self.right <= self.left || self.top <= self.bottom || self.far <= self.near {
            return Err(Error::InvalidInput(format!(
                "degenerate light frustum l={} r={} b={} t={} n={} f={}",
                self.left, self.right, self.bottom, self.top, self.near, self.far
            )));
        }
        Ok(())
    }
}

impl Default for LightView {
    fn default() -> Self {
        Self {
            position: Vec3::new(3.0, 10.0, 4.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            left: -8.0,
            right: 8.0,
            bottom: -8.0,
            top: 8.0,
            near: 0.1,
            far: 30.0,
            color: Vec3::new(1.0, 0.96, 0.9),
        }
    }
}

/// Indirect gather parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatherSettings {
    /// Number of kernel samples evaluated per pixel
    pub sample_count: u32,
    /// Kernel radius in light-space UV units
    pub sample_radius: f32,
    /// Scale applied to the accumulated indirect radiance
    pub intensity: f32,
    /// Floor of the `distance⁴` denominator
    pub distance_epsilon: f32,
    /// Depth bias for the RSM shadow compare (light NDC depth units)
    pub shadow_bias: f32,
}

impl Default for GatherSettings {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_KERNEL_SIZE,
            sample_radius: 0.1,
            intensity: 0.01,
            distance_epsilon: 0.01,
            shadow_bias: 0.002,
        }
    }
}

/// Separable box blur applied to the indirect buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurSettings {
    /// Half-width of the filter in texels (taps = 2 * radius + 1 per axis)
    pub radius: u32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self { radius: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeSettings {
    /// Constant ambient term added to direct light
    pub ambient: f32,
    /// Multiplier on the blurred indirect radiance
    pub indirect_strength: f32,
    /// Written where the GBuffer holds no geometry
    pub background: Vec3,
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            ambient: 0.03,
            indirect_strength: 1.0,
            background: Vec3::new(0.02, 0.02, 0.03),
        }
    }
}

/// Main renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub surface_format: wgpu::TextureFormat,
    /// RSM resolution; `None` uses the output size
    pub rsm_size: Option<(u32, u32)>,
    pub light: LightView,
    pub gather: GatherSettings,
    pub blur: BlurSettings,
    pub composite: CompositeSettings,
    pub kernel_seed: u64,
    pub noise_seed: u64,
    /// Number of rotation vectors in the interleaved-sampling tile
    pub noise_size: u32,
}

impl RendererConfig {
    pub fn new(width: u32, height: u32, surface_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            surface_format,
            rsm_size: None,
            light: LightView::default(),
            gather: GatherSettings::default(),
            blur: BlurSettings::default(),
            composite: CompositeSettings::default(),
            kernel_seed: 42,
            noise_seed: 12345,
            noise_size: DEFAULT_NOISE_SIZE,
        }
    }

    pub fn with_light(mut self, light: LightView) -> Self {
        self.light = light;
        self
    }

    pub fn with_rsm_size(mut self, width: u32, height: u32) -> Self {
        self.rsm_size = Some((width, height));
        self
    }

    pub fn with_gather(mut self, gather: GatherSettings) -> Self {
        self.gather = gather;
        self
    }

    pub fn with_blur_radius(mut self, radius: u32) -> Self {
        self.blur.radius = radius;
        self
    }

    pub fn with_composite(mut self, composite: CompositeSettings) -> Self {
        self.composite = composite;
        self
    }

    pub fn with_seeds(mut self, kernel_seed: u64, noise_seed: u64) -> Self {
        self.kernel_seed = kernel_seed;
        self.noise_seed = noise_seed;
        self
    }

    /// Resolution of the RSM targets
    pub fn rsm_extent(&self) -> (u32, u32) {
        self.rsm_size.unwrap_or((self.width, self.height))
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidInput(format!(
                "output size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        let (rsm_w, rsm_h) = self.rsm_extent();
        if rsm_w == 0 || rsm_h == 0 {
            return Err(Error::InvalidInput(format!("RSM size must be non-zero, got {rsm_w}x{rsm_h}")));
        }
        if self.gather.sample_count == 0 || self.gather.sample_count > DEFAULT_KERNEL_SIZE {
            return Err(Error::InvalidInput(format!(
                "gather sample count must be in 1..={DEFAULT_KERNEL_SIZE}, got {}",
                self.gather.sample_count
            )));
        }
        if self.noise_size != DEFAULT_NOISE_SIZE {
            return Err(Error::InvalidInput(format!(
                "noise tile must hold {DEFAULT_NOISE_SIZE} vectors (4x4), got {}",
                self.noise_size
            )));
        }
        if self.gather.distance_epsilon <= 0.0 {
            return Err(Error::InvalidInput("distance epsilon must be positive".into()));
        }
        if self.blur.radius > MAX_BLUR_RADIUS {
            return Err(Error::InvalidInput(format!(
                "blur radius {} exceeds {MAX_BLUR_RADIUS}",
                self.blur.radius
            )));
        }
        self.light.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RendererConfig::new(960, 540, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!(config.validate().is_ok());
        assert_eq!(config.rsm_extent(), (960, 540));
    }

    #[test]
    fn rejects_zero_output() {
        let config = RendererConfig::new(0, 540, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_light_up_parallel_to_direction() {
        let light = LightView { up: Vec3::Y, ..LightView::overhead(Vec3::ZERO, 10.0, 5.0) };
        let config = RendererConfig::new(64, 64, wgpu::TextureFormat::Rgba8Unorm).with_light(light);
        assert!(config.validate().is_err());
    }

    #[test]
    fn overhead_light_points_down() {
        let light = LightView::overhead(Vec3::ZERO, 10.0, 5.0);
        assert!((light.direction() - Vec3::NEG_Y).length() < 1e-6);
    }
}
