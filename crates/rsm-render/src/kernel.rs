//! Sample kernel and rotation noise generation
//!
//! The gather pass evaluates a fixed 2-D kernel around each pixel's
//! light-space position. Samples are importance-biased towards the centre
//! with a quadratic scale curve so that most of the budget is spent near the
//! receiver while a few long-range samples remain.
//!
//! A 4×4 tile of unit rotation vectors rotates the kernel per pixel
//! (interleaved sampling). After the blur pass the 16 rotations approximate
//! a much denser kernel.
//!
//! Both tables use a seeded `StdRng`, so the same seed always produces the
//! same tables.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Kernel length used by the gather pass
pub const DEFAULT_KERNEL_SIZE: u32 = 256;
/// Number of rotation vectors in the noise tile (4×4)
pub const DEFAULT_NOISE_SIZE: u32 = 16;
/// Side length of the interleaved-sampling tile in pixels
pub const NOISE_TILE_DIM: u32 = 4;

/// One kernel tap: a light-space UV offset (before radius scaling) and the
/// importance scale that produced its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSample {
    pub offset: Vec2,
    pub scale: f32,
}

/// Ordered, read-only kernel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleKernel {
    samples: Vec<KernelSample>,
}

impl SampleKernel {
    pub fn samples(&self) -> &[KernelSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `[offset.x, offset.y, scale, 0]` per sample, ready for a uniform array
    pub fn to_gpu(&self) -> Vec<[f32; 4]> {
        self.samples
            .iter()
            .map(|s| [s.offset.x, s.offset.y, s.scale, 0.0])
            .collect()
    }
}

/// 4×4 tile of unit rotation vectors
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseTile {
    vectors: Vec<Vec2>,
}

impl NoiseTile {
    pub fn vectors(&self) -> &[Vec2] {
        &self.vectors
    }

    /// Rotation used by pixel `(x, y)`: the tile repeats every 4 pixels.
    /// An empty tile leaves the kernel unrotated.
    pub fn rotation_for_pixel(&self, x: u32, y: u32) -> Vec2 {
        if self.vectors.is_empty() {
            return Vec2::X;
        }
        let index = (y % NOISE_TILE_DIM) * NOISE_TILE_DIM + (x % NOISE_TILE_DIM);
        self.vectors[index as usize % self.vectors.len()]
    }

    /// `[x, y, 0, 0]` per vector
    pub fn to_gpu(&self) -> Vec<[f32; 4]> {
        self.vectors.iter().map(|v| [v.x, v.y, 0.0, 0.0]).collect()
    }
}

/// Rotate a kernel offset by a unit rotation vector (complex multiply)
#[inline]
pub fn rotate(offset: Vec2, rotation: Vec2) -> Vec2 {
    Vec2::new(
        offset.x * rotation.x - offset.y * rotation.y,
        offset.x * rotation.y + offset.y * rotation.x,
    )
}

/// Generate `count` importance-biased kernel samples.
///
/// Sample `i` points in a uniformly drawn direction and has length
/// `lerp(0.1, 1.0, t²)` with `t = i / count`.
pub fn generate_kernel(count: u32, seed: u64) -> SampleKernel {
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = (0..count)
        .map(|i| {
            let direction = random_unit_vector(&mut rng);
            let t = i as f32 / count as f32;
            let scale = lerp(0.1, 1.0, t * t);
            KernelSample { offset: direction * scale, scale }
        })
        .collect();

    SampleKernel { samples }
}

/// Generate `count` unit rotation vectors for the interleaved-sampling tile.
pub fn generate_noise_tile(count: u32, seed: u64) -> NoiseTile {
    let mut rng = StdRng::seed_from_u64(seed);
    let vectors = (0..count).map(|_| random_unit_vector(&mut rng)).collect();
    NoiseTile { vectors }
}

/// Uniform draw in [-1, 1]², redrawn while it has zero length, then normalized.
fn random_unit_vector(rng: &mut StdRng) -> Vec2 {
    loop {
        let v = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        if v.length_squared() > f32::MIN_POSITIVE {
            return v.normalize();
        }
    }
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + f * (b - a)
}
