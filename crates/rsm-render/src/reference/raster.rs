//! Minimal triangle rasterizer matching the GPU conventions
//!
//! - NDC x/y in [-1, 1] map to the image with +y up, pixel centers at +0.5
//! - depth is NDC z in [0, 1], compared with `Less`
//! - counter-clockwise triangles (in NDC) are front facing
//! - varyings are interpolated perspective-correct
//!
//! Triangles with a vertex behind the eye (`w <= 0`) are skipped instead of
//! clipped.

use super::Image;
use glam::{Vec2, Vec3, Vec4};

/// Per-vertex values interpolated across a triangle
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Varyings {
    pub world_position: Vec3,
    pub normal: Vec3,
}

impl Varyings {
    fn scaled(self, s: f32) -> Self {
        Self {
            world_position: self.world_position * s,
            normal: self.normal * s,
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            world_position: self.world_position + other.world_position,
            normal: self.normal + other.normal,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Culling {
    None,
    Back,
}

/// A covered, depth-passing pixel
#[derive(Debug, Copy, Clone)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    pub depth: f32,
    pub varyings: Varyings,
}

/// Rasterize one triangle into `depth`, calling `shade` for every fragment
/// that passes the depth test (the depth buffer is updated first).
pub fn rasterize_triangle(
    clip: [Vec4; 3],
    varyings: [Varyings; 3],
    culling: Culling,
    depth: &mut Image<f32>,
    mut shade: impl FnMut(Fragment),
) {
    if clip.iter().any(|c| c.w <= 0.0) {
        return;
    }

    let ndc = clip.map(|c| c.truncate() / c.w);
    let ndc_area = (ndc[1].x - ndc[0].x) * (ndc[2].y - ndc[0].y) - (ndc[1].y - ndc[0].y) * (ndc[2].x - ndc[0].x);
    if ndc_area == 0.0 || (culling == Culling::Back && ndc_area < 0.0) {
        return;
    }

    let (width, height) = (depth.width() as f32, depth.height() as f32);
    let screen = ndc.map(|p| Vec2::new((p.x * 0.5 + 0.5) * width, (0.5 - p.y * 0.5) * height));
    let area = edge(screen[0], screen[1], screen[2]);

    let min = screen[0].min(screen[1]).min(screen[2]).floor().max(Vec2::ZERO);
    let max = screen[0].max(screen[1]).max(screen[2]).ceil().min(Vec2::new(width, height));
    if min.x >= max.x || min.y >= max.y {
        return;
    }

    let inv_w = clip.map(|c| 1.0 / c.w);

    for y in min.y as u32..max.y as u32 {
        for x in min.x as u32..max.x as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b = [
                edge(screen[1], screen[2], p) / area,
                edge(screen[2], screen[0], p) / area,
                edge(screen[0], screen[1], p) / area,
            ];
            if b.iter().any(|&v| v < 0.0) {
                continue;
            }

            let z = b[0] * ndc[0].z + b[1] * ndc[1].z + b[2] * ndc[2].z;
            if !(0.0..=1.0).contains(&z) || z >= depth.get(x, y) {
                continue;
            }

            let weights = [b[0] * inv_w[0], b[1] * inv_w[1], b[2] * inv_w[2]];
            let norm = weights[0] + weights[1] + weights[2];
            let interpolated = varyings[0]
                .scaled(weights[0] / norm)
                .add(varyings[1].scaled(weights[1] / norm))
                .add(varyings[2].scaled(weights[2] / norm));

            depth.set(x, y, z);
            shade(Fragment { x, y, depth: z, varyings: interpolated });
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}
