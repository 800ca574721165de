//! CPU GBuffer + indirect gather, mirroring gbuffer.wgsl

use super::raster::{rasterize_triangle, Culling, Varyings};
use super::rsm::RsmImages;
use super::{Image, ReferenceObject};
use crate::config::GatherSettings;
use crate::kernel::{rotate, NoiseTile, SampleKernel};
use crate::scene::normal_matrix;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// GBuffer color targets plus depth
#[derive(Debug, Clone, PartialEq)]
pub struct GBufferImages {
    /// xyz = world normal, w = 1 where geometry was drawn
    pub normal: Image<Vec4>,
    /// rgb = indirect radiance, a = shadow factor
    pub indirect: Image<Vec4>,
    pub albedo: Image<Vec4>,
    pub depth: Image<f32>,
}

/// Light-space UV and depth of a world position
pub fn light_uv(light_view_proj: Mat4, world: Vec3) -> (Vec2, f32) {
    let clip = light_view_proj * world.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    (uv, ndc.z)
}

fn in_unit_square(uv: Vec2) -> bool {
    uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all()
}

fn rsm_texel(uv: Vec2, (width, height): (u32, u32)) -> (u32, u32) {
    let size = Vec2::new(width as f32, height as f32);
    let texel = (uv * size).floor().clamp(Vec2::ZERO, size - Vec2::ONE);
    (texel.x as u32, texel.y as u32)
}

/// 1.0 when `world` is lit by the RSM light, 0.0 when occluded.
/// Positions outside the light frustum count as lit.
pub fn shadow_factor(rsm: &RsmImages, light_view_proj: Mat4, world: Vec3, bias: f32) -> f32 {
    let (uv, depth) = light_uv(light_view_proj, world);
    if !in_unit_square(uv) || !(0.0..=1.0).contains(&depth) {
        return 1.0;
    }
    let (x, y) = rsm_texel(uv, rsm.size());
    if depth - bias > rsm.depth.get(x, y) {
        0.0
    } else {
        1.0
    }
}

/// One-bounce indirect radiance arriving at a receiver
///
/// Sums, over the rotated kernel around the receiver's light-space UV,
/// `max(0, n·dir) * max(0, ns·-dir) / max(dist⁴, ε) * flux * scale²`,
/// then applies the configured intensity.
pub fn gather_indirect(
    rsm: &RsmImages,
    kernel: &SampleKernel,
    rotation: Vec2,
    settings: &GatherSettings,
    light_view_proj: Mat4,
    world: Vec3,
    normal: Vec3,
) -> Vec3 {
    let (uv, _) = light_uv(light_view_proj, world);
    let n = normal.normalize_or_zero();
    let size = rsm.size();

    let mut indirect = Vec3::ZERO;
    for sample in kernel.samples().iter().take(settings.sample_count as usize) {
        let sample_uv = uv + rotate(sample.offset, rotation) * settings.sample_radius;
        if !in_unit_square(sample_uv) {
            continue;
        }

        let (x, y) = rsm_texel(sample_uv, size);
        let sample_position = rsm.position.get(x, y).truncate();
        let sample_normal = rsm.normal.get(x, y).truncate();
        let flux = rsm.flux.get(x, y).truncate();

        let delta = sample_position - world;
        let dist = delta.length();
        let dir = delta / dist.max(1e-6);
        let dist2 = dist * dist;
        let weight = n.dot(dir).max(0.0) * sample_normal.dot(-dir).max(0.0)
            / (dist2 * dist2).max(settings.distance_epsilon);
        indirect += flux * weight * sample.scale * sample.scale;
    }

    indirect * settings.intensity
}

/// Everything the GBuffer pass reads besides geometry
pub struct GatherInputs<'a> {
    pub rsm: &'a RsmImages,
    pub kernel: &'a SampleKernel,
    pub noise: &'a NoiseTile,
    pub light_view_proj: Mat4,
    pub settings: &'a GatherSettings,
}

/// Rasterize `objects` from the camera (back faces culled) and run the
/// gather for every covered pixel.
pub fn render_gbuffer(
    objects: &[ReferenceObject],
    camera_view_proj: Mat4,
    size: (u32, u32),
    inputs: &GatherInputs,
) -> GBufferImages {
    let (width, height) = size;
    let mut depth = Image::new(width, height, 1.0f32);
    let mut normal_image = Image::new(width, height, Vec4::ZERO);
    let mut albedo_image = Image::new(width, height, Vec4::ZERO);
    // Final surface per pixel; shading happens after visibility is resolved
    let mut visible: Image<Option<Varyings>> = Image::new(width, height, None);

    for object in objects {
        let normal_mat = normal_matrix(object.model);
        let albedo = object.albedo.extend(1.0);

        for tri in object.mesh.triangles() {
            let world = tri.map(|v| object.model.transform_point3(Vec3::from(v.position)));
            let clip = world.map(|p| camera_view_proj * p.extend(1.0));
            let varyings = [0, 1, 2].map(|i| Varyings {
                world_position: world[i],
                normal: normal_mat.transform_vector3(Vec3::from(tri[i].normal)),
            });

            rasterize_triangle(clip, varyings, Culling::Back, &mut depth, |frag| {
                normal_image.set(frag.x, frag.y, frag.varyings.normal.normalize_or_zero().extend(1.0));
                albedo_image.set(frag.x, frag.y, albedo);
                visible.set(frag.x, frag.y, Some(frag.varyings));
            });
        }
    }

    let light_view_proj = inputs.light_view_proj;
    let mut indirect_image = Image::new(width, height, Vec4::ZERO);
    for y in 0..height {
        for x in 0..width {
            let Some(surface) = visible.get(x, y) else {
                continue;
            };
            let shadow = shadow_factor(
                inputs.rsm,
                light_view_proj,
                surface.world_position,
                inputs.settings.shadow_bias,
            );
            let indirect = gather_indirect(
                inputs.rsm,
                inputs.kernel,
                inputs.noise.rotation_for_pixel(x, y),
                inputs.settings,
                light_view_proj,
                surface.world_position,
                surface.normal,
            );
            indirect_image.set(x, y, indirect.extend(shadow));
        }
    }

    GBufferImages {
        normal: normal_image,
        indirect: indirect_image,
        albedo: albedo_image,
        depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::generate_kernel;

    #[test]
    fn light_uv_maps_frustum_center_to_middle() {
        let light = crate::config::LightView::overhead(Vec3::ZERO, 5.0, 2.0);
        let (uv, depth) = light_uv(light.view_proj(), Vec3::ZERO);
        assert!((uv - Vec2::splat(0.5)).length() < 1e-5);
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn texel_lookup_clamps_to_edge() {
        assert_eq!(rsm_texel(Vec2::new(1.0, 1.0), (4, 4)), (3, 3));
        assert_eq!(rsm_texel(Vec2::new(0.0, 0.49), (4, 4)), (0, 1));
    }

    #[test]
    fn coincident_sample_does_not_divide_by_zero() {
        // Every texel is the receiver itself
        let mut rsm = RsmImages::cleared(4, 4);
        rsm.position = Image::new(4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
        rsm.normal = Image::new(4, 4, Vec4::new(0.0, 1.0, 0.0, 1.0));
        rsm.flux = Image::new(4, 4, Vec4::ONE);
        let light = crate::config::LightView::overhead(Vec3::ZERO, 5.0, 2.0);

        let indirect = gather_indirect(
            &rsm,
            &generate_kernel(16, 1),
            Vec2::X,
            &GatherSettings::default(),
            light.view_proj(),
            Vec3::ZERO,
            Vec3::Y,
        );
        assert!(indirect.is_finite());
        assert_eq!(indirect, Vec3::ZERO);
    }
}
