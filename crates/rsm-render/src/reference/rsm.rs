//! CPU reflective shadow map

use super::raster::{rasterize_triangle, Culling, Varyings};
use super::{Image, ReferenceObject};
use crate::config::LightView;
use crate::scene::normal_matrix;
use glam::{Vec3, Vec4};

/// The three RSM color targets plus depth
///
/// Covered texels have `w = 1` in position and normal; cleared texels are
/// all zero and depth 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct RsmImages {
    pub position: Image<Vec4>,
    pub normal: Image<Vec4>,
    pub flux: Image<Vec4>,
    pub depth: Image<f32>,
}

impl RsmImages {
    pub fn cleared(width: u32, height: u32) -> Self {
        Self {
            position: Image::new(width, height, Vec4::ZERO),
            normal: Image::new(width, height, Vec4::ZERO),
            flux: Image::new(width, height, Vec4::ZERO),
            depth: Image::new(width, height, 1.0),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.position.width(), self.position.height())
    }
}

/// Rasterize `objects` from the light, double-sided
pub fn render_rsm(objects: &[ReferenceObject], light: &LightView, size: (u32, u32)) -> RsmImages {
    let mut rsm = RsmImages::cleared(size.0, size.1);
    let view_proj = light.view_proj();

    for object in objects {
        let normal_mat = normal_matrix(object.model);
        let flux = (object.albedo * light.color).extend(1.0);

        for tri in object.mesh.triangles() {
            let world = tri.map(|v| object.model.transform_point3(Vec3::from(v.position)));
            let clip = world.map(|p| view_proj * p.extend(1.0));
            let varyings = [0, 1, 2].map(|i| Varyings {
                world_position: world[i],
                normal: normal_mat.transform_vector3(Vec3::from(tri[i].normal)),
            });

            let RsmImages { position, normal, flux: flux_image, depth } = &mut rsm;
            rasterize_triangle(clip, varyings, Culling::None, depth, |frag| {
                position.set(frag.x, frag.y, frag.varyings.world_position.extend(1.0));
                normal.set(frag.x, frag.y, frag.varyings.normal.normalize_or_zero().extend(1.0));
                flux_image.set(frag.x, frag.y, flux);
            });
        }
    }

    rsm
}
