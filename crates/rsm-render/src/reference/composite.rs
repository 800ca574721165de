//! CPU composite, mirroring composite.wgsl

use super::gather::GBufferImages;
use super::Image;
use crate::config::{CompositeSettings, LightView};
use glam::{Vec3, Vec4};

pub fn composite(
    gbuffer: &GBufferImages,
    blurred: &Image<Vec4>,
    light: &LightView,
    settings: &CompositeSettings,
    output_size: (u32, u32),
) -> Image<Vec4> {
    let (gw, gh) = (gbuffer.albedo.width(), gbuffer.albedo.height());
    let scale_x = gw as f32 / output_size.0.max(1) as f32;
    let scale_y = gh as f32 / output_size.1.max(1) as f32;
    let light_dir = light.direction();

    let mut out = Image::new(output_size.0, output_size.1, Vec4::ZERO);
    for y in 0..output_size.1 {
        for x in 0..output_size.0 {
            let gx = (((x as f32 + 0.5) * scale_x).floor() as u32).min(gw - 1);
            let gy = (((y as f32 + 0.5) * scale_y).floor() as u32).min(gh - 1);

            let normal = gbuffer.normal.get(gx, gy);
            if normal.w == 0.0 {
                out.set(x, y, settings.background.extend(1.0));
                continue;
            }

            let albedo = gbuffer.albedo.get(gx, gy).truncate();
            let indirect = blurred.get(gx, gy);
            let n = normal.truncate().normalize_or_zero();

            let direct = n.dot(-light_dir).max(0.0) * light.color * indirect.w;
            let color = albedo
                * (direct + Vec3::splat(settings.ambient) + indirect.truncate() * settings.indirect_strength);
            out.set(x, y, color.extend(1.0));
        }
    }
    out
}
