//! CPU separable box blur, mirroring blur.wgsl

use super::Image;
use glam::Vec4;

/// Horizontal then vertical box filter of half-width `radius`, clamp-to-edge
pub fn box_blur(image: &Image<Vec4>, radius: u32) -> Image<Vec4> {
    let horizontal = blur_axis(image, radius, (1, 0));
    blur_axis(&horizontal, radius, (0, 1))
}

fn blur_axis(image: &Image<Vec4>, radius: u32, (dx, dy): (i64, i64)) -> Image<Vec4> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let r = radius as i64;
    let taps = (2 * r + 1) as f32;

    let mut out = Image::new(image.width(), image.height(), Vec4::ZERO);
    for y in 0..height {
        for x in 0..width {
            let mut sum = Vec4::ZERO;
            for i in -r..=r {
                let sx = (x + dx * i).clamp(0, width - 1);
                let sy = (y + dy * i).clamp(0, height - 1);
                sum += image.get(sx as u32, sy as u32);
            }
            out.set(x as u32, y as u32, sum / taps);
        }
    }
    out
}
