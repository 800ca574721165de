use approx::assert_relative_eq;
use rsm_render::kernel::{generate_kernel, generate_noise_tile, DEFAULT_KERNEL_SIZE, DEFAULT_NOISE_SIZE};
use rsm_render::RendererConfig;

#[test]
fn kernel_scales_are_in_range_and_non_decreasing() {
    let kernel = generate_kernel(DEFAULT_KERNEL_SIZE, 42);
    assert_eq!(kernel.len(), 256);

    let mut previous = 0.0f32;
    for (i, sample) in kernel.samples().iter().enumerate() {
        assert!(sample.scale > 0.0 && sample.scale <= 1.0, "sample {i} scale {}", sample.scale);
        assert!(sample.scale >= previous, "sample {i} scale decreased");
        assert_relative_eq!(sample.offset.length(), sample.scale, epsilon = 1e-5);
        previous = sample.scale;
    }
}

#[test]
fn noise_vectors_are_unit_length() {
    let noise = generate_noise_tile(DEFAULT_NOISE_SIZE, 12345);
    assert_eq!(noise.vectors().len(), 16);
    for v in noise.vectors() {
        assert_ne!(v.length_squared(), 0.0);
        assert_relative_eq!(v.length(), 1.0, epsilon = 1e-5);
    }
}

#[test]
fn same_seed_yields_identical_tables() {
    assert_eq!(generate_kernel(256, 7), generate_kernel(256, 7));
    assert_eq!(generate_noise_tile(16, 7), generate_noise_tile(16, 7));
    assert_ne!(generate_kernel(256, 7), generate_kernel(256, 8));
}

#[test]
fn noise_tile_repeats_every_four_pixels() {
    let noise = generate_noise_tile(16, 3);
    for y in 0..4 {
        for x in 0..4 {
            let expected = noise.vectors()[(y * 4 + x) as usize];
            assert_eq!(noise.rotation_for_pixel(x, y), expected);
            assert_eq!(noise.rotation_for_pixel(x + 4, y + 8), expected);
        }
    }
}

#[test]
fn gpu_packing_keeps_sample_order() {
    let config = RendererConfig::new(8, 8, wgpu::TextureFormat::Rgba8Unorm);
    let kernel = generate_kernel(config.gather.sample_count, config.kernel_seed);
    let packed = kernel.to_gpu();
    assert_eq!(packed.len(), kernel.len());
    let last = kernel.samples()[kernel.len() - 1];
    assert_eq!(packed[kernel.len() - 1], [last.offset.x, last.offset.y, last.scale, 0.0]);
}
