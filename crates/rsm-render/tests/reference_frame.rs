//! Frame properties checked on the CPU reference passes

use approx::assert_relative_eq;
use glam::{Mat4, Vec2, Vec3, Vec4};
use rsm_render::kernel::generate_kernel;
use rsm_render::reference::{
    box_blur, gather_indirect, render_rsm, shadow_factor, Image, ReferenceObject, ReferenceRenderer, RsmImages,
};
use rsm_render::{CameraPose, GatherSettings, LightView, MeshData, RendererConfig};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_config() -> RendererConfig {
    RendererConfig::new(64, 48, wgpu::TextureFormat::Rgba8Unorm).with_rsm_size(64, 64)
}

#[test]
fn nothing_in_light_view_means_no_indirect_light() {
    init_logger();
    let light = LightView::overhead(Vec3::ZERO, 5.0, 2.0);
    let renderer = ReferenceRenderer::new(small_config().with_light(light)).unwrap();

    // Far outside the light frustum, but in front of the camera
    let cube = MeshData::cube([50.0, 0.0, 0.0], 1.0);
    let objects = [ReferenceObject::new(&cube, Mat4::IDENTITY, Vec3::ONE)];
    let camera = CameraPose::look_at(Vec3::new(50.0, 1.0, -6.0), Vec3::new(50.0, 0.0, 0.0), Vec3::Y);

    let frame = renderer.render_frame(&camera, &objects, 0.016).unwrap();

    assert!(frame.rsm.flux.pixels().iter().all(|f| *f == Vec4::ZERO));
    let covered = frame.gbuffer.normal.pixels().iter().filter(|n| n.w == 1.0).count();
    assert!(covered > 0, "the cube should be visible to the camera");
    for indirect in frame.gbuffer.indirect.pixels() {
        assert_eq!(indirect.truncate(), Vec3::ZERO);
    }
}

#[test]
fn indirect_light_falls_off_with_distance_from_the_emitter() {
    // Every RSM texel stores the same downward-facing emitter half a unit
    // above the receiver plane
    let mut rsm = RsmImages::cleared(16, 16);
    rsm.position = Image::new(16, 16, Vec4::new(0.0, 0.5, 0.0, 1.0));
    rsm.normal = Image::new(16, 16, Vec4::new(0.0, -1.0, 0.0, 1.0));
    rsm.flux = Image::new(16, 16, Vec4::new(1.0, 0.8, 0.6, 1.0));

    let light = LightView::overhead(Vec3::ZERO, 5.0, 2.0);
    let kernel = generate_kernel(256, 42);
    let settings = GatherSettings { sample_radius: 0.01, ..GatherSettings::default() };

    let radiance: Vec<f32> = [0.0f32, 0.25, 0.5, 0.75, 1.0, 1.5]
        .iter()
        .map(|&x| {
            gather_indirect(&rsm, &kernel, Vec2::X, &settings, light.view_proj(), Vec3::new(x, 0.0, 0.0), Vec3::Y).x
        })
        .collect();

    assert!(radiance[0] > 0.0);
    for pair in radiance.windows(2) {
        assert!(pair[1] < pair[0], "indirect light did not decrease: {:?}", radiance);
    }
}

fn shadow_scene() -> (MeshData, MeshData, LightView) {
    let plane = MeshData::plane([0.0, 0.0, 0.0], 3.0);
    let occluder = MeshData::cube([0.0, 2.0, 0.0], 0.5);
    (plane, occluder, LightView::overhead(Vec3::ZERO, 5.0, 3.0))
}

#[test]
fn occluded_points_have_zero_shadow_factor() {
    let (plane, occluder, light) = shadow_scene();
    let objects = [
        ReferenceObject::new(&plane, Mat4::IDENTITY, Vec3::splat(0.8)),
        ReferenceObject::new(&occluder, Mat4::IDENTITY, Vec3::new(0.8, 0.2, 0.2)),
    ];
    let rsm = render_rsm(&objects, &light, (128, 128));
    let bias = GatherSettings::default().shadow_bias;
    let lvp = light.view_proj();

    // Directly under the occluder
    assert_eq!(shadow_factor(&rsm, lvp, Vec3::new(0.0, 0.0, 0.0), bias), 0.0);
    assert_eq!(shadow_factor(&rsm, lvp, Vec3::new(0.3, 0.0, -0.3), bias), 0.0);
    // Open floor, the occluder's top face, and outside the light frustum
    assert_eq!(shadow_factor(&rsm, lvp, Vec3::new(2.0, 0.0, 2.0), bias), 1.0);
    assert_eq!(shadow_factor(&rsm, lvp, Vec3::new(0.0, 2.5, 0.0), bias), 1.0);
    assert_eq!(shadow_factor(&rsm, lvp, Vec3::new(10.0, 0.0, 0.0), bias), 1.0);
}

#[test]
fn shadow_factor_lands_in_indirect_alpha() {
    let (plane, occluder, light) = shadow_scene();
    let objects = [
        ReferenceObject::new(&plane, Mat4::IDENTITY, Vec3::splat(0.8)),
        ReferenceObject::new(&occluder, Mat4::IDENTITY, Vec3::new(0.8, 0.2, 0.2)),
    ];
    let config = RendererConfig::new(96, 72, wgpu::TextureFormat::Rgba8Unorm)
        .with_rsm_size(128, 128)
        .with_light(light);
    let renderer = ReferenceRenderer::new(config).unwrap();
    let camera = CameraPose::look_at(Vec3::new(0.0, 6.0, -6.0), Vec3::ZERO, Vec3::Y);

    let frame = renderer.render_frame(&camera, &objects, 0.0).unwrap();

    let covered: Vec<f32> = frame
        .gbuffer
        .normal
        .pixels()
        .iter()
        .zip(frame.gbuffer.indirect.pixels())
        .filter(|(n, _)| n.w == 1.0)
        .map(|(_, indirect)| indirect.w)
        .collect();
    assert!(covered.iter().all(|&s| s == 0.0 || s == 1.0));
    assert!(covered.contains(&0.0), "no shadowed pixel found");
    assert!(covered.contains(&1.0), "no lit pixel found");
}

#[test]
fn blur_leaves_a_flat_field_unchanged() {
    let value = Vec4::new(0.25, 0.5, 0.75, 1.0);
    let image = Image::new(13, 7, value);
    for radius in [0, 1, 4] {
        let blurred = box_blur(&image, radius);
        for pixel in blurred.pixels() {
            assert_relative_eq!(pixel.x, value.x, epsilon = 1e-6);
            assert_relative_eq!(pixel.y, value.y, epsilon = 1e-6);
            assert_relative_eq!(pixel.z, value.z, epsilon = 1e-6);
            assert_relative_eq!(pixel.w, value.w, epsilon = 1e-6);
        }
    }
}

#[test]
fn identical_inputs_render_identical_frames() {
    init_logger();
    let config = small_config();
    let background = config.composite.background;
    let renderer = ReferenceRenderer::new(config).unwrap();
    let cube = MeshData::cube([0.0, 0.0, 0.0], 1.0);
    let objects = [ReferenceObject::new(&cube, Mat4::IDENTITY, Vec3::splat(0.8))];
    let camera = CameraPose::default();

    let first = renderer.render_frame(&camera, &objects, 0.016).unwrap();
    let second = renderer.render_frame(&camera, &objects, 0.016).unwrap();
    assert_eq!(first, second);

    // The cube sits in the middle of the view; the corner is background
    assert_eq!(first.output.get(0, 0), background.extend(1.0));
    assert!(first.gbuffer.normal.get(32, 24).w == 1.0);
    assert_ne!(first.output.get(32, 24), background.extend(1.0));
}

#[test]
fn frame_preconditions_are_enforced() {
    let renderer = ReferenceRenderer::new(small_config()).unwrap();
    let cube = MeshData::cube([0.0, 0.0, 0.0], 1.0);
    let objects = [ReferenceObject::new(&cube, Mat4::IDENTITY, Vec3::ONE)];

    assert!(renderer.render_frame(&CameraPose::default(), &[], 0.016).is_err());
    assert!(renderer.render_frame(&CameraPose::default(), &objects, -1.0).is_err());

    let mut degenerate = CameraPose::default();
    degenerate.forward = Vec3::ZERO;
    assert!(renderer.render_frame(&degenerate, &objects, 0.016).is_err());
}
