//! Interactive viewer for the RSM renderer
//!
//! An open-top Cornell box lit by a static light from above. The coloured
//! walls bounce red and green light onto the floor and the boxes.
//!
//! Controls:
//!   WASD        — move forward/left/back/right
//!   Space/Shift — move up/down
//!   Mouse drag  — look around (click to grab cursor)
//!   Escape      — release cursor / exit

use glam::{Mat4, Vec3};
use rsm_render::{
    CameraPose, GpuMesh, LightView, MeshData, MeshError, Renderer, RendererConfig, SceneObject, Vertex,
};
use std::collections::HashSet;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

const RSM_SIZE: u32 = 1024;

fn main() {
    env_logger::init();
    log::info!("Starting RSM viewer");

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    let mut app = App { state: None };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
        std::process::exit(1);
    }
}

struct App {
    state: Option<AppState>,
}

struct AppState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    surface_format: wgpu::TextureFormat,
    alpha_mode: wgpu::CompositeAlphaMode,
    renderer: Renderer,
    objects: Vec<SceneObject>,
    last_frame: std::time::Instant,

    // Free-camera state
    cam_pos: Vec3,
    cam_yaw: f32,
    cam_pitch: f32,
    keys: HashSet<KeyCode>,
    cursor_grabbed: bool,
    mouse_delta: (f32, f32),
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match AppState::new(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("Failed to initialize: {}", e);
                event_loop.exit();
                std::process::exit(1);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else { return };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Shutting down");
                if let Some(state) = self.state.take() {
                    state.renderer.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                if state.cursor_grabbed {
                    state.cursor_grabbed = false;
                    let _ = state.window.set_cursor_grab(CursorGrabMode::None);
                    state.window.set_cursor_visible(true);
                } else {
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { state: key_state, physical_key: PhysicalKey::Code(key), .. },
                ..
            } => match key_state {
                ElementState::Pressed => {
                    state.keys.insert(key);
                }
                ElementState::Released => {
                    state.keys.remove(&key);
                }
            },
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                if !state.cursor_grabbed {
                    let grabbed = state
                        .window
                        .set_cursor_grab(CursorGrabMode::Confined)
                        .or_else(|_| state.window.set_cursor_grab(CursorGrabMode::Locked))
                        .is_ok();
                    if grabbed {
                        state.window.set_cursor_visible(false);
                        state.cursor_grabbed = true;
                    }
                }
            }
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                state.configure_surface(size.width, size.height);
                state.renderer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let now = std::time::Instant::now();
                let dt = (now - state.last_frame).as_secs_f32();
                state.last_frame = now;
                state.render(dt);
                state.window.request_redraw();
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        let Some(state) = &mut self.state else { return };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.cursor_grabbed {
                state.mouse_delta.0 += dx as f32;
                state.mouse_delta.1 += dy as f32;
            }
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl AppState {
    fn new(event_loop: &ActiveEventLoop) -> Result<Self, String> {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("RSM Viewer")
                        .with_inner_size(winit::dpi::LogicalSize::new(1280u32, 720u32)),
                )
                .map_err(|e| format!("window creation failed: {e}"))?,
        );

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| format!("surface creation failed: {e}"))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or("no suitable adapter")?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Main Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| format!("device creation failed: {e}"))?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .ok_or("surface reports no formats")?;
        let alpha_mode = caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let config = RendererConfig::new(width, height, surface_format)
            .with_light(scene_light())
            .with_rsm_size(RSM_SIZE, RSM_SIZE);
        let renderer =
            Renderer::new(device.clone(), queue, config).map_err(|e| format!("renderer creation failed: {e}"))?;

        let objects = cornell_box(&device);
        log::info!("Scene has {} objects", objects.len());

        let state = Self {
            window,
            surface,
            device,
            surface_format,
            alpha_mode,
            renderer,
            objects,
            last_frame: std::time::Instant::now(),
            cam_pos: Vec3::new(0.0, 1.2, 6.0),
            cam_yaw: 0.0,
            cam_pitch: -0.1,
            keys: HashSet::new(),
            cursor_grabbed: false,
            mouse_delta: (0.0, 0.0),
        };
        state.configure_surface(width, height);
        Ok(state)
    }

    fn configure_surface(&self, width: u32, height: u32) {
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: self.alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        self.surface.configure(&self.device, &config);
    }

    fn render(&mut self, dt: f32) {
        const SPEED: f32 = 3.0;
        const LOOK_SENS: f32 = 0.002;

        self.cam_yaw += self.mouse_delta.0 * LOOK_SENS;
        self.cam_pitch = (self.cam_pitch - self.mouse_delta.1 * LOOK_SENS).clamp(-1.5, 1.5);
        self.mouse_delta = (0.0, 0.0);

        let pose = CameraPose::default().with_yaw_pitch(self.cam_yaw, self.cam_pitch);
        let (forward, right) = (pose.forward, pose.right);

        if self.keys.contains(&KeyCode::KeyW) { self.cam_pos += forward * SPEED * dt; }
        if self.keys.contains(&KeyCode::KeyS) { self.cam_pos -= forward * SPEED * dt; }
        if self.keys.contains(&KeyCode::KeyA) { self.cam_pos -= right * SPEED * dt; }
        if self.keys.contains(&KeyCode::KeyD) { self.cam_pos += right * SPEED * dt; }
        if self.keys.contains(&KeyCode::Space) { self.cam_pos += Vec3::Y * SPEED * dt; }
        if self.keys.contains(&KeyCode::ShiftLeft) { self.cam_pos -= Vec3::Y * SPEED * dt; }

        let camera = CameraPose { position: self.cam_pos, ..pose };

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
                return;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Err(e) = self.renderer.render_frame(&camera, &self.objects, dt, &view) {
            log::error!("Render error: {}", e);
        }

        output.present();
    }
}

/// Static light above and in front of the box, tilted so the side walls
/// land in the reflective shadow map
fn scene_light() -> LightView {
    LightView {
        position: Vec3::new(1.5, 7.0, 3.0),
        target: Vec3::new(0.0, 0.5, 0.0),
        up: Vec3::Y,
        left: -3.5,
        right: 3.5,
        bottom: -3.5,
        top: 3.5,
        near: 0.1,
        far: 20.0,
        color: Vec3::new(1.0, 0.95, 0.85),
    }
}

/// Meshes that fail validation are logged and left out of the scene
fn cornell_box(device: &wgpu::Device) -> Vec<SceneObject> {
    let white = Vec3::splat(0.75);
    let red = Vec3::new(0.75, 0.1, 0.1);
    let green = Vec3::new(0.1, 0.7, 0.15);

    let wall = MeshData::quad([0.0, 0.0, 0.0], 2.0, 1.25);
    let entries: Vec<(&str, Result<MeshData, MeshError>, Mat4, Vec3)> = vec![
        ("floor", Ok(MeshData::plane([0.0, 0.0, 0.0], 2.0)), Mat4::IDENTITY, white),
        ("back wall", Ok(wall.clone()), Mat4::from_translation(Vec3::new(0.0, 1.25, -2.0)), white),
        (
            "left wall",
            Ok(wall.clone()),
            Mat4::from_translation(Vec3::new(-2.0, 1.25, 0.0)) * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2),
            red,
        ),
        (
            "right wall",
            Ok(wall),
            Mat4::from_translation(Vec3::new(2.0, 1.25, 0.0)) * Mat4::from_rotation_y(-std::f32::consts::FRAC_PI_2),
            green,
        ),
        (
            "tall box",
            Ok(MeshData::cuboid([0.0, 0.0, 0.0], [0.45, 0.9, 0.45])),
            Mat4::from_translation(Vec3::new(-0.7, 0.9, -0.6)) * Mat4::from_rotation_y(0.3),
            white,
        ),
        ("short box", Ok(MeshData::cube([0.8, 0.4, 0.5], 0.4)), Mat4::IDENTITY, white),
        ("pyramid", tetrahedron(0.5), Mat4::from_translation(Vec3::new(0.9, 0.8, 0.5)), Vec3::new(0.9, 0.8, 0.3)),
    ];

    entries
        .into_iter()
        .filter_map(|(name, mesh, model, albedo)| match mesh {
            Ok(mesh) => Some(
                SceneObject::new(GpuMesh::upload(device, &mesh))
                    .with_transform(model)
                    .with_albedo(albedo),
            ),
            Err(e) => {
                log::warn!("Skipping mesh '{}': {}", name, e);
                None
            }
        })
        .collect()
}

/// Flat-shaded tetrahedron resting on its base, apex up
fn tetrahedron(size: f32) -> Result<MeshData, MeshError> {
    let corners = [
        Vec3::new(-size, 0.0, -size),
        Vec3::new(size, 0.0, -size),
        Vec3::new(0.0, 0.0, size),
        Vec3::new(0.0, size * 1.5, 0.0),
    ];
    let centroid = corners.iter().copied().sum::<Vec3>() / 4.0;

    let mut vertices = Vec::with_capacity(12);
    for [a, b, c] in [[0, 1, 2], [0, 1, 3], [1, 2, 3], [2, 0, 3]] {
        let (pa, mut pb, mut pc) = (corners[a], corners[b], corners[c]);
        let mut normal = (pb - pa).cross(pc - pa).normalize_or_zero();
        // Wind every face counter-clockwise seen from outside
        if normal.dot(pa - centroid) < 0.0 {
            std::mem::swap(&mut pb, &mut pc);
            normal = -normal;
        }
        for p in [pa, pb, pc] {
            vertices.push(Vertex::new(p.to_array(), normal.to_array()));
        }
    }
    let indices = (0..vertices.len() as u32).collect();
    MeshData::new(vertices, indices, Vec::new())
}
