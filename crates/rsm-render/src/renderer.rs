//! Frame orchestrator
//!
//! Owns every GPU resource of the pipeline (targets, per-draw uniforms,
//! pipelines, pass-owned buffers) and drives the render graph once per
//! `render_frame` call. Dropping the renderer releases all of it.

use crate::camera::CameraPose;
use crate::config::RendererConfig;
use crate::graph::{FrameInputs, FrameState, GraphContext, RenderGraph, SetupContext};
use crate::kernel::{generate_kernel, generate_noise_tile, NoiseTile, SampleKernel};
use crate::passes::{BlurPass, CompositePass, GBufferPass, RsmPass};
use crate::pipeline::PipelineCache;
use crate::resources::{DrawUniforms, FrameTargets, GBUFFER_ALBEDO};
use crate::scene::SceneObject;
use crate::{Error, Result};
use std::sync::Arc;

/// Frames between two frame-time log lines
const STATS_INTERVAL: u64 = 120;

/// Checks the `render_frame` preconditions shared by the GPU and CPU paths
pub(crate) fn validate_frame_inputs(camera: &CameraPose, object_count: usize, delta_time: f32) -> Result<()> {
    if object_count == 0 {
        return Err(Error::InvalidInput("render_frame needs at least one mesh".into()));
    }
    camera.validate()?;
    if !delta_time.is_finite() || delta_time < 0.0 {
        return Err(Error::InvalidInput(format!(
            "delta_time must be finite and non-negative, got {}",
            delta_time
        )));
    }
    Ok(())
}

/// Running frame-time statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    frames: u64,
    window_time: f64,
    window_frames: u64,
    last_average_ms: Option<f64>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame; every `STATS_INTERVAL` frames the window average is
    /// logged and becomes [`FrameStats::average_ms`].
    pub fn record(&mut self, delta_time: f32) {
        self.frames += 1;
        self.window_frames += 1;
        self.window_time += delta_time as f64;

        if self.window_frames == STATS_INTERVAL {
            let average_ms = self.window_time * 1000.0 / self.window_frames as f64;
            log::debug!("{:.3} ms/frame (average over {} frames)", average_ms, self.window_frames);
            self.last_average_ms = Some(average_ms);
            self.window_time = 0.0;
            self.window_frames = 0;
        }
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Average frame time of the last completed window, in milliseconds
    pub fn average_ms(&self) -> Option<f64> {
        self.last_average_ms
    }
}

/// RSM renderer: reflective shadow map, GBuffer + gather, blur, composite
pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: RendererConfig,
    graph: RenderGraph,
    targets: FrameTargets,
    uniforms: DrawUniforms,
    pipelines: PipelineCache,
    kernel: SampleKernel,
    noise: NoiseTile,
    output_size: (u32, u32),
    stats: FrameStats,
}

impl Renderer {
    /// Create every target, buffer and pipeline the frame needs
    ///
    /// Any wgpu validation or allocation failure during creation is reported
    /// as [`Error::Init`]; there is no degraded mode.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, config: RendererConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Initializing RSM renderer: output {}x{}, RSM {:?}, {} gather samples",
            config.width,
            config.height,
            config.rsm_extent(),
            config.gather.sample_count
        );

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let built = Self::create_resources(&device, &queue, &config);

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            log::error!("Renderer initialization failed: {}", err);
            return Err(Error::Init(err.to_string()));
        }
        let (graph, targets, uniforms, pipelines, kernel, noise) = built?;

        log::info!(
            "Renderer ready: {} targets, {} pipelines, passes {:?}",
            targets.len(),
            pipelines.len(),
            graph.pass_names()
        );

        Ok(Self {
            output_size: (config.width, config.height),
            device,
            queue,
            config,
            graph,
            targets,
            uniforms,
            pipelines,
            kernel,
            noise,
            stats: FrameStats::new(),
        })
    }

    #[allow(clippy::type_complexity)]
    fn create_resources(
        device: &Arc<wgpu::Device>,
        queue: &wgpu::Queue,
        config: &RendererConfig,
    ) -> Result<(RenderGraph, FrameTargets, DrawUniforms, PipelineCache, SampleKernel, NoiseTile)> {
        let kernel = generate_kernel(config.gather.sample_count, config.kernel_seed);
        let noise = generate_noise_tile(config.noise_size, config.noise_seed);
        log::debug!("Generated {} kernel samples and {} noise vectors", kernel.len(), noise.vectors().len());

        let targets = FrameTargets::new(device, config);
        let uniforms = DrawUniforms::new(device);
        let mut pipelines = PipelineCache::new(device.clone());

        let mut graph = RenderGraph::new();
        graph.add_pass(RsmPass::new(config.light));
        graph.add_pass(GBufferPass::new(config.light, config.gather));
        graph.add_pass(BlurPass::new(config.blur.radius));
        graph.add_pass(CompositePass::new(config.light, config.composite));
        graph.build()?;

        let mut setup = SetupContext {
            device,
            queue,
            config,
            targets: &targets,
            uniforms: &uniforms,
            pipelines: &mut pipelines,
            kernel: &kernel,
            noise: &noise,
        };
        graph.setup(&mut setup)?;

        Ok((graph, targets, uniforms, pipelines, kernel, noise))
    }

    /// Render one frame into `output`
    ///
    /// `objects` must be non-empty, the camera pose finite and non-degenerate,
    /// and `delta_time` non-negative. All four passes are recorded into one
    /// encoder and submitted once; the caller presents `output` afterwards.
    pub fn render_frame(
        &mut self,
        camera: &CameraPose,
        objects: &[SceneObject],
        delta_time: f32,
        output: &wgpu::TextureView,
    ) -> Result<()> {
        validate_frame_inputs(camera, objects.len(), delta_time)?;

        let frame = self.stats.frame_count();
        log::trace!("Rendering frame {}", frame);

        // RSM and GBuffer each draw every object once
        self.uniforms.begin(&self.device, objects.len() * 2);

        // The camera renders into the fixed-size GBuffer, not the back buffer
        let (width, height) = self.targets.get(GBUFFER_ALBEDO)?.size();
        let inputs = FrameInputs {
            objects,
            camera_view: camera.view(),
            camera_projection: camera.projection(width as f32 / height as f32),
            output_size: self.output_size,
            frame,
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("RSM Frame Encoder"),
        });

        let mut graph_ctx = GraphContext {
            encoder: &mut encoder,
            queue: &self.queue,
            targets: &self.targets,
            uniforms: &mut self.uniforms,
            frame: &inputs,
            output,
        };
        self.graph.execute(&mut graph_ctx)?;

        self.queue.submit(Some(encoder.finish()));
        self.graph.finish_frame()?;
        self.stats.record(delta_time);
        Ok(())
    }

    /// Record a new back-buffer size
    ///
    /// Intermediate targets keep their creation size; the composite pass
    /// rescales its lookup so the GBuffer still covers the whole output.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {}x{}", width, height);
            return;
        }
        if (width, height) == self.output_size {
            return;
        }
        log::warn!(
            "Back buffer resized to {}x{}; RSM and GBuffer targets stay at {}x{}",
            width,
            height,
            self.config.width,
            self.config.height
        );
        self.output_size = (width, height);
    }

    /// Release every GPU resource owned by the renderer
    pub fn shutdown(self) {
        log::info!("Shutting down RSM renderer after {} frames", self.stats.frame_count());
        drop(self);
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn targets(&self) -> &FrameTargets {
        &self.targets
    }

    pub fn kernel(&self) -> &SampleKernel {
        &self.kernel
    }

    pub fn noise(&self) -> &NoiseTile {
        &self.noise
    }

    pub fn frame_state(&self) -> FrameState {
        self.graph.frame_state()
    }

    /// Number of distinct pipelines created for the passes
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
