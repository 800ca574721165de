//! Render graph with explicit resource dependencies
//!
//! Passes declare which targets they read and write. The graph orders them
//! so that every reader runs after the writer of its inputs, rejects cycles
//! and read/write hazards at build time, and tracks resource states while
//! recording each frame.

mod frame;
mod pass;
mod resource;

pub use frame::FrameState;
pub use pass::{FrameInputs, PassContext, RenderPass, SetupContext};
pub use resource::{PassId, ResourceHandle, ResourceState, ResourceStates};

use crate::resources::{DrawUniforms, FrameTargets};
use crate::{Error, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Render graph for dependency-ordered pass execution
pub struct RenderGraph {
    passes: Vec<PassNode>,
    execution_order: Vec<usize>,
    states: ResourceStates,
    frame_state: FrameState,
    built: bool,
}

struct PassNode {
    pass: Box<dyn RenderPass>,
    reads: Vec<ResourceHandle>,
    writes: Vec<ResourceWrite>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ResourceWrite {
    handle: ResourceHandle,
    depth: bool,
    /// Sampled again by the writing pass after it is rendered
    reread: bool,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            execution_order: Vec::new(),
            states: ResourceStates::new(),
            frame_state: FrameState::Idle,
            built: false,
        }
    }

    /// Add a pass to the graph
    pub fn add_pass(&mut self, pass: impl RenderPass + 'static) -> PassId {
        let id = PassId(self.passes.len());

        let mut builder = PassResourceBuilder::new();
        pass.declare_resources(&mut builder);

        self.passes.push(PassNode {
            pass: Box::new(pass),
            reads: builder.reads,
            writes: builder.writes,
        });
        self.built = false;
        id
    }

    /// Build the graph - resolve dependencies and determine execution order
    pub fn build(&mut self) -> Result<()> {
        log::info!("Building render graph with {} passes", self.passes.len());

        // Collect all writers first so ordering is independent of registration order
        let mut writers: HashMap<ResourceHandle, usize> = HashMap::new();
        for (i, node) in self.passes.iter().enumerate() {
            for write in &node.writes {
                if node.reads.contains(&write.handle) {
                    return Err(Error::Graph(format!(
                        "pass '{}' reads and writes '{}' in the same pass",
                        node.pass.name(),
                        write.handle.name()
                    )));
                }
                if let Some(&other) = writers.get(&write.handle) {
                    return Err(Error::Graph(format!(
                        "resource '{}' written by both '{}' and '{}'",
                        write.handle.name(),
                        self.passes[other].pass.name(),
                        node.pass.name()
                    )));
                }
                writers.insert(write.handle, i);
            }
        }

        let mut dag: DiGraph<usize, ResourceHandle> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.passes.len()).map(|i| dag.add_node(i)).collect();

        for (i, node) in self.passes.iter().enumerate() {
            for &resource in &node.reads {
                let Some(&writer) = writers.get(&resource) else {
                    return Err(Error::Graph(format!(
                        "pass '{}' reads '{}' which no pass writes",
                        node.pass.name(),
                        resource.name()
                    )));
                };
                dag.update_edge(nodes[writer], nodes[i], resource);
            }
        }

        let sorted = toposort(&dag, None).map_err(|cycle| {
            let pass = &self.passes[dag[cycle.node_id()]];
            Error::Graph(format!(
                "Cyclic dependency detected in render graph at pass '{}'",
                pass.pass.name()
            ))
        })?;
        let order: Vec<usize> = sorted.into_iter().map(|n| dag[n]).collect();

        // The recorded order must walk the frame state machine one step at a time
        let mut stage = FrameState::Idle;
        for &i in &order {
            let pass = &self.passes[i].pass;
            if stage.successor() != pass.stage() {
                return Err(Error::Graph(format!(
                    "pass '{}' records stage {:?} but the graph is at {:?}",
                    pass.name(),
                    pass.stage(),
                    stage
                )));
            }
            stage = pass.stage();
        }

        for (i, &pass_idx) in order.iter().enumerate() {
            log::info!("  Pass {}: {}", i, self.passes[pass_idx].pass.name());
        }

        self.execution_order = order;
        self.built = true;
        log::info!("Render graph built successfully");
        Ok(())
    }

    /// Run every pass's one-time setup in execution order
    pub fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        self.ensure_built()?;
        for &pass_idx in &self.execution_order {
            let pass = &mut self.passes[pass_idx].pass;
            log::debug!("Setting up pass: {}", pass.name());
            pass.setup(ctx)?;
        }
        Ok(())
    }

    /// Record one frame
    ///
    /// On failure the frame is abandoned and the state machine returns to
    /// `Idle`, so the next frame starts clean.
    pub fn execute(&mut self, ctx: &mut GraphContext) -> Result<()> {
        log::trace!("Executing render graph (frame {})", ctx.frame.frame);

        self.walk_frame(|pass| {
            let mut pass_ctx = PassContext {
                encoder: &mut *ctx.encoder,
                queue: ctx.queue,
                targets: ctx.targets,
                uniforms: &mut *ctx.uniforms,
                frame: ctx.frame,
                output: ctx.output,
            };
            pass.execute(&mut pass_ctx)
        })
    }

    /// Walk one frame in execution order, advancing the frame state and the
    /// resource states around each `run(pass)` call
    fn walk_frame<F>(&mut self, mut run: F) -> Result<()>
    where
        F: FnMut(&mut dyn RenderPass) -> Result<()>,
    {
        self.ensure_built()?;
        self.states.reset();

        let result = self.walk_passes(&mut run);
        if result.is_err() {
            self.frame_state = FrameState::Idle;
        }
        result
    }

    fn walk_passes(&mut self, run: &mut dyn FnMut(&mut dyn RenderPass) -> Result<()>) -> Result<()> {
        for &pass_idx in &self.execution_order {
            let node = &mut self.passes[pass_idx];
            self.frame_state.advance_to(node.pass.stage())?;
            log::trace!("  Executing pass: {}", node.pass.name());

            for &read in &node.reads {
                self.states.begin_read(read)?;
            }
            for write in &node.writes {
                self.states.begin_write(write.handle, write.depth);
            }

            run(&mut *node.pass)?;

            for write in node.writes.iter().filter(|w| w.reread) {
                self.states.begin_read(write.handle)?;
            }
        }
        Ok(())
    }

    /// Mark the submitted frame presented and return to `Idle`
    pub fn finish_frame(&mut self) -> Result<()> {
        let result = self
            .frame_state
            .advance_to(FrameState::Presented)
            .and_then(|_| self.frame_state.advance_to(FrameState::Idle));
        if result.is_err() {
            self.frame_state = FrameState::Idle;
        }
        result
    }

    pub fn frame_state(&self) -> FrameState {
        self.frame_state
    }

    pub fn resource_state(&self, handle: ResourceHandle) -> ResourceState {
        self.states.state(handle)
    }

    /// Pass names in execution order (empty until built)
    pub fn pass_names(&self) -> Vec<&str> {
        self.execution_order
            .iter()
            .map(|&i| self.passes[i].pass.name())
            .collect()
    }

    fn ensure_built(&self) -> Result<()> {
        if !self.built {
            return Err(Error::Graph("render graph used before build()".into()));
        }
        Ok(())
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Context for graph execution
pub struct GraphContext<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub queue: &'a wgpu::Queue,
    pub targets: &'a FrameTargets,
    pub uniforms: &'a mut DrawUniforms,
    pub frame: &'a FrameInputs<'a>,
    pub output: &'a wgpu::TextureView,
}

/// Builder for declaring pass resource dependencies
pub struct PassResourceBuilder {
    reads: Vec<ResourceHandle>,
    writes: Vec<ResourceWrite>,
}

impl PassResourceBuilder {
    fn new() -> Self {
        Self {
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Declare that this pass samples a resource
    pub fn read(&mut self, resource: ResourceHandle) -> &mut Self {
        self.reads.push(resource);
        self
    }

    /// Declare that this pass renders into a color resource
    pub fn write(&mut self, resource: ResourceHandle) -> &mut Self {
        self.writes.push(ResourceWrite { handle: resource, depth: false, reread: false });
        self
    }

    /// Declare a color resource the pass renders into and then samples
    /// itself, e.g. the intermediate of a two-step separable filter
    ///
    /// Counts as this pass's write for ordering; the resource leaves the
    /// pass in the shader-read state.
    pub fn write_then_read(&mut self, resource: ResourceHandle) -> &mut Self {
        self.writes.push(ResourceWrite { handle: resource, depth: false, reread: true });
        self
    }

    /// Declare that this pass renders into a depth resource
    pub fn write_depth(&mut self, resource: ResourceHandle) -> &mut Self {
        self.writes.push(ResourceWrite { handle: resource, depth: true, reread: false });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        name: &'static str,
        stage: FrameState,
        reads: Vec<&'static str>,
        writes: Vec<&'static str>,
        scratch: Vec<&'static str>,
    }

    impl Stub {
        fn new(name: &'static str, stage: FrameState, reads: &[&'static str], writes: &[&'static str]) -> Self {
            Self { name, stage, reads: reads.to_vec(), writes: writes.to_vec(), scratch: Vec::new() }
        }

        fn with_scratch(mut self, scratch: &'static str) -> Self {
            self.scratch.push(scratch);
            self
        }
    }

    impl RenderPass for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn stage(&self) -> FrameState {
            self.stage
        }

        fn declare_resources(&self, builder: &mut PassResourceBuilder) {
            for &r in &self.reads {
                builder.read(ResourceHandle::named(r));
            }
            for &w in &self.writes {
                builder.write(ResourceHandle::named(w));
            }
            for &s in &self.scratch {
                builder.write_then_read(ResourceHandle::named(s));
            }
        }

        fn execute(&mut self, _ctx: &mut PassContext) -> Result<()> {
            Ok(())
        }
    }

    fn four_stage_graph() -> RenderGraph {
        let mut graph = RenderGraph::new();
        // Registered out of order on purpose
        graph.add_pass(Stub::new("composite", FrameState::Composite, &["blurred", "albedo"], &["surface"]));
        graph.add_pass(Stub::new("blur", FrameState::Blur, &["indirect"], &["blurred"]));
        graph.add_pass(Stub::new("gbuffer", FrameState::GBuffer, &["flux"], &["indirect", "albedo"]));
        graph.add_pass(Stub::new("rsm", FrameState::Rsm, &[], &["flux"]));
        graph
    }

    #[test]
    fn orders_passes_by_dependencies() {
        let mut graph = four_stage_graph();
        graph.build().unwrap();
        assert_eq!(graph.pass_names(), vec!["rsm", "gbuffer", "blur", "composite"]);
    }

    #[test]
    fn detects_cycles() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("a", FrameState::Rsm, &["y"], &["x"]));
        graph.add_pass(Stub::new("b", FrameState::GBuffer, &["x"], &["y"]));
        assert!(matches!(graph.build(), Err(Error::Graph(_))));
    }

    #[test]
    fn rejects_read_write_of_same_resource() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("rsm", FrameState::Rsm, &[], &["x"]));
        graph.add_pass(Stub::new("blur", FrameState::GBuffer, &["x", "y"], &["y"]));
        assert!(matches!(graph.build(), Err(Error::Graph(_))));
    }

    #[test]
    fn rejects_read_without_writer() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("rsm", FrameState::Rsm, &["missing"], &["x"]));
        assert!(graph.build().is_err());
    }

    #[test]
    fn rejects_two_writers() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("a", FrameState::Rsm, &[], &["x"]));
        graph.add_pass(Stub::new("b", FrameState::GBuffer, &[], &["x"]));
        assert!(graph.build().is_err());
    }

    #[test]
    fn rejects_skipped_stage() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("rsm", FrameState::Rsm, &[], &["x"]));
        graph.add_pass(Stub::new("blur", FrameState::Blur, &["x"], &["y"]));
        assert!(matches!(graph.build(), Err(Error::Graph(_))));
    }

    #[test]
    fn finishing_without_recording_is_rejected() {
        let mut graph = four_stage_graph();
        graph.build().unwrap();
        assert_eq!(graph.frame_state(), FrameState::Idle);
        // Nothing was recorded, so presenting now skips every stage
        assert!(graph.finish_frame().is_err());
        assert_eq!(graph.frame_state(), FrameState::Idle);
    }

    #[test]
    fn walking_before_build_is_rejected() {
        let mut graph = four_stage_graph();
        let mut calls = 0;
        let result = graph.walk_frame(|_| {
            calls += 1;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Graph(_))));
        assert_eq!(calls, 0);
    }

    #[test]
    fn frame_walk_advances_one_stage_per_pass() {
        let mut graph = four_stage_graph();
        graph.build().unwrap();

        let mut seen = Vec::new();
        graph
            .walk_frame(|pass| {
                seen.push((pass.name().to_string(), pass.stage()));
                Ok(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                ("rsm".to_string(), FrameState::Rsm),
                ("gbuffer".to_string(), FrameState::GBuffer),
                ("blur".to_string(), FrameState::Blur),
                ("composite".to_string(), FrameState::Composite),
            ]
        );
        assert_eq!(graph.frame_state(), FrameState::Composite);
        graph.finish_frame().unwrap();
        assert_eq!(graph.frame_state(), FrameState::Idle);
    }

    #[test]
    fn resource_states_follow_the_walk() {
        let mut graph = four_stage_graph();
        graph.build().unwrap();

        graph.walk_frame(|_| Ok(())).unwrap();

        let state = |name| graph.resource_state(ResourceHandle::named(name));
        assert_eq!(state("flux"), ResourceState::ShaderRead);
        assert_eq!(state("indirect"), ResourceState::ShaderRead);
        assert_eq!(state("blurred"), ResourceState::ShaderRead);
        assert_eq!(state("albedo"), ResourceState::ShaderRead);
        assert_eq!(state("surface"), ResourceState::ColorTarget);
    }

    #[test]
    fn failing_pass_abandons_the_frame() {
        let mut graph = four_stage_graph();
        graph.build().unwrap();

        let mut ran = Vec::new();
        let result = graph.walk_frame(|pass| {
            ran.push(pass.name().to_string());
            if pass.stage() == FrameState::GBuffer {
                return Err(Error::Resource("lost target".into()));
            }
            Ok(())
        });
        assert!(matches!(result, Err(Error::Resource(_))));
        assert_eq!(ran, vec!["rsm", "gbuffer"]);
        assert_eq!(graph.frame_state(), FrameState::Idle);

        // The next frame starts from a clean state
        graph.walk_frame(|_| Ok(())).unwrap();
        assert_eq!(graph.frame_state(), FrameState::Composite);
        graph.finish_frame().unwrap();
    }

    #[test]
    fn walking_again_without_presenting_is_rejected() {
        let mut graph = four_stage_graph();
        graph.build().unwrap();
        graph.walk_frame(|_| Ok(())).unwrap();

        let mut calls = 0;
        let result = graph.walk_frame(|_| {
            calls += 1;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Graph(_))));
        assert_eq!(calls, 0);
        assert_eq!(graph.frame_state(), FrameState::Idle);
    }

    #[test]
    fn scratch_targets_end_the_pass_as_shader_read() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("rsm", FrameState::Rsm, &[], &["flux"]));
        graph.add_pass(Stub::new("gbuffer", FrameState::GBuffer, &["flux"], &["indirect"]));
        graph.add_pass(Stub::new("blur", FrameState::Blur, &["indirect"], &["blurred"]).with_scratch("temp"));
        graph.add_pass(Stub::new("composite", FrameState::Composite, &["blurred"], &["surface"]));
        graph.build().unwrap();

        graph.walk_frame(|_| Ok(())).unwrap();
        assert_eq!(graph.resource_state(ResourceHandle::named("temp")), ResourceState::ShaderRead);
        assert_eq!(graph.resource_state(ResourceHandle::named("blurred")), ResourceState::ShaderRead);
    }

    #[test]
    fn scratch_target_still_has_a_single_writer() {
        let mut graph = RenderGraph::new();
        graph.add_pass(Stub::new("rsm", FrameState::Rsm, &[], &["temp"]));
        graph.add_pass(Stub::new("gbuffer", FrameState::GBuffer, &[], &["x"]).with_scratch("temp"));
        assert!(matches!(graph.build(), Err(Error::Graph(_))));
    }

    #[test]
    fn blur_pass_declares_its_temp_target_as_scratch() {
        let mut graph = RenderGraph::new();
        graph.add_pass(crate::passes::BlurPass::new(4));
        let node = &graph.passes[0];
        let temp = node
            .writes
            .iter()
            .find(|w| w.handle == crate::resources::BLUR_TEMP)
            .copied();
        assert_eq!(
            temp,
            Some(ResourceWrite { handle: crate::resources::BLUR_TEMP, depth: false, reread: true })
        );
        assert!(node
            .writes
            .iter()
            .any(|w| w.handle == crate::resources::BLUR_OUTPUT && !w.reread));
    }
}
