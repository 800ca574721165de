//! Resource handles and per-frame state tracking for graph resources

use crate::{Error, Result};
use std::collections::HashMap;

/// Pass identifier
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct PassId(pub usize);

/// Resource handle for graph resources
///
/// Handles are compared by name, so two passes naming the same target
/// refer to the same resource.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct ResourceHandle(&'static str);

impl ResourceHandle {
    /// Create a named resource handle (deterministic)
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// Usage state of a graph resource within the current frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Not written yet this frame; contents are stale
    Undefined,
    ColorTarget,
    DepthTarget,
    ShaderRead,
}

/// Tracks the state of every graph resource across the passes of one frame
///
/// Every resource starts the frame `Undefined`. A write moves it to a target
/// state, a read moves it to `ShaderRead`. Reading an `Undefined` resource is
/// rejected: no pass may consume a target that an earlier pass of the same
/// frame has not produced.
#[derive(Debug, Default)]
pub struct ResourceStates {
    states: HashMap<ResourceHandle, ResourceState>,
}

impl ResourceStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: every known resource becomes `Undefined`
    pub fn reset(&mut self) {
        for state in self.states.values_mut() {
            *state = ResourceState::Undefined;
        }
    }

    pub fn state(&self, handle: ResourceHandle) -> ResourceState {
        self.states.get(&handle).copied().unwrap_or(ResourceState::Undefined)
    }

    /// Transition `handle` into a render-target state for writing
    pub fn begin_write(&mut self, handle: ResourceHandle, depth: bool) {
        let next = if depth { ResourceState::DepthTarget } else { ResourceState::ColorTarget };
        let previous = self.states.insert(handle, next).unwrap_or(ResourceState::Undefined);
        log::trace!("    {}: {:?} -> {:?}", handle.name(), previous, next);
    }

    /// Transition `handle` into the sampled-read state
    pub fn begin_read(&mut self, handle: ResourceHandle) -> Result<()> {
        let previous = self.state(handle);
        if previous == ResourceState::Undefined {
            return Err(Error::Graph(format!(
                "resource '{}' read before it was written this frame",
                handle.name()
            )));
        }
        self.states.insert(handle, ResourceState::ShaderRead);
        log::trace!("    {}: {:?} -> {:?}", handle.name(), previous, ResourceState::ShaderRead);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ResourceHandle = ResourceHandle::named("a");
    const B: ResourceHandle = ResourceHandle::named("b");

    #[test]
    fn named_handles_compare_by_name() {
        assert_eq!(ResourceHandle::named("a"), A);
        assert_ne!(A, B);
    }

    #[test]
    fn read_before_write_is_rejected() {
        let mut states = ResourceStates::new();
        assert!(matches!(states.begin_read(A), Err(Error::Graph(_))));
    }

    #[test]
    fn write_then_read_transitions() {
        let mut states = ResourceStates::new();
        states.begin_write(A, false);
        assert_eq!(states.state(A), ResourceState::ColorTarget);
        states.begin_read(A).unwrap();
        assert_eq!(states.state(A), ResourceState::ShaderRead);

        states.begin_write(B, true);
        assert_eq!(states.state(B), ResourceState::DepthTarget);
    }

    #[test]
    fn reset_invalidates_previous_frame() {
        let mut states = ResourceStates::new();
        states.begin_write(A, false);
        states.reset();
        assert_eq!(states.state(A), ResourceState::Undefined);
        assert!(states.begin_read(A).is_err());
    }
}
