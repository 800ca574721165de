//! Per-frame pipeline state machine

use crate::{Error, Result};

/// Stage of the frame currently being recorded
///
/// `Idle → Rsm → GBuffer → Blur → Composite → Presented → Idle`, one cycle
/// per frame. Transitions are strictly single-step.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Rsm,
    GBuffer,
    Blur,
    Composite,
    Presented,
}

impl FrameState {
    /// The only state reachable from `self`
    pub fn successor(self) -> Self {
        match self {
            FrameState::Idle => FrameState::Rsm,
            FrameState::Rsm => FrameState::GBuffer,
            FrameState::GBuffer => FrameState::Blur,
            FrameState::Blur => FrameState::Composite,
            FrameState::Composite => FrameState::Presented,
            FrameState::Presented => FrameState::Idle,
        }
    }

    pub fn advance_to(&mut self, next: FrameState) -> Result<()> {
        if self.successor() != next {
            return Err(Error::Graph(format!(
                "illegal frame transition {:?} -> {:?} (expected {:?})",
                self,
                next,
                self.successor()
            )));
        }
        log::trace!("Frame state {:?} -> {:?}", self, next);
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_returns_to_idle() {
        let mut state = FrameState::Idle;
        for next in [
            FrameState::Rsm,
            FrameState::GBuffer,
            FrameState::Blur,
            FrameState::Composite,
            FrameState::Presented,
            FrameState::Idle,
        ] {
            state.advance_to(next).unwrap();
        }
        assert_eq!(state, FrameState::Idle);
    }

    #[test]
    fn skipped_stage_is_rejected() {
        let mut state = FrameState::Rsm;
        assert!(matches!(state.advance_to(FrameState::Blur), Err(Error::Graph(_))));
        assert_eq!(state, FrameState::Rsm);
    }

    #[test]
    fn repeated_stage_is_rejected() {
        let mut state = FrameState::GBuffer;
        assert!(state.advance_to(FrameState::GBuffer).is_err());
    }
}
