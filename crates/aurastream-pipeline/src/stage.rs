//! Shared plumbing every ramping/flow-control stage builds on (spec.md §4.4).
//!
//! Every stage is a pull source: it wraps an upstream [`MsgSource`] and is
//! itself one, so the pipeline reads as a chain, `stageN.pull()` calling
//! `stageN-1.pull()` and so on down to a reservoir, the only place a pull
//! may actually block. Control-plane calls (`play`/`pause`/`seek`/...)
//! never touch this trait: they mutate a stage's shared state directly
//! and the next `pull()` observes the change.

use aurastream_core::msg::Msg;

/// A pull source of pipeline messages. Stages compose by wrapping one
/// `MsgSource` and exposing themselves as another.
pub trait MsgSource: Send {
    fn pull(&mut self) -> Msg;
}

/// The state machine shared by every ramping stage (spec.md §4.4): a
/// stage starts `Running`, may be asked to ramp down to `RampedDown`
/// (optionally reversing back to `RampingUp` mid-flight, per the ramp
/// reversal invariant in spec.md §8 property 4), and ramps back up to
/// `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampState {
    Starting,
    Running,
    RampingDown,
    RampedDown,
    RampingUp,
}

impl RampState {
    pub fn is_ramped_down(self) -> bool {
        matches!(self, RampState::RampedDown)
    }

    pub fn is_active_ramp(self) -> bool {
        matches!(self, RampState::RampingDown | RampState::RampingUp)
    }
}
