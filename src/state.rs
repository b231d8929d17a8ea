//! The `HardwareStateMachine` collaborator: a per-channel capability that
//! advances an opaque state across an opcode/payload transition.
//!
//! The core never inspects `State` beyond requiring `Clone + Debug` (`Debug`
//! is needed only to stringify the `before` state into a
//! [`TransitionContext`](crate::error::TransitionContext) when a transition
//! is rejected). Callers supply their own state type and machine; this
//! module also ships [`AcceptAll`], a trivial machine for tests and for
//! callers that don't need transition checking.

use std::fmt::Debug;

use crate::channel::ChannelId;
use crate::error::TransitionContext;

/// Per-channel hardware-state transition capability.
///
/// `next` is consulted once per step during replay (see
/// [`crate::replay`]); a rejected transition aborts the whole replay with
/// [`crate::error::CoreError::PhysicsViolation`].
pub trait HardwareStateMachine {
    type State: Clone + Debug;

    /// Advances `state` across `(opcode, payload)` on `channel`, or rejects
    /// the transition.
    fn next(
        &self,
        channel: ChannelId,
        state: &Self::State,
        opcode: u16,
        payload: &[u8],
    ) -> Result<Self::State, TransitionContext>;
}

/// A machine that accepts every transition unchanged. Provided for testing
/// and for callers whose opcodes carry no state-machine semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll<S> {
    _marker: std::marker::PhantomData<fn() -> S>,
}

impl<S> AcceptAll<S> {
    pub fn new() -> Self {
        AcceptAll {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<S: Clone + Debug> HardwareStateMachine for AcceptAll<S> {
    type State = S;

    fn next(
        &self,
        _channel: ChannelId,
        state: &Self::State,
        _opcode: u16,
        _payload: &[u8],
    ) -> Result<Self::State, TransitionContext> {
        Ok(state.clone())
    }
}
