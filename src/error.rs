//! Error taxonomy for the composition/replay/compile pipeline.
//!
//! One variant per row of the error table: ChannelConflict, Alignment,
//! MissingStartState, PhysicsViolation, Composition, Overflow, Internal.
//! Every variant carries enough context to diagnose the offending step
//! without re-walking the arena.

use crate::arena::NodeId;
use crate::channel::ChannelId;

/// Errors raised while encoding a [`ChannelId`](crate::channel::ChannelId)
/// from a board-identifier string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelIdError {
    #[error("board identifier {0:?} has no trailing \"_<n>\" suffix")]
    MalformedBoardId(String),
    #[error("board identifier {0:?} suffix is not a valid board index")]
    NonNumericBoardIndex(String),
}

/// A recorded illegal hardware-state transition: the channel, the state it
/// was in, the opcode that was rejected, and the payload that accompanied
/// it. `before` is captured via `Debug` at the point of failure so this
/// error doesn't need to be generic over the caller's state representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("channel {channel:?}, opcode 0x{opcode:04x}, from state {before}")]
pub struct TransitionContext {
    pub channel: ChannelId,
    pub before: String,
    pub opcode: u16,
    pub payload: Vec<u8>,
}

/// The unified error type for every fallible public operation in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// `BoundMorphism::parallel` (`|`) was given operands whose channel sets
    /// intersect.
    #[error("parallel composition requires disjoint channels, found overlap: {overlapping:?}")]
    ChannelConflict { overlapping: Vec<ChannelId> },

    /// [`MorphismPath::align`](crate::path::MorphismPath::align) was asked
    /// to align to a duration shorter than the path already has.
    #[error("cannot align channel {channel:?}: path duration {current} exceeds target {target}")]
    Alignment {
        channel: ChannelId,
        current: u64,
        target: u64,
    },

    /// The replayer was not given a start state for a channel the
    /// `BoundMorphism` touches.
    #[error("missing start state for channel {channel:?}")]
    MissingStartState { channel: ChannelId },

    /// The hardware-state machine rejected a transition.
    #[error("illegal hardware-state transition: {0}")]
    PhysicsViolation(#[from] TransitionContext),

    /// An arena composition precondition was violated.
    #[error("composition error: {0}")]
    Composition(#[from] CompositionError),

    /// Cumulative compiled time exceeded `u64`.
    #[error("time overflow while compiling node {node:?}: base {base} + duration {duration}")]
    Overflow { node: NodeId, base: u64, duration: u64 },

    /// The arena graph violated an internal invariant (dangling id,
    /// wrong-variant child). Unreachable through the public API; indicates a
    /// bug in this crate rather than caller misuse.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Sub-errors raised by [`Arena`](crate::arena::Arena) composition helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    #[error("compose_sequence requires at least one child")]
    EmptySequence,
    #[error("parallel_compose_many requires at least one child")]
    EmptyParallel,
    #[error("compose_sequence children must share one channel, found {0:?} and {1:?}")]
    MixedChannels(ChannelId, ChannelId),
    #[error("parallel_compose_many requires disjoint channel sets, found overlap: {0:?}")]
    OverlappingChannels(Vec<ChannelId>),
}
