//! The Replayer: walks a [`BoundMorphism`]'s per-channel paths, advances
//! hardware state against a pluggable [`HardwareStateMachine`], and
//! materialises verified atomic/sequence nodes into the [`Arena`].
//!
//! Every step's `next` call result is threaded forward across the whole
//! path and is what ends up recorded in `end_states` — state actually
//! advances across the replay rather than being carried through unchanged.

use std::collections::BTreeMap;

use crate::arena::{Arena, NodeId};
use crate::bound::BoundMorphism;
use crate::channel::ChannelId;
use crate::error::CoreError;
use crate::state::HardwareStateMachine;

/// A replayed, arena-resident morphism: a verified root node plus the
/// per-channel end state reached after walking every step.
#[derive(Clone, Debug)]
pub struct ClosedMorphism<S> {
    pub node_id: NodeId,
    pub end_states: BTreeMap<ChannelId, S>,
}

impl<S> ClosedMorphism<S> {
    /// Compiles this morphism's subgraph to a flat, time-sorted event
    /// stream, consulting `arena`'s incremental cache if enabled.
    pub fn compile(&self, arena: &mut Arena) -> Result<Vec<crate::compiler::Event>, CoreError> {
        arena.compile_graph(self.node_id)
    }

    /// As [`Self::compile`], grouped by board index.
    pub fn compile_by_board(
        &self,
        arena: &Arena,
    ) -> Result<std::collections::HashMap<u16, Vec<crate::compiler::Event>>, CoreError> {
        crate::compiler::compile_by_board(arena, self.node_id)
    }
}

/// Replays `bound` against `start_states` using `machine`, materialising
/// verified nodes into `arena`.
///
/// Channels are processed in ascending `ChannelId` order (guaranteed by
/// `BoundMorphism`'s internal `BTreeMap`), so node-id assignment — and
/// therefore the resulting graph — is deterministic given identical inputs.
pub fn replay<M: HardwareStateMachine>(
    bound: &BoundMorphism,
    start_states: &BTreeMap<ChannelId, M::State>,
    machine: &M,
    arena: &mut Arena,
) -> Result<ClosedMorphism<M::State>, CoreError> {
    if bound.is_empty() {
        return Err(CoreError::Internal("cannot replay an empty BoundMorphism".to_string()));
    }

    let mut end_states = BTreeMap::new();
    let mut per_channel_roots = Vec::with_capacity(bound.channels().len());

    for (channel, path) in bound.paths() {
        let mut state = start_states
            .get(channel)
            .cloned()
            .ok_or(CoreError::MissingStartState { channel: *channel })?;

        let mut step_ids = Vec::with_capacity(path.len());
        for (duration, opcode, payload) in path.iter() {
            state = match machine.next(*channel, &state, opcode, payload) {
                Ok(next_state) => {
                    tracing::trace!(?channel, opcode, duration, "transition accepted");
                    next_state
                }
                Err(context) => {
                    tracing::warn!(?channel, opcode, before = %context.before, "transition rejected");
                    return Err(CoreError::PhysicsViolation(context));
                }
            };
            let id = arena.atomic(*channel, duration, opcode, payload.to_vec());
            step_ids.push(id);
        }

        if !step_ids.is_empty() {
            let seq_id = arena.compose_sequence(&step_ids)?;
            per_channel_roots.push(seq_id);
        }

        end_states.insert(*channel, state);
    }

    let root = if per_channel_roots.len() == 1 {
        per_channel_roots[0]
    } else {
        arena.parallel_compose_many(&per_channel_roots)?
    };

    Ok(ClosedMorphism { node_id: root, end_states })
}

/// Convenience extension so callers can write `bound.replay(&states, &machine, &mut arena)`.
pub trait Replay {
    fn replay<M: HardwareStateMachine>(
        &self,
        start_states: &BTreeMap<ChannelId, M::State>,
        machine: &M,
        arena: &mut Arena,
    ) -> Result<ClosedMorphism<M::State>, CoreError>;
}

impl Replay for BoundMorphism {
    fn replay<M: HardwareStateMachine>(
        &self,
        start_states: &BTreeMap<ChannelId, M::State>,
        machine: &M,
        arena: &mut Arena,
    ) -> Result<ClosedMorphism<M::State>, CoreError> {
        replay(self, start_states, machine, arena)
    }
}
