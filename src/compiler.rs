//! 编译器 - 将 Morphism 树展平为时间排序的事件列表
//!
//! The Compiler: a non-recursive post-order traversal of the arena DAG that
//! assigns absolute times and emits a `(time, channel, opcode, payload)`
//! event stream, sorted by `(time, channel)` with emission order as the
//! tie-break.
//!
//! Uses an explicit work stack (no recursion, so depth is bounded by
//! available memory rather than the call stack) over n-ary `Sequence`/
//! `Parallel` arena nodes; `u64` overflow on cumulative time is turned into
//! a `CoreError::Overflow` instead of silently wrapping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arena::{Arena, Node, NodeId};
use crate::channel::ChannelId;
use crate::error::CoreError;

/// One compiled output event: an opaque opcode/payload fired on `channel_id`
/// at absolute `time`.
#[derive(Debug, Clone)]
pub struct Event {
    pub time: u64,
    pub channel_id: ChannelId,
    pub opcode: u16,
    pub payload: Arc<[u8]>,
}

/// Compiles `root` to a flat, `(time, channel)`-sorted event list.
///
/// Non-recursive: uses an explicit work stack so traversal depth is bounded
/// only by available memory, not the call stack (see `Arena`'s own deep
/// serial chain tests).
pub fn compile(arena: &Arena, root: NodeId) -> Result<Vec<Event>, CoreError> {
    let mut stack = vec![(root, 0u64)];
    let mut events = Vec::new();

    while let Some((node_id, start_time)) = stack.pop() {
        match arena.get(node_id) {
            Node::Atomic { channel_id, duration: _, opcode, payload } => {
                events.push(Event {
                    time: start_time,
                    channel_id: *channel_id,
                    opcode: *opcode,
                    payload: payload.clone(),
                });
            }
            Node::Sequence { children, .. } => {
                // Pushed in reverse so the first child is popped (and thus
                // visited) first, preserving emission order for the stable
                // (time, channel) tie-break.
                let mut base = start_time;
                let mut offsets = Vec::with_capacity(children.len());
                for &child in children {
                    offsets.push((child, base));
                    let child_duration = arena.get(child).duration();
                    base = base
                        .checked_add(child_duration)
                        .ok_or(CoreError::Overflow { node: child, base, duration: child_duration })?;
                }
                stack.extend(offsets.into_iter().rev());
            }
            Node::Parallel { children, .. } => {
                stack.extend(children.iter().rev().map(|&c| (c, start_time)));
            }
        }
    }

    events.sort_by_key(|e| (e.time, e.channel_id));
    tracing::debug!(root = root, event_count = events.len(), "compiled node to event stream");
    Ok(events)
}

/// As [`compile`], but grouped by board index (high 16 bits of `channel_id`).
/// Within each board's list, the `(time, channel)` ordering from `compile`
/// still holds.
pub fn compile_by_board(arena: &Arena, root: NodeId) -> Result<HashMap<u16, Vec<Event>>, CoreError> {
    let events = compile(arena, root)?;
    let mut grouped: HashMap<u16, Vec<Event>> = HashMap::new();
    for event in events {
        grouped.entry(event.channel_id.board()).or_default().push(event);
    }
    Ok(grouped)
}
