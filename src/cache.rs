//! IncrementalCache: memoises compiled event segments by `NodeId`.
//!
//! Because nodes are immutable and structurally interned (see
//! [`crate::arena`]), a `NodeId` uniquely determines its event list up to a
//! time offset — so caching the *relative* (node-local, t=0) event list by
//! id is sound. The compiler shifts a cache hit by the caller's current base
//! time before splicing it in.
//!
//! The block-copy fast path in `merge_sorted` detects the common case where
//! one child's relative events entirely precede the other's (true for every
//! `Sequence` merge, and for most `Parallel` merges built from disjoint
//! serial chains) and `extend_from_slice`s instead of doing an
//! element-by-element merge.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arena::{Arena, Node, NodeId};
use crate::compiler::Event;
use crate::error::CoreError;

type CachedEvents = Arc<Vec<Event>>;

/// NodeId-keyed cache of relative-time (root-local) event lists.
pub struct IncrementalCache {
    entries: HashMap<NodeId, CachedEvents>,
    hits: usize,
    misses: usize,
}

impl IncrementalCache {
    pub fn new() -> Self {
        IncrementalCache {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            cached_nodes: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            hit_rate: if total > 0 { self.hits as f64 / total as f64 } else { 0.0 },
        }
    }

    /// Compiles `root` to absolute-time events, consulting and populating
    /// the cache along the way. Relative-time sub-results are shared via
    /// `Arc`, so a cache hit costs one refcount bump plus a linear shift.
    ///
    /// The merge passes only guarantee time-sorted output; the final stable
    /// sort by `(time, channel)` below is what makes cache-on and cache-off
    /// compiles byte-equal.
    pub fn compile(&mut self, arena: &Arena, root: NodeId) -> Result<Vec<Event>, CoreError> {
        let relative = self.compile_relative(arena, root)?;
        let mut events: Vec<Event> = relative.iter().cloned().collect();
        events.sort_by_key(|e| (e.time, e.channel_id));
        let stats = self.stats();
        tracing::debug!(
            root = root,
            event_count = events.len(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "incremental compile"
        );
        Ok(events)
    }

    fn compile_relative(&mut self, arena: &Arena, node_id: NodeId) -> Result<CachedEvents, CoreError> {
        if let Some(cached) = self.entries.get(&node_id) {
            self.hits += 1;
            return Ok(cached.clone());
        }
        self.misses += 1;

        let events = match arena.get(node_id) {
            Node::Atomic { channel_id, opcode, payload, .. } => {
                vec![Event {
                    time: 0,
                    channel_id: *channel_id,
                    opcode: *opcode,
                    payload: payload.clone(),
                }]
            }
            Node::Sequence { children, .. } => {
                let mut result = Vec::new();
                let mut base = 0u64;
                for &child in children {
                    let child_events = self.compile_relative(arena, child)?;
                    result.reserve(child_events.len());
                    for e in child_events.iter() {
                        let time = e.time.checked_add(base).ok_or(CoreError::Overflow {
                            node: child,
                            base,
                            duration: e.time,
                        })?;
                        result.push(Event {
                            time,
                            channel_id: e.channel_id,
                            opcode: e.opcode,
                            payload: e.payload.clone(),
                        });
                    }
                    let child_duration = arena.get(child).duration();
                    base = base.checked_add(child_duration).ok_or(CoreError::Overflow {
                        node: child,
                        base,
                        duration: child_duration,
                    })?;
                }
                result
            }
            Node::Parallel { children, .. } => {
                let mut result: Vec<Event> = Vec::new();
                for &child in children {
                    let child_events = self.compile_relative(arena, child)?;
                    result = merge_sorted(&result, &child_events);
                }
                result
            }
        };

        let cached = Arc::new(events);
        self.entries.insert(node_id, cached.clone());
        Ok(cached)
    }
}

impl Default for IncrementalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub cached_nodes: usize,
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

/// Merges two event lists already sorted by time. Detects the common
/// non-overlapping case (one list entirely precedes the other) and uses a
/// straight concatenation instead of an element-by-element merge.
fn merge_sorted(a: &[Event], b: &[Event]) -> Vec<Event> {
    if a.is_empty() {
        return b.to_vec();
    }
    if b.is_empty() {
        return a.to_vec();
    }

    if a.last().unwrap().time <= b.first().unwrap().time {
        let mut result = Vec::with_capacity(a.len() + b.len());
        result.extend_from_slice(a);
        result.extend_from_slice(b);
        return result;
    }
    if b.last().unwrap().time <= a.first().unwrap().time {
        let mut result = Vec::with_capacity(a.len() + b.len());
        result.extend_from_slice(b);
        result.extend_from_slice(a);
        return result;
    }

    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].time <= b[j].time {
            result.push(a[i].clone());
            i += 1;
        } else {
            result.push(b[j].clone());
            j += 1;
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}
