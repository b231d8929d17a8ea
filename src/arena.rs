//! Arena: owns all nodes, assigns stable integer ids, interns payload bytes,
//! and provides O(1) lookup.
//!
//! Rust 只关心 Monoidal Category 的代数结构，完全不知道 opcode/payload 的语义。
//!
//! Node ids are monotone and never reused; nodes are immutable once
//! inserted. The arena additionally deduplicates: identical `Atomic` nodes
//! (same channel, duration, opcode, payload bytes) share one id, and
//! composite nodes with an identical ordered child list share one id. This
//! is what makes `IncrementalCache` sound — a `NodeId` uniquely determines
//! its subgraph, so caching by id (not by a separately-computed structural
//! hash) is safe.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::ChannelId;
use crate::error::CompositionError;

/// Stable, monotone node handle. Never reused within one [`Arena`]'s
/// lifetime (a `clear()` voids all outstanding ids).
pub type NodeId = u32;

/// A node stored in the arena. Durations and channel sets for composite
/// nodes are precomputed at construction time so `duration()`/`channels()`
/// are O(1).
#[derive(Clone, Debug)]
pub enum Node {
    Atomic {
        channel_id: ChannelId,
        duration: u64,
        opcode: u16,
        payload: Arc<[u8]>,
    },
    Sequence {
        children: Vec<NodeId>,
        duration: u64,
        /// the single channel shared by every child
        channel_id: ChannelId,
    },
    Parallel {
        children: Vec<NodeId>,
        duration: u64,
        /// sorted, deduplicated union of every child's channel set
        channels: Vec<ChannelId>,
    },
}

impl Node {
    /// Total duration in clock cycles.
    pub fn duration(&self) -> u64 {
        match self {
            Node::Atomic { duration, .. } => *duration,
            Node::Sequence { duration, .. } => *duration,
            Node::Parallel { duration, .. } => *duration,
        }
    }

    /// The channels this node touches, sorted ascending.
    pub fn channels(&self) -> Vec<ChannelId> {
        match self {
            Node::Atomic { channel_id, .. } => vec![*channel_id],
            Node::Sequence { channel_id, .. } => vec![*channel_id],
            Node::Parallel { channels, .. } => channels.clone(),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
struct AtomicKey {
    channel_id: ChannelId,
    duration: u64,
    opcode: u16,
    payload: Vec<u8>,
}

#[derive(PartialEq, Eq, Hash)]
enum CompositeKey {
    Sequence(Vec<NodeId>),
    Parallel(Vec<NodeId>),
}

/// The id-allocating container owning all nodes and the optional
/// [`IncrementalCache`](crate::cache::IncrementalCache).
///
/// Single-threaded cooperative: not internally synchronized. Multiple
/// arenas may exist per process and be used on different threads, but
/// sharing ids across arenas is undefined.
pub struct Arena {
    nodes: Vec<Node>,
    atomic_index: HashMap<AtomicKey, NodeId>,
    composite_index: HashMap<CompositeKey, NodeId>,
    cache: Option<crate::cache::IncrementalCache>,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-reserves node storage for `n` nodes.
    pub fn with_capacity(n: usize) -> Self {
        Arena {
            nodes: Vec::with_capacity(n),
            atomic_index: HashMap::new(),
            composite_index: HashMap::new(),
            cache: None,
        }
    }

    /// Enables the incremental compile cache (see [`crate::cache`]).
    pub fn enable_incremental(&mut self) {
        self.cache = Some(crate::cache::IncrementalCache::new());
    }

    /// Disables the incremental compile cache and drops any cached events.
    pub fn disable_incremental(&mut self) {
        self.cache = None;
    }

    pub fn is_incremental_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Node count. `clear()` resets this to zero and voids all ids.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Empties the arena and any cache, releasing all memory. All
    /// previously issued `NodeId`s become invalid.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.atomic_index.clear();
        self.composite_index.clear();
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Interns an atomic step. Identical `(channel, duration, opcode,
    /// payload)` tuples return the same id.
    pub fn atomic(&mut self, channel_id: ChannelId, duration: u64, opcode: u16, payload: Vec<u8>) -> NodeId {
        let key = AtomicKey {
            channel_id,
            duration,
            opcode,
            payload: payload.clone(),
        };
        if let Some(&id) = self.atomic_index.get(&key) {
            return id;
        }
        let id = self.push(Node::Atomic {
            channel_id,
            duration,
            opcode,
            payload: Arc::from(payload),
        });
        self.atomic_index.insert(key, id);
        id
    }

    /// Flattens one level of immediate `Sequence` children into `flat`.
    fn flatten_sequence(&self, children: &[NodeId], flat: &mut Vec<NodeId>) {
        for &id in children {
            match &self.nodes[id as usize] {
                Node::Sequence { children: inner, .. } => flat.extend_from_slice(inner),
                _ => flat.push(id),
            }
        }
    }

    /// Serial product of `children` (all must share one channel). Flattens
    /// immediate `Sequence` children to keep the tree shallow. Returns the
    /// single child id if `children.len() == 1`.
    pub fn compose_sequence(&mut self, children: &[NodeId]) -> Result<NodeId, CompositionError> {
        if children.is_empty() {
            return Err(CompositionError::EmptySequence);
        }
        if children.len() == 1 {
            return Ok(children[0]);
        }

        let mut flat = Vec::with_capacity(children.len());
        self.flatten_sequence(children, &mut flat);
        if flat.len() == 1 {
            return Ok(flat[0]);
        }

        let mut channel_id = None;
        let mut duration = 0u64;
        for &id in &flat {
            let node = &self.nodes[id as usize];
            let chs = node.channels();
            if chs.len() != 1 {
                return Err(CompositionError::MixedChannels(chs[0], chs[chs.len() - 1]));
            }
            let found = chs[0];
            match channel_id {
                None => channel_id = Some(found),
                Some(expected) if expected == found => {}
                Some(expected) => return Err(CompositionError::MixedChannels(expected, found)),
            }
            duration += node.duration();
        }
        let channel_id = channel_id.expect("non-empty flat list has a channel");

        let key = CompositeKey::Sequence(flat.clone());
        if let Some(&id) = self.composite_index.get(&key) {
            return Ok(id);
        }
        let id = self.push(Node::Sequence {
            children: flat,
            duration,
            channel_id,
        });
        self.composite_index.insert(key, id);
        tracing::debug!(node_id = id, node_count = self.nodes.len(), "composed sequence node");
        Ok(id)
    }

    /// Flattens one level of immediate `Parallel` children into `flat`.
    fn flatten_parallel(&self, children: &[NodeId], flat: &mut Vec<NodeId>) {
        for &id in children {
            match &self.nodes[id as usize] {
                Node::Parallel { children: inner, .. } => flat.extend_from_slice(inner),
                _ => flat.push(id),
            }
        }
    }

    /// Tensor product of `children` (channel sets must be pairwise
    /// disjoint). Flattens immediate `Parallel` children. Returns the single
    /// child id if `children.len() == 1`.
    pub fn parallel_compose_many(&mut self, children: &[NodeId]) -> Result<NodeId, CompositionError> {
        if children.is_empty() {
            return Err(CompositionError::EmptyParallel);
        }
        if children.len() == 1 {
            return Ok(children[0]);
        }

        let mut flat = Vec::with_capacity(children.len());
        self.flatten_parallel(children, &mut flat);
        if flat.len() == 1 {
            return Ok(flat[0]);
        }

        let mut seen: Vec<ChannelId> = Vec::new();
        for &id in &flat {
            let node = &self.nodes[id as usize];
            let chs = node.channels();
            let mut sorted_seen = seen.clone();
            sorted_seen.sort_unstable();
            let mut sorted_chs = chs.clone();
            sorted_chs.sort_unstable();
            if has_intersection(&sorted_seen, &sorted_chs) {
                let overlap: Vec<ChannelId> = sorted_seen
                    .into_iter()
                    .filter(|c| sorted_chs.contains(c))
                    .collect();
                return Err(CompositionError::OverlappingChannels(overlap));
            }
            seen.extend_from_slice(&chs);
        }
        let duration = flat.iter().map(|&id| self.nodes[id as usize].duration()).max().unwrap_or(0);
        seen.sort_unstable();

        let key = CompositeKey::Parallel(flat.clone());
        if let Some(&id) = self.composite_index.get(&key) {
            return Ok(id);
        }
        let id = self.push(Node::Parallel {
            children: flat,
            duration,
            channels: seen,
        });
        self.composite_index.insert(key, id);
        tracing::debug!(node_id = id, node_count = self.nodes.len(), "composed parallel node");
        Ok(id)
    }

    /// Same as [`Self::atomic`], named to mirror the public surface's
    /// `atomic_id` entry — identical behavior, kept as an alias for callers
    /// that only ever want the id (e.g. the replayer).
    pub fn atomic_id(&mut self, channel_id: ChannelId, duration: u64, opcode: u16, payload: Vec<u8>) -> NodeId {
        self.atomic(channel_id, duration, opcode, payload)
    }

    /// Compiles `root` to a flat, time-sorted event stream, consulting the
    /// incremental cache if [`Self::enable_incremental`] was called.
    pub fn compile_graph(&mut self, root: NodeId) -> Result<Vec<crate::compiler::Event>, crate::error::CoreError> {
        if let Some(mut cache) = self.cache.take() {
            let result = cache.compile(self, root);
            self.cache = Some(cache);
            result
        } else {
            crate::compiler::compile(self, root)
        }
    }

    /// As [`Self::compile_graph`], grouped by board index. Does not consult
    /// the incremental cache (board grouping is a cheap post-processing
    /// step over the already-sorted event list).
    pub fn compile_graph_by_board(
        &self,
        root: NodeId,
    ) -> Result<HashMap<u16, Vec<crate::compiler::Event>>, crate::error::CoreError> {
        crate::compiler::compile_by_board(self, root)
    }

    /// Looks up a node by id. Panics on an out-of-range id, which indicates
    /// a bug in the caller (ids never cross arenas, never outlive `clear()`).
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Counts leaf (`Atomic`) nodes reachable from `root`, using an explicit
    /// stack to tolerate deep trees.
    pub fn leaf_count(&self, root: NodeId) -> usize {
        let mut stack = vec![root];
        let mut count = 0;
        while let Some(id) = stack.pop() {
            match &self.nodes[id as usize] {
                Node::Atomic { .. } => count += 1,
                Node::Sequence { children, .. } | Node::Parallel { children, .. } => {
                    stack.extend(children.iter().copied());
                }
            }
        }
        count
    }

    /// Maximum depth of the tree rooted at `root`.
    pub fn max_depth(&self, root: NodeId) -> usize {
        let mut stack = vec![(root, 1usize)];
        let mut max_depth = 0;
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            match &self.nodes[id as usize] {
                Node::Atomic { .. } => {}
                Node::Sequence { children, .. } | Node::Parallel { children, .. } => {
                    stack.extend(children.iter().map(|&c| (c, depth + 1)));
                }
            }
        }
        max_depth
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

/// Detects an intersection between two sorted slices in O(n + m).
fn has_intersection(a: &[ChannelId], b: &[ChannelId]) -> bool {
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => return true,
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(n: u16) -> ChannelId {
        ChannelId::from_parts(0, n)
    }

    #[test]
    fn atomic_interning_dedups() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![1, 2, 3]);
        let b = arena.atomic(ch(0), 100, 1, vec![1, 2, 3]);
        assert_eq!(a, b);
        assert_eq!(arena.node_count(), 1);
    }

    #[test]
    fn atomic_distinct_payload_is_distinct_node() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![1]);
        let b = arena.atomic(ch(0), 100, 1, vec![2]);
        assert_ne!(a, b);
    }

    #[test]
    fn compose_sequence_single_child_passthrough() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![]);
        let seq = arena.compose_sequence(&[a]).unwrap();
        assert_eq!(seq, a);
    }

    #[test]
    fn compose_sequence_empty_errors() {
        let mut arena = Arena::new();
        assert!(matches!(
            arena.compose_sequence(&[]),
            Err(CompositionError::EmptySequence)
        ));
    }

    #[test]
    fn parallel_compose_many_empty_errors() {
        let mut arena = Arena::new();
        assert!(matches!(
            arena.parallel_compose_many(&[]),
            Err(CompositionError::EmptyParallel)
        ));
    }

    #[test]
    fn compose_sequence_mixed_channels_errors() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![]);
        let b = arena.atomic(ch(1), 100, 1, vec![]);
        assert!(matches!(
            arena.compose_sequence(&[a, b]),
            Err(CompositionError::MixedChannels(_, _))
        ));
    }

    #[test]
    fn compose_sequence_sums_duration() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![]);
        let b = arena.atomic(ch(0), 50, 2, vec![]);
        let seq = arena.compose_sequence(&[a, b]).unwrap();
        assert_eq!(arena.get(seq).duration(), 150);
    }

    #[test]
    fn compose_sequence_flattens_immediate_children() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 10, 1, vec![]);
        let b = arena.atomic(ch(0), 10, 2, vec![]);
        let c = arena.atomic(ch(0), 10, 3, vec![]);
        let ab = arena.compose_sequence(&[a, b]).unwrap();
        let abc = arena.compose_sequence(&[ab, c]).unwrap();
        match arena.get(abc) {
            Node::Sequence { children, .. } => assert_eq!(children, &[a, b, c]),
            _ => panic!("expected Sequence"),
        }
    }

    #[test]
    fn parallel_compose_rejects_overlap() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![]);
        let b = arena.atomic(ch(0), 100, 1, vec![]);
        assert!(matches!(
            arena.parallel_compose_many(&[a, b]),
            Err(CompositionError::OverlappingChannels(_))
        ));
    }

    #[test]
    fn parallel_compose_takes_max_duration() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 100, 1, vec![]);
        let b = arena.atomic(ch(1), 200, 1, vec![]);
        let par = arena.parallel_compose_many(&[a, b]).unwrap();
        assert_eq!(arena.get(par).duration(), 200);
        assert_eq!(arena.get(par).channels(), vec![ch(0), ch(1)]);
    }

    #[test]
    fn parallel_compose_flattens_immediate_children() {
        let mut arena = Arena::new();
        let a = arena.atomic(ch(0), 10, 1, vec![]);
        let b = arena.atomic(ch(1), 10, 1, vec![]);
        let c = arena.atomic(ch(2), 10, 1, vec![]);
        let ab = arena.parallel_compose_many(&[a, b]).unwrap();
        let abc = arena.parallel_compose_many(&[ab, c]).unwrap();
        match arena.get(abc) {
            Node::Parallel { children, .. } => assert_eq!(children, &[a, b, c]),
            _ => panic!("expected Parallel"),
        }
    }

    #[test]
    fn deep_chain_flattens_to_linear_sequence() {
        let mut arena = Arena::new();
        let mut root = arena.atomic(ch(0), 1, 0, vec![]);
        for _ in 1..10_000 {
            let next = arena.atomic(ch(0), 1, 0, vec![]);
            root = arena.compose_sequence(&[root, next]).unwrap();
        }
        assert_eq!(arena.get(root).duration(), 10_000);
        assert_eq!(arena.leaf_count(root), 10_000);
    }

    #[test]
    fn clear_resets_everything() {
        let mut arena = Arena::new();
        arena.atomic(ch(0), 1, 0, vec![]);
        arena.clear();
        assert_eq!(arena.node_count(), 0);
    }

    #[test]
    fn has_intersection_cases() {
        assert!(has_intersection(&[ch(1), ch(2)], &[ch(2), ch(3)]));
        assert!(!has_intersection(&[ch(1)], &[ch(2)]));
        assert!(!has_intersection(&[], &[ch(1)]));
    }
}
