//! `catseq-core`: the arena-backed composition graph, rectangularization
//! algebra, replay pass, and compiler for a hardware control-sequence DSL.
//!
//! This crate is the core compiler only. The user-facing front-end surface
//! syntax (operator sugar, combinator helpers), the higher-level program DSL
//! (loops, conditionals, variables lowered to a separate IR), hardware
//! drivers and wire codecs, persistence, and a CLI are all out of scope.
//!
//! # Layout
//!
//! - [`channel`] — `ChannelId` codec ((board, local-channel) <-> u32).
//! - [`arena`] — `Arena`, `Node`, id allocation and structural interning.
//! - [`path`] — `MorphismPath`, the per-channel step sequence.
//! - [`bound`] — `BoundMorphism`, the monoidal composition algebra.
//! - [`state`] — the `HardwareStateMachine` collaborator interface.
//! - [`replay`] — the Replayer and `ClosedMorphism`.
//! - [`compiler`] — absolute-time assignment and event emission.
//! - [`cache`] — the `NodeId`-keyed incremental compile cache.
//! - [`error`] — the unified `CoreError` taxonomy.
//!
//! # Example
//!
//! ```
//! use catseq_core::prelude::*;
//!
//! let mut arena = Arena::new();
//!
//! let ch0 = ChannelId::from_parts(0, 0);
//! let ch1 = ChannelId::from_parts(0, 1);
//!
//! let mut a = BoundMorphism::from_channel(ch0);
//! a.append(100, 0x0101, b"on".to_vec(), None).unwrap();
//! let mut b = BoundMorphism::from_channel(ch1);
//! b.append(50, 0x0101, b"on".to_vec(), None).unwrap();
//!
//! let combined = a.parallel(&b).unwrap();
//! assert_eq!(combined.duration(), 100);
//!
//! let machine: AcceptAll<()> = AcceptAll::new();
//! let mut states = std::collections::BTreeMap::new();
//! states.insert(ch0, ());
//! states.insert(ch1, ());
//!
//! let closed = combined.replay(&states, &machine, &mut arena).unwrap();
//! let events = closed.compile(&mut arena).unwrap();
//! assert_eq!(events.len(), 2);
//! ```

pub mod arena;
pub mod bound;
pub mod cache;
pub mod channel;
pub mod compiler;
pub mod error;
pub mod path;
pub mod replay;
pub mod state;

/// Convenience re-exports of the types most callers need.
pub mod prelude {
    pub use crate::arena::{Arena, Node, NodeId};
    pub use crate::bound::BoundMorphism;
    pub use crate::cache::IncrementalCache;
    pub use crate::channel::ChannelId;
    pub use crate::compiler::{compile, compile_by_board, Event};
    pub use crate::error::{ChannelIdError, CompositionError, CoreError, TransitionContext};
    pub use crate::path::MorphismPath;
    pub use crate::replay::{replay, ClosedMorphism, Replay};
    pub use crate::state::{AcceptAll, HardwareStateMachine};
}

pub use prelude::*;
