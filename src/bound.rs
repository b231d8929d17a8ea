//! `BoundMorphism`: the compositional vehicle before replay. Maps each
//! channel it touches to a [`MorphismPath`], and implements the monoidal
//! algebra — serial product `⊗` (`then`/`Shr`) and parallel product `|`
//! (`parallel`/`BitOr`) — with automatic rectangularization so every
//! channel's path duration equals the whole morphism's duration.
//!
//! Paths are kept in a `BTreeMap<ChannelId, MorphismPath>` rather than a
//! hash map so that iterating channels yields ascending `ChannelId` order —
//! the stable per-channel processing order the replayer relies on for
//! deterministic node-id assignment falls out of the container choice
//! rather than needing an explicit sort at every call site.

use std::collections::BTreeMap;
use std::ops::{BitOr, Shr};

use crate::channel::ChannelId;
use crate::error::CoreError;
use crate::path::MorphismPath;

/// The conventional IDENTITY opcode used by rectangularization fillers.
/// Callers using a different IDENTITY value should use the `_with_identity`
/// constructors/combinators instead.
pub const DEFAULT_IDENTITY_OPCODE: u16 = 0x0000;

/// A morphism with concrete channels, pre-replay: a `ChannelId -> MorphismPath`
/// map plus the algebra that keeps it rectangular.
#[derive(Clone, Debug, Default)]
pub struct BoundMorphism {
    paths: BTreeMap<ChannelId, MorphismPath>,
    identity_opcode: u16,
}

impl BoundMorphism {
    /// An empty morphism (no channels, duration 0).
    pub fn empty() -> Self {
        BoundMorphism {
            paths: BTreeMap::new(),
            identity_opcode: DEFAULT_IDENTITY_OPCODE,
        }
    }

    /// A single-channel morphism with an empty path on `channel`.
    pub fn from_channel(channel: ChannelId) -> Self {
        let mut paths = BTreeMap::new();
        paths.insert(channel, MorphismPath::new(channel));
        BoundMorphism {
            paths,
            identity_opcode: DEFAULT_IDENTITY_OPCODE,
        }
    }

    /// Builds directly from a channel -> path map.
    pub fn from_paths(paths: BTreeMap<ChannelId, MorphismPath>) -> Self {
        BoundMorphism {
            paths,
            identity_opcode: DEFAULT_IDENTITY_OPCODE,
        }
    }

    /// Overrides the IDENTITY opcode used by this morphism's own
    /// rectangularization fillers (default `0x0000`).
    pub fn with_identity_opcode(mut self, opcode: u16) -> Self {
        self.identity_opcode = opcode;
        self
    }

    pub fn identity_opcode(&self) -> u16 {
        self.identity_opcode
    }

    /// Appends a step to `channel`'s path. If `channel` is `None`, the
    /// morphism must have exactly one channel already (ambiguous otherwise).
    pub fn append(
        &mut self,
        duration: u64,
        opcode: u16,
        payload: impl Into<std::sync::Arc<[u8]>>,
        channel: Option<ChannelId>,
    ) -> Result<(), CoreError> {
        let target = match channel {
            Some(c) => c,
            None => {
                let mut keys = self.paths.keys();
                match (keys.next(), keys.next()) {
                    (Some(&only), None) => only,
                    _ => {
                        return Err(CoreError::Internal(
                            "append without an explicit channel requires exactly one channel"
                                .to_string(),
                        ))
                    }
                }
            }
        };
        self.paths
            .entry(target)
            .or_insert_with(|| MorphismPath::new(target))
            .append(duration, opcode, payload);
        Ok(())
    }

    /// The channel set this morphism touches, ascending.
    pub fn channels(&self) -> Vec<ChannelId> {
        self.paths.keys().copied().collect()
    }

    /// Rectangular duration: the max over every channel's path duration (by
    /// construction, all channels already agree once built through `then`/
    /// `parallel`; a freshly-appended morphism may not yet).
    pub fn duration(&self) -> u64 {
        self.paths.values().map(|p| p.total_duration()).max().unwrap_or(0)
    }

    /// Total step count across every channel.
    pub fn len(&self) -> usize {
        self.paths.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub(crate) fn paths(&self) -> &BTreeMap<ChannelId, MorphismPath> {
        &self.paths
    }

    /// The total duration of a single channel's path, if this morphism
    /// touches it. Rectangularity means this equals [`Self::duration`]
    /// for every channel once built through `then`/`parallel`.
    pub fn channel_duration(&self, channel: ChannelId) -> Option<u64> {
        self.paths.get(&channel).map(|p| p.total_duration())
    }

    /// Parallel product `self | other` (tensor `⊗` on disjoint channel
    /// sets): fails with [`CoreError::ChannelConflict`] if the channel sets
    /// intersect. Otherwise every channel's path is cloned and aligned to
    /// `D = max(self.duration(), other.duration())`.
    pub fn parallel(&self, other: &BoundMorphism) -> Result<BoundMorphism, CoreError> {
        let overlap: Vec<ChannelId> = self
            .paths
            .keys()
            .filter(|c| other.paths.contains_key(c))
            .copied()
            .collect();
        if !overlap.is_empty() {
            return Err(CoreError::ChannelConflict { overlapping: overlap });
        }

        let target = self.duration().max(other.duration());
        let identity_opcode = self.identity_opcode;
        let mut paths = BTreeMap::new();
        for (ch, path) in self.paths.iter().chain(other.paths.iter()) {
            let mut cloned = path.clone();
            cloned.align(target, identity_opcode)?;
            paths.insert(*ch, cloned);
        }

        Ok(BoundMorphism { paths, identity_opcode })
    }

    /// Serial product `self ⊗ other` ("then"): `D = self.duration() +
    /// other.duration()`. For every channel in the union:
    /// - present on both sides: align `self`'s path to its own duration,
    ///   then extend with `other`'s path.
    /// - present only on `self`: align straight to `D` (pads the back with
    ///   one identity of `other.duration()`).
    /// - present only on `other`: synthesize `identity(self.duration())`
    ///   then extend with `other`'s path.
    pub fn then(&self, other: &BoundMorphism) -> Result<BoundMorphism, CoreError> {
        let dur_a = self.duration();
        let dur_b = other.duration();
        let identity_opcode = self.identity_opcode;

        let mut channels: Vec<ChannelId> = self.paths.keys().copied().collect();
        for ch in other.paths.keys() {
            if !self.paths.contains_key(ch) {
                channels.push(*ch);
            }
        }
        channels.sort_unstable();

        let mut paths = BTreeMap::new();
        for ch in channels {
            let path_a = self.paths.get(&ch);
            let path_b = other.paths.get(&ch);
            let new_path = match (path_a, path_b) {
                (Some(a), Some(b)) => {
                    let mut merged = a.clone();
                    merged.align(dur_a, identity_opcode)?;
                    merged.extend(b)?;
                    merged
                }
                (Some(a), None) => {
                    let mut merged = a.clone();
                    merged.align(dur_a + dur_b, identity_opcode)?;
                    merged
                }
                (None, Some(b)) => {
                    let mut merged = MorphismPath::identity(ch, dur_a, identity_opcode);
                    merged.extend(b)?;
                    merged
                }
                (None, None) => unreachable!("channel came from one of the two maps"),
            };
            paths.insert(ch, new_path);
        }

        Ok(BoundMorphism { paths, identity_opcode })
    }
}

impl BitOr for BoundMorphism {
    type Output = Result<BoundMorphism, CoreError>;

    /// `self | other`: parallel product. See [`BoundMorphism::parallel`].
    fn bitor(self, other: BoundMorphism) -> Self::Output {
        self.parallel(&other)
    }
}

impl<'a> BitOr<&'a BoundMorphism> for &'a BoundMorphism {
    type Output = Result<BoundMorphism, CoreError>;

    fn bitor(self, other: &'a BoundMorphism) -> Self::Output {
        self.parallel(other)
    }
}

impl Shr for BoundMorphism {
    type Output = Result<BoundMorphism, CoreError>;

    /// `self >> other`: serial product `⊗` ("then"). See
    /// [`BoundMorphism::then`].
    fn shr(self, other: BoundMorphism) -> Self::Output {
        self.then(&other)
    }
}

impl<'a> Shr<&'a BoundMorphism> for &'a BoundMorphism {
    type Output = Result<BoundMorphism, CoreError>;

    fn shr(self, other: &'a BoundMorphism) -> Self::Output {
        self.then(other)
    }
}
