#![forbid(unsafe_code)]

use crate::board::DeferredTracking;
use crate::ids::BoardId;
use std::collections::BTreeSet;

/// Boards already handled by the current tracking sequence, plus how many
/// upstream hops the sequence has taken so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitedSet {
    ids: BTreeSet<BoardId>,
    depth: u32,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(depth: u32) -> Self {
        Self {
            ids: BTreeSet::new(),
            depth,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn contains(&self, id: &BoardId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: BoardId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &BoardId> {
        self.ids.iter()
    }

    /// Same ids, one hop further upstream.
    pub fn deeper(&self) -> Self {
        Self {
            ids: self.ids.clone(),
            depth: self.depth.saturating_add(1),
        }
    }

    pub fn to_deferred(&self, buttons_changed: bool) -> DeferredTracking {
        DeferredTracking {
            visited_ids: self.ids.iter().cloned().collect(),
            depth: self.depth,
            buttons_changed,
        }
    }
}

impl From<&DeferredTracking> for VisitedSet {
    fn from(value: &DeferredTracking) -> Self {
        Self {
            ids: value.visited_ids.iter().cloned().collect(),
            depth: value.depth,
        }
    }
}

impl Extend<BoardId> for VisitedSet {
    fn extend<T: IntoIterator<Item = BoardId>>(&mut self, iter: T) {
        self.ids.extend(iter);
    }
}

impl FromIterator<BoardId> for VisitedSet {
    fn from_iter<T: IntoIterator<Item = BoardId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
            depth: 0,
        }
    }
}
