#![forbid(unsafe_code)]

use super::discover::Discovery;
use crate::board::{Board, BoardPatch};
use crate::config::TrackingConfig;
use crate::ids::BoardId;
use crate::stats::full_set_revision;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Breadth-first walk from `top` over discovered edges only.
///
/// Boards that were never fetched (absent, or beyond the visited ceiling) are
/// not expanded and do not appear as keys.
pub(crate) fn relevant_subgraph(
    top: &BoardId,
    discovery: &Discovery,
) -> BTreeMap<BoardId, Vec<BoardId>> {
    let mut relevant = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(top.clone());
    queue.push_back(top.clone());

    while let Some(id) = queue.pop_front() {
        let Some(children) = discovery.children.get(&id) else {
            continue;
        };
        for child in children {
            if seen.insert(child.clone()) {
                queue.push_back(child.clone());
            }
        }
        relevant.insert(id, children.clone());
    }
    relevant
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Closure {
    pub(crate) ids: Vec<BoardId>,
    pub(crate) truncated: bool,
    pub(crate) far_dropped: usize,
    pub(crate) total_buttons: u64,
    pub(crate) unlinked_buttons: u64,
    pub(crate) full_set_revision: String,
}

impl Closure {
    /// Fields of `current` that differ from this closure, stamped with `now`.
    pub(crate) fn patch_against(&self, current: &Board, now: i64) -> BoardPatch {
        BoardPatch {
            downstream_board_ids: (!same_members(&current.downstream_board_ids, &self.ids))
                .then(|| self.ids.clone()),
            total_downstream_buttons: (current.total_downstream_buttons != self.total_buttons)
                .then_some(self.total_buttons),
            unlinked_downstream_buttons: (current.unlinked_downstream_buttons
                != self.unlinked_buttons)
                .then_some(self.unlinked_buttons),
            full_set_revision: (current.full_set_revision.as_deref()
                != Some(self.full_set_revision.as_str()))
            .then(|| self.full_set_revision.clone()),
            last_tracked: Some(now),
            ..BoardPatch::default()
        }
    }
}

pub(crate) fn same_members(a: &[BoardId], b: &[BoardId]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

/// Near members (children of the top board and of its direct children) are
/// always kept; the rest only while they fit in `far_board_limit`.
pub(crate) fn build_closure(
    top: &Board,
    relevant: &BTreeMap<BoardId, Vec<BoardId>>,
    discovery: &Discovery,
    config: &TrackingConfig,
) -> Closure {
    let mut near = BTreeSet::new();
    if let Some(children) = relevant.get(&top.id) {
        for child in children {
            near.insert(child.clone());
            if let Some(grandchildren) = relevant.get(child) {
                near.extend(grandchildren.iter().cloned());
            }
        }
    }
    near.retain(|id| id != &top.id && relevant.contains_key(id));

    let far = relevant
        .keys()
        .filter(|id| *id != &top.id && !near.contains(*id))
        .cloned()
        .collect::<BTreeSet<_>>();

    let far_overflow = far.len() > config.far_board_limit;
    let mut members = near;
    let far_dropped = if far_overflow {
        far.len()
    } else {
        members.extend(far);
        0
    };

    let mut total_buttons = 0u64;
    let mut unlinked_buttons = 0u64;
    let mut markers = Vec::with_capacity(members.len() + 2);
    markers.push(
        discovery
            .stats
            .get(&top.id)
            .map(|stats| stats.revision.clone())
            .unwrap_or_else(|| top.current_revision.clone()),
    );
    // Members carry their id so same-content boards still tell apart.
    for id in &members {
        if let Some(stats) = discovery.stats.get(id) {
            total_buttons += stats.total_buttons;
            unlinked_buttons += stats.unlinked_buttons;
            markers.push(format!("{id}:{}", stats.revision));
        }
    }

    let truncated = far_overflow || discovery.capped;
    let mut ids = members.into_iter().collect::<Vec<_>>();
    if truncated {
        let sentinel = top.id.truncation_sentinel(&config.truncation_suffix);
        markers.push(sentinel.as_str().to_string());
        ids.push(sentinel);
    }
    ids.sort();
    ids.dedup();
    ids.retain(|id| id != &top.id);

    Closure {
        ids,
        truncated,
        far_dropped,
        total_buttons,
        unlinked_buttons,
        full_set_revision: full_set_revision(&markers, config.revision_hash_len),
    }
}
