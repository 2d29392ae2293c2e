#![forbid(unsafe_code)]

use crate::ids::BoardId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBoard {
    #[serde(default)]
    pub id: Option<BoardId>,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub load_board: Option<LoadBoard>,
    #[serde(default)]
    pub hidden: bool,
}

impl Button {
    /// Target board of this button, if it links anywhere.
    pub fn target(&self) -> Option<&BoardId> {
        self.load_board.as_ref().and_then(|link| link.id.as_ref())
    }
}

/// Placement of buttons: `order[row][column]` holds a button id or nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonGrid {
    pub rows: usize,
    pub columns: usize,
    #[serde(default)]
    pub order: Vec<Vec<Option<String>>>,
}

impl ButtonGrid {
    pub fn placed_ids(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .flat_map(|row| row.iter())
            .filter_map(|cell| cell.as_deref())
    }
}

/// Visited-id context parked on a board while its tracking task waits in the queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredTracking {
    #[serde(default)]
    pub visited_ids: Vec<BoardId>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub buttons_changed: bool,
}

impl DeferredTracking {
    /// Appends `other` onto `self`: ids are unioned, the deeper depth wins.
    pub fn merge(&mut self, other: &DeferredTracking) {
        self.visited_ids.extend(other.visited_ids.iter().cloned());
        self.visited_ids.sort();
        self.visited_ids.dedup();
        self.depth = self.depth.max(other.depth);
        self.buttons_changed |= other.buttons_changed;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub home_board: bool,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub grid: ButtonGrid,
    #[serde(default)]
    pub current_revision: String,
    #[serde(default)]
    pub immediately_downstream_board_ids: Vec<BoardId>,
    #[serde(default)]
    pub immediately_upstream_board_ids: Vec<BoardId>,
    #[serde(default)]
    pub downstream_board_ids: Vec<BoardId>,
    #[serde(default)]
    pub total_downstream_buttons: u64,
    #[serde(default)]
    pub unlinked_downstream_buttons: u64,
    #[serde(default)]
    pub full_set_revision: Option<String>,
    #[serde(default)]
    pub last_tracked: Option<i64>,
    #[serde(default)]
    pub deferred: Option<DeferredTracking>,
}

impl Board {
    pub fn new(id: BoardId) -> Self {
        Self {
            id,
            user_id: None,
            home_board: false,
            buttons: Vec::new(),
            grid: ButtonGrid::default(),
            current_revision: String::new(),
            immediately_downstream_board_ids: Vec::new(),
            immediately_upstream_board_ids: Vec::new(),
            downstream_board_ids: Vec::new(),
            total_downstream_buttons: 0,
            unlinked_downstream_buttons: 0,
            full_set_revision: None,
            last_tracked: None,
            deferred: None,
        }
    }

    pub fn has_upstream(&self, id: &BoardId) -> bool {
        self.immediately_upstream_board_ids.contains(id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DeferredUpdate {
    #[default]
    Keep,
    Merge(DeferredTracking),
    Clear,
}

/// Field-level change set for one board.
///
/// `None` / empty fields are left untouched by [`BoardPatch::apply_to`], so a
/// patch computed from a fresh read only overwrites what actually differs.
/// Upstream ids, revision markers and deferred context are merged into the
/// stored value rather than replaced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardPatch {
    pub immediately_downstream_board_ids: Option<Vec<BoardId>>,
    pub current_revision: Option<String>,
    pub add_upstream_board_ids: Vec<BoardId>,
    pub downstream_board_ids: Option<Vec<BoardId>>,
    pub total_downstream_buttons: Option<u64>,
    pub unlinked_downstream_buttons: Option<u64>,
    pub full_set_revision: Option<String>,
    pub revision_marker: Option<String>,
    pub last_tracked: Option<i64>,
    pub deferred: DeferredUpdate,
}

impl BoardPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch, returning whether anything on `board` changed.
    pub fn apply_to(&self, board: &mut Board) -> bool {
        let before = board.clone();

        if let Some(ids) = &self.immediately_downstream_board_ids {
            board.immediately_downstream_board_ids = ids.clone();
        }
        if let Some(revision) = &self.current_revision {
            board.current_revision = revision.clone();
        }
        if !self.add_upstream_board_ids.is_empty() {
            let upstream = &mut board.immediately_upstream_board_ids;
            upstream.extend(self.add_upstream_board_ids.iter().cloned());
            upstream.sort();
            upstream.dedup();
        }
        if let Some(ids) = &self.downstream_board_ids {
            board.downstream_board_ids = ids.clone();
        }
        if let Some(total) = self.total_downstream_buttons {
            board.total_downstream_buttons = total;
        }
        if let Some(unlinked) = self.unlinked_downstream_buttons {
            board.unlinked_downstream_buttons = unlinked;
        }
        if let Some(revision) = &self.full_set_revision {
            board.full_set_revision = Some(revision.clone());
        }
        if let Some(marker) = &self.revision_marker {
            let base = board.full_set_revision.take().unwrap_or_default();
            board.full_set_revision = Some(format!("{base}-{marker}"));
        }
        if let Some(stamp) = self.last_tracked {
            // Monotonic across racing workers.
            board.last_tracked = Some(board.last_tracked.map_or(stamp, |prev| prev.max(stamp)));
        }
        match &self.deferred {
            DeferredUpdate::Keep => {}
            DeferredUpdate::Merge(context) => match board.deferred.as_mut() {
                Some(existing) => existing.merge(context),
                None => {
                    let mut fresh = DeferredTracking::default();
                    fresh.merge(context);
                    board.deferred = Some(fresh);
                }
            },
            DeferredUpdate::Clear => board.deferred = None,
        }

        *board != before
    }
}
