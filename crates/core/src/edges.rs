#![forbid(unsafe_code)]

//! Immediate outgoing edges of a board, derived from its buttons.

use crate::board::{Board, BoardPatch};
use crate::config::TrackingConfig;
use crate::ids::BoardId;
use crate::stats::content_revision;

/// Result of re-deriving a board's edges after its button grid was saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeUpdate {
    pub downstream_ids: Vec<BoardId>,
    pub edges_changed: bool,
    pub content_changed: bool,
    pub revision: String,
}

impl EdgeUpdate {
    /// The board needs its closure recomputed.
    pub fn is_dirty(&self) -> bool {
        self.edges_changed || self.content_changed
    }

    pub fn patch(&self, board: &Board) -> BoardPatch {
        BoardPatch {
            immediately_downstream_board_ids: self
                .edges_changed
                .then(|| self.downstream_ids.clone()),
            current_revision: (self.revision != board.current_revision)
                .then(|| self.revision.clone()),
            ..BoardPatch::default()
        }
    }
}

/// Sorted, deduplicated link targets, skipping self-links and excluded labels.
pub fn derive_downstream_ids(board: &Board, config: &TrackingConfig) -> Vec<BoardId> {
    let mut ids = board
        .buttons
        .iter()
        .filter(|button| {
            !button
                .label
                .as_deref()
                .is_some_and(|label| config.is_excluded_label(label))
        })
        .filter_map(|button| button.target())
        .filter(|target| *target != &board.id)
        .cloned()
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    ids
}

/// Compares freshly derived edges and content revision against what `board` stores.
///
/// `content_flagged` marks the board dirty even when edges and revision match.
pub fn detect_changes(board: &Board, config: &TrackingConfig, content_flagged: bool) -> EdgeUpdate {
    let downstream_ids = derive_downstream_ids(board, config);
    let revision = content_revision(&board.buttons, &board.grid, config.revision_hash_len);

    EdgeUpdate {
        edges_changed: board.immediately_downstream_board_ids != downstream_ids,
        content_changed: content_flagged || revision != board.current_revision,
        downstream_ids,
        revision,
    }
}
