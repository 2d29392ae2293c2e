#![forbid(unsafe_code)]

//! Structural roots ("possible home boards").

use crate::board::Board;
use crate::ids::BoardId;
use crate::ports::{GraphError, GraphStore};
use std::collections::HashMap;

/// A board anchors closure computation when nothing links to it, when it is
/// flagged as a home board, or when a user has it as their home board.
pub fn is_possible_home_board(board: &Board, user_home_board: bool) -> bool {
    board.home_board || board.immediately_upstream_board_ids.is_empty() || user_home_board
}

/// Per-job memo of [`is_possible_home_board`] answers.
#[derive(Clone, Debug, Default)]
pub struct RootMemo {
    answers: HashMap<BoardId, bool>,
}

impl RootMemo {
    pub fn is_structural_root<S>(&mut self, store: &mut S, board: &Board) -> Result<bool, GraphError>
    where
        S: GraphStore + ?Sized,
    {
        if let Some(answer) = self.answers.get(&board.id) {
            return Ok(*answer);
        }
        let answer =
            is_possible_home_board(board, false) || store.is_user_home_board(&board.id)?;
        self.answers.insert(board.id.clone(), answer);
        Ok(answer)
    }
}
