#![forbid(unsafe_code)]

use crate::board::{Board, Button, ButtonGrid};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write;

/// Per-board numbers fed into closure aggregation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditStats {
    pub total_buttons: u64,
    pub unlinked_buttons: u64,
    pub revision: String,
}

/// Counts the visible buttons placed on the grid and how many of them link nowhere.
///
/// A board without grid placement counts every visible button.
pub fn compute_edit_stats(board: &Board) -> EditStats {
    let placed = board.grid.placed_ids().collect::<HashSet<_>>();
    let mut total_buttons = 0u64;
    let mut unlinked_buttons = 0u64;
    for button in &board.buttons {
        if button.hidden {
            continue;
        }
        if !placed.is_empty() && !placed.contains(button.id.as_str()) {
            continue;
        }
        total_buttons += 1;
        if button.target().is_none() {
            unlinked_buttons += 1;
        }
    }
    EditStats {
        total_buttons,
        unlinked_buttons,
        revision: board.current_revision.clone(),
    }
}

pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out.truncate(len);
    out
}

/// Revision marker of a board's own content.
pub fn content_revision(buttons: &[Button], grid: &ButtonGrid, len: usize) -> String {
    let encoded = serde_json::to_string(&(buttons, grid)).unwrap_or_default();
    short_hash(&encoded, len)
}

/// Hash of the ordered member markers followed by the member count.
///
/// The hash has a fixed width, so the count suffix stays unambiguous.
pub fn full_set_revision(markers: &[String], len: usize) -> String {
    format!("{}{}", short_hash(&markers.join("_"), len), markers.len())
}
