#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_BOARD_ID_LEN: usize = 128;
// Stored lists may hold truncation sentinels, which extend an id by a suffix.
const MAX_STORED_ID_LEN: usize = MAX_BOARD_ID_LEN + 64;
pub(crate) const MAX_SUFFIX_LEN: usize = MAX_STORED_ID_LEN - MAX_BOARD_ID_LEN;

/// Board identifier.
///
/// Ids are ASCII alphanumerics plus `_`, `-` and `.`, which keeps them usable
/// as queue subjects and as the stem of truncation sentinels.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardId(String);

impl BoardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, BoardIdError> {
        let value = value.into();
        validate_board_id(&value, MAX_BOARD_ID_LEN)?;
        Ok(Self(value))
    }

    /// Pseudo-id recorded in place of the closure members that were dropped.
    pub fn truncation_sentinel(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }

    pub fn is_sentinel_of(&self, top: &BoardId, suffix: &str) -> bool {
        self.0
            .strip_prefix(top.as_str())
            .is_some_and(|rest| rest == suffix)
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BoardId {
    type Error = BoardIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_board_id(&value, MAX_STORED_ID_LEN)?;
        Ok(Self(value))
    }
}

impl From<BoardId> for String {
    fn from(value: BoardId) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardIdError {
    Empty,
    TooLong,
    InvalidChar { ch: char, index: usize },
}

impl BoardIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "board id must not be empty",
            Self::TooLong => "board id is too long",
            Self::InvalidChar { .. } => "board id contains an invalid character",
        }
    }
}

impl fmt::Display for BoardIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChar { ch, index } => {
                write!(f, "{} ({ch:?} at {index})", self.message())
            }
            _ => f.write_str(self.message()),
        }
    }
}

impl std::error::Error for BoardIdError {}

pub(crate) fn is_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

fn validate_board_id(value: &str, max_len: usize) -> Result<(), BoardIdError> {
    if value.is_empty() {
        return Err(BoardIdError::Empty);
    }
    if value.len() > max_len {
        return Err(BoardIdError::TooLong);
    }
    for (index, ch) in value.chars().enumerate() {
        if !is_id_char(ch) {
            return Err(BoardIdError::InvalidChar { ch, index });
        }
    }
    Ok(())
}
