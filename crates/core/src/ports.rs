#![forbid(unsafe_code)]

//! Collaborators the tracking engine runs against.

use crate::board::{Board, BoardPatch};
use crate::ids::BoardId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TRACK_ACTION: &str = "track_downstream";
pub const AVAILABLE_BOARDS_ACTION: &str = "update_available_boards";

/// De-duplication key of a scheduled task.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub subject_id: String,
    pub action: String,
}

impl TaskKey {
    pub fn new(subject_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            action: action.into(),
        }
    }

    pub fn track(board_id: &BoardId) -> Self {
        Self::new(board_id.as_str(), TRACK_ACTION)
    }

    pub fn available_boards(user_id: &str) -> Self {
        Self::new(user_id, AVAILABLE_BOARDS_ACTION)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub key: TaskKey,
    pub run_at: i64,
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum GraphError {
    Backend(Box<dyn std::error::Error + Send + Sync>),
    Malformed {
        board_id: String,
        detail: &'static str,
    },
}

impl GraphError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "backend: {err}"),
            Self::Malformed { board_id, detail } => {
                write!(f, "malformed board record (board_id={board_id}): {detail}")
            }
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err.as_ref()),
            Self::Malformed { .. } => None,
        }
    }
}

/// Board records keyed by id.
pub trait GraphStore {
    fn fetch_board(&mut self, id: &BoardId) -> Result<Option<Board>, GraphError>;

    /// Missing ids are omitted from the result.
    fn fetch_boards(&mut self, ids: &[BoardId]) -> Result<Vec<Board>, GraphError>;

    /// Applies `patch` to the stored record; returns `false` when the board is gone.
    ///
    /// Implementations must not re-run edge derivation or tracking as a side effect.
    fn persist_fields(
        &mut self,
        id: &BoardId,
        patch: &BoardPatch,
        now: i64,
    ) -> Result<bool, GraphError>;

    /// Whether some user has this board set as their home board.
    fn is_user_home_board(&mut self, id: &BoardId) -> Result<bool, GraphError>;
}

/// Delayed task execution, de-duplicated by [`TaskKey`].
pub trait ScheduleQueue {
    fn scheduled(&mut self, key: &TaskKey) -> Result<Option<ScheduledTask>, GraphError>;

    /// Creates the task, or moves an existing one to `run_at`.
    fn schedule_deferred(
        &mut self,
        key: TaskKey,
        run_at: i64,
        extra: Option<serde_json::Value>,
    ) -> Result<(), GraphError>;
}

pub trait PressureSignal {
    /// Heavy backlog.
    fn is_under_pressure(&self) -> bool;

    /// Any backlog at all; implies nothing about `is_under_pressure`'s threshold.
    fn is_any_pressure(&self) -> bool;
}

pub trait Clock {
    /// Unix seconds.
    fn now(&self) -> i64;
}

pub trait Backend: GraphStore + ScheduleQueue + PressureSignal + Clock {}

impl<T> Backend for T where T: GraphStore + ScheduleQueue + PressureSignal + Clock + ?Sized {}
