#![forbid(unsafe_code)]

//! In-memory backend: every collaborator trait over plain maps.

use crate::board::{Board, BoardPatch};
use crate::ids::BoardId;
use crate::ports::{Clock, GraphError, GraphStore, PressureSignal, ScheduleQueue, ScheduledTask, TaskKey};
use std::collections::BTreeMap;

/// Board graph, schedule queue, pressure switches and clock in one value.
///
/// `fetch_calls` and `persist_log` count backend traffic so callers can
/// assert how much work a tracking run did.
#[derive(Clone, Debug, Default)]
pub struct MemoryGraph {
    boards: BTreeMap<BoardId, Board>,
    home_boards: BTreeMap<String, BoardId>,
    tasks: BTreeMap<TaskKey, ScheduledTask>,
    now: i64,
    any_pressure: bool,
    heavy_pressure: bool,
    pub fetch_calls: usize,
    pub persist_log: Vec<(BoardId, i64)>,
}

impl MemoryGraph {
    pub fn new(now: i64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Inserts or replaces a board record as-is.
    pub fn insert_board(&mut self, board: Board) {
        self.boards.insert(board.id.clone(), board);
    }

    pub fn remove_board(&mut self, id: &BoardId) -> Option<Board> {
        self.boards.remove(id)
    }

    pub fn board(&self, id: &BoardId) -> Option<&Board> {
        self.boards.get(id)
    }

    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.values()
    }

    pub fn set_now(&mut self, now: i64) {
        self.now = now;
    }

    pub fn advance(&mut self, secs: i64) {
        self.now += secs;
    }

    /// `heavy` implies `any`.
    pub fn set_pressure(&mut self, any: bool, heavy: bool) {
        self.any_pressure = any || heavy;
        self.heavy_pressure = heavy;
    }

    pub fn set_user_home_board(&mut self, user_id: &str, board_id: BoardId) {
        self.home_boards.insert(user_id.to_string(), board_id);
    }

    pub fn persist_count(&self, id: &BoardId) -> usize {
        self.persist_log.iter().filter(|(board, _)| board == id).count()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.tasks.values()
    }

    pub fn task(&self, key: &TaskKey) -> Option<&ScheduledTask> {
        self.tasks.get(key)
    }

    /// Removes and returns tasks due at `now`, earliest first.
    pub fn drain_due(&mut self, now: i64) -> Vec<ScheduledTask> {
        let due = self
            .tasks
            .iter()
            .filter(|(_, task)| task.run_at <= now)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        let mut drained = due
            .iter()
            .filter_map(|key| self.tasks.remove(key))
            .collect::<Vec<_>>();
        drained.sort_by(|a, b| a.run_at.cmp(&b.run_at).then_with(|| a.key.cmp(&b.key)));
        drained
    }
}

impl GraphStore for MemoryGraph {
    fn fetch_board(&mut self, id: &BoardId) -> Result<Option<Board>, GraphError> {
        self.fetch_calls += 1;
        Ok(self.boards.get(id).cloned())
    }

    fn fetch_boards(&mut self, ids: &[BoardId]) -> Result<Vec<Board>, GraphError> {
        self.fetch_calls += 1;
        Ok(ids
            .iter()
            .filter_map(|id| self.boards.get(id).cloned())
            .collect())
    }

    fn persist_fields(
        &mut self,
        id: &BoardId,
        patch: &BoardPatch,
        now: i64,
    ) -> Result<bool, GraphError> {
        let Some(board) = self.boards.get_mut(id) else {
            return Ok(false);
        };
        if patch.apply_to(board) {
            self.persist_log.push((id.clone(), now));
        }
        Ok(true)
    }

    fn is_user_home_board(&mut self, id: &BoardId) -> Result<bool, GraphError> {
        Ok(self.home_boards.values().any(|board| board == id))
    }
}

impl ScheduleQueue for MemoryGraph {
    fn scheduled(&mut self, key: &TaskKey) -> Result<Option<ScheduledTask>, GraphError> {
        Ok(self.tasks.get(key).cloned())
    }

    fn schedule_deferred(
        &mut self,
        key: TaskKey,
        run_at: i64,
        extra: Option<serde_json::Value>,
    ) -> Result<(), GraphError> {
        self.tasks.insert(key.clone(), ScheduledTask { key, run_at, extra });
        Ok(())
    }
}

impl PressureSignal for MemoryGraph {
    fn is_under_pressure(&self) -> bool {
        self.heavy_pressure
    }

    fn is_any_pressure(&self) -> bool {
        self.any_pressure
    }
}

impl Clock for MemoryGraph {
    fn now(&self) -> i64 {
        self.now
    }
}
