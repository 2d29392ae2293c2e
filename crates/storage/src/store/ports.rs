#![forbid(unsafe_code)]

use super::*;
use bg_core::{
    Board, BoardPatch, Clock, GraphError, GraphStore, PressureSignal, ScheduleQueue,
    ScheduledTask, TaskKey,
};

impl GraphStore for SqliteStore {
    fn fetch_board(&mut self, id: &BoardId) -> Result<Option<Board>, GraphError> {
        Ok(self.load_board(id)?)
    }

    fn fetch_boards(&mut self, ids: &[BoardId]) -> Result<Vec<Board>, GraphError> {
        Ok(self.load_boards(ids)?)
    }

    fn persist_fields(
        &mut self,
        id: &BoardId,
        patch: &BoardPatch,
        now: i64,
    ) -> Result<bool, GraphError> {
        Ok(self.apply_patch(id, patch, now)?)
    }

    fn is_user_home_board(&mut self, id: &BoardId) -> Result<bool, GraphError> {
        Ok(self.is_any_user_home_board(id)?)
    }
}

impl ScheduleQueue for SqliteStore {
    fn scheduled(&mut self, key: &TaskKey) -> Result<Option<ScheduledTask>, GraphError> {
        Ok(self.scheduled_task(key)?)
    }

    fn schedule_deferred(
        &mut self,
        key: TaskKey,
        run_at: i64,
        extra: Option<serde_json::Value>,
    ) -> Result<(), GraphError> {
        Ok(self.upsert_task(&key, run_at, extra.as_ref())?)
    }
}

impl PressureSignal for SqliteStore {
    fn is_under_pressure(&self) -> bool {
        self.backlog_at_least(self.pressure.heavy_pressure_backlog, "heavy")
    }

    fn is_any_pressure(&self) -> bool {
        self.backlog_at_least(self.pressure.any_pressure_backlog, "any")
    }
}

impl Clock for SqliteStore {
    fn now(&self) -> i64 {
        self.current_time()
    }
}
