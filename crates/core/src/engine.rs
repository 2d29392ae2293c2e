#![forbid(unsafe_code)]

use crate::board::{Board, BoardPatch, DeferredUpdate};
use crate::config::TrackingConfig;
use crate::edges::{self, EdgeUpdate};
use crate::ids::BoardId;
use crate::ports::{AVAILABLE_BOARDS_ACTION, Backend, GraphError, ScheduledTask, TRACK_ACTION, TaskKey};
use crate::scope::JobScope;
use crate::stats::{EditStats, compute_edit_stats};
use crate::tracker::{TrackOutcome, TrackRequest};
use crate::visited::VisitedSet;

/// Tracking, propagation and deferral over one backend.
///
/// Holds no state between calls; everything a job accumulates lives in the
/// [`JobScope`] passed to each entry point.
pub struct Engine<'a, B: Backend + ?Sized> {
    pub(crate) backend: &'a mut B,
    pub(crate) config: &'a TrackingConfig,
}

/// What [`Engine::run_task`] did with one claimed queue task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskRun {
    Tracked(TrackOutcome),
    /// Available-boards recomputation belongs to another subsystem; the task is consumed.
    AvailableBoards { user_id: String },
    /// Unknown action or malformed subject; the task is dropped.
    Skipped,
}

impl<'a, B> Engine<'a, B>
where
    B: Backend + ?Sized,
{
    pub fn new(backend: &'a mut B, config: &'a TrackingConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &TrackingConfig {
        self.config
    }

    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    pub fn compute_edit_stats(&self, board: &Board) -> EditStats {
        compute_edit_stats(board)
    }

    /// Memoized in `scope` for the rest of the job.
    pub fn is_structural_root(
        &mut self,
        board: &Board,
        scope: &mut JobScope,
    ) -> Result<bool, GraphError> {
        scope.roots.is_structural_root(&mut *self.backend, board)
    }

    /// Re-derives edges after the board's buttons were saved.
    ///
    /// When edges or content changed, the derived fields are persisted and a
    /// tracking task is queued; no tracking runs inline.
    pub fn on_button_grid_saved(
        &mut self,
        board: &Board,
        content_changed: bool,
        scope: &mut JobScope,
    ) -> Result<EdgeUpdate, GraphError> {
        let update = edges::detect_changes(board, self.config, content_changed);
        if !update.is_dirty() {
            return Ok(update);
        }

        let now = self.backend.now();
        let patch = update.patch(board);
        if !patch.is_empty() && !self.backend.persist_fields(&board.id, &patch, now)? {
            tracing::debug!(
                target: "boardgraph.edges",
                op = "grid_saved",
                board_id = %board.id,
                "board vanished before edges were stored"
            );
            return Ok(update);
        }
        tracing::debug!(
            target: "boardgraph.edges",
            op = "grid_saved",
            board_id = %board.id,
            edges_changed = update.edges_changed,
            content_changed = update.content_changed,
            downstream = update.downstream_ids.len(),
            "board marked for tracking"
        );
        self.defer_tracking(&board.id, &VisitedSet::new(), update.content_changed, scope)?;
        Ok(update)
    }

    /// Queues (or re-times) the single pending tracking task of `board_id` and
    /// parks `visited` on the board so the task resumes with that context.
    pub fn defer_tracking(
        &mut self,
        board_id: &BoardId,
        visited: &VisitedSet,
        buttons_changed: bool,
        scope: &mut JobScope,
    ) -> Result<i64, GraphError> {
        let now = self.backend.now();
        let key = TaskKey::track(board_id);
        let run_at = match self.backend.scheduled(&key)? {
            Some(task) if now - task.run_at > self.config.long_wait_secs => {
                now + self.config.extended_delay_secs
            }
            Some(task) if task.run_at > now => task.run_at,
            _ => now + self.config.default_delay_secs,
        };

        let patch = BoardPatch {
            deferred: DeferredUpdate::Merge(visited.to_deferred(buttons_changed)),
            ..BoardPatch::default()
        };
        self.backend.persist_fields(board_id, &patch, now)?;
        self.backend
            .schedule_deferred(key, run_at, None)?;
        scope.record_deferred(board_id);

        tracing::info!(
            target: "boardgraph.defer",
            op = "defer",
            board_id = %board_id,
            run_at,
            depth = visited.depth(),
            visited = visited.len(),
            "tracking deferred"
        );
        Ok(run_at)
    }

    /// Entry point of a fired tracking task: takes the parked context off the
    /// board and tracks with it. A failed run parks the context again.
    pub fn resume_deferred_tracking(
        &mut self,
        board_id: &BoardId,
        scope: &mut JobScope,
    ) -> Result<TrackOutcome, GraphError> {
        let parked = self
            .backend
            .fetch_board(board_id)?
            .and_then(|board| board.deferred);
        if parked.is_some() {
            let clear = BoardPatch {
                deferred: DeferredUpdate::Clear,
                ..BoardPatch::default()
            };
            let now = self.backend.now();
            self.backend.persist_fields(board_id, &clear, now)?;
        }
        let deferred = parked.clone().unwrap_or_default();

        let request = TrackRequest {
            visited: VisitedSet::from(&deferred),
            buttons_changed: deferred.buttons_changed,
            trigger_stamp: None,
            resumed: true,
            update_available_boards: true,
        };
        let err = match self.run_tracking_sequence(board_id, request, scope) {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        // Park the context again so a retried task resumes where this one stopped.
        if let Some(context) = parked {
            let restore = BoardPatch {
                deferred: DeferredUpdate::Merge(context),
                ..BoardPatch::default()
            };
            let now = self.backend.now();
            if let Err(restore_err) = self.backend.persist_fields(board_id, &restore, now) {
                tracing::warn!(
                    target: "boardgraph.defer",
                    op = "resume",
                    board_id = %board_id,
                    error = %restore_err,
                    "failed to re-park tracking context"
                );
            }
        }
        Err(err)
    }

    /// Runs one claimed queue task.
    pub fn run_task(
        &mut self,
        task: &ScheduledTask,
        scope: &mut JobScope,
    ) -> Result<TaskRun, GraphError> {
        match task.key.action.as_str() {
            TRACK_ACTION => {
                let Ok(board_id) = BoardId::try_from(task.key.subject_id.clone()) else {
                    tracing::warn!(
                        target: "boardgraph.tasks",
                        op = "run_task",
                        subject_id = %task.key.subject_id,
                        "dropping tracking task with invalid board id"
                    );
                    return Ok(TaskRun::Skipped);
                };
                let outcome = self.resume_deferred_tracking(&board_id, scope)?;
                Ok(TaskRun::Tracked(outcome))
            }
            AVAILABLE_BOARDS_ACTION => {
                tracing::info!(
                    target: "boardgraph.tasks",
                    op = "available_boards",
                    user_id = %task.key.subject_id,
                    "available boards refresh requested"
                );
                Ok(TaskRun::AvailableBoards {
                    user_id: task.key.subject_id.clone(),
                })
            }
            other => {
                tracing::warn!(
                    target: "boardgraph.tasks",
                    op = "run_task",
                    action = other,
                    "dropping task with unknown action"
                );
                Ok(TaskRun::Skipped)
            }
        }
    }

    /// Flushes end-of-job side effects accumulated in `scope`.
    ///
    /// Returns how many available-boards tasks were scheduled.
    pub fn finish_job(&mut self, scope: &mut JobScope) -> Result<usize, GraphError> {
        let users = scope.take_available_boards_users();
        if users.is_empty() {
            return Ok(0);
        }
        let now = self.backend.now();
        for user_id in &users {
            self.backend
                .schedule_deferred(TaskKey::available_boards(user_id), now, None)?;
        }
        tracing::debug!(
            target: "boardgraph.tasks",
            op = "finish_job",
            users = users.len(),
            tracked = scope.tracked().len(),
            deferred = scope.deferred().len(),
            "job finished"
        );
        Ok(users.len())
    }
}
