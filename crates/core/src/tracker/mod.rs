#![forbid(unsafe_code)]

mod closure;
mod discover;

use crate::engine::Engine;
use crate::ids::BoardId;
use crate::ports::{Backend, GraphError};
use crate::propagate::{FanOutReport, Sequence};
use crate::scope::JobScope;
use crate::visited::VisitedSet;

pub(crate) use closure::same_members;

/// Inputs of one [`Engine::run_tracking_sequence`] call.
#[derive(Clone, Debug, Default)]
pub struct TrackRequest {
    pub visited: VisitedSet,
    /// The board's own buttons changed; parents must refresh even if the closure did not.
    pub buttons_changed: bool,
    /// When the surrounding sequence started. `None` starts a new sequence now.
    pub trigger_stamp: Option<i64>,
    /// Invoked from a deferred task that already waited out a pressure deferral.
    pub resumed: bool,
    pub update_available_boards: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClosureChanges {
    pub ids: bool,
    pub stats: bool,
    pub revision: bool,
}

impl ClosureChanges {
    pub fn any(&self) -> bool {
        self.ids || self.stats || self.revision
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackStatus {
    /// The board record no longer exists.
    Missing,
    /// `last_tracked` was newer than the trigger stamp.
    ShortCircuited,
    Unchanged,
    Persisted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUp {
    None,
    /// Only back-edges were repaired.
    Repaired,
    /// Stats-only change under pressure: ancestors got revision markers.
    Touched { ancestors: usize },
    Propagated(FanOutReport),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackReport {
    pub board_id: BoardId,
    pub status: TrackStatus,
    pub changes: ClosureChanges,
    pub downstream_board_ids: Vec<BoardId>,
    pub visited: usize,
    pub truncated: bool,
    pub follow_up: FollowUp,
}

impl TrackReport {
    fn skipped(board_id: &BoardId, status: TrackStatus) -> Self {
        Self {
            board_id: board_id.clone(),
            status,
            changes: ClosureChanges::default(),
            downstream_board_ids: Vec::new(),
            visited: 0,
            truncated: false,
            follow_up: FollowUp::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    Ok(TrackReport),
    /// Postponed onto the schedule queue because the system is under pressure.
    Delayed,
}

impl TrackOutcome {
    pub fn is_delayed(&self) -> bool {
        matches!(self, Self::Delayed)
    }

    pub fn report(&self) -> Option<&TrackReport> {
        match self {
            Self::Ok(report) => Some(report),
            Self::Delayed => None,
        }
    }
}

impl<B> Engine<'_, B>
where
    B: Backend + ?Sized,
{
    /// Recomputes the downstream closure of `board_id` and persists what changed.
    ///
    /// Safe to call redundantly: a stale invocation short-circuits on
    /// `last_tracked`, and a repeated one finds nothing to persist.
    pub fn run_tracking_sequence(
        &mut self,
        board_id: &BoardId,
        request: TrackRequest,
        scope: &mut JobScope,
    ) -> Result<TrackOutcome, GraphError> {
        let now = self.backend.now();
        let trigger_stamp = request.trigger_stamp.unwrap_or(now);

        let Some(board) = self.backend.fetch_board(board_id)? else {
            tracing::debug!(
                target: "boardgraph.tracker",
                op = "track",
                board_id = %board_id,
                "board missing, nothing to track"
            );
            return Ok(TrackOutcome::Ok(TrackReport::skipped(
                board_id,
                TrackStatus::Missing,
            )));
        };

        if board.last_tracked.is_some_and(|stamp| stamp > trigger_stamp) {
            tracing::debug!(
                target: "boardgraph.tracker",
                op = "track",
                board_id = %board_id,
                last_tracked = board.last_tracked,
                trigger_stamp,
                "already tracked after this sequence began"
            );
            return Ok(TrackOutcome::Ok(TrackReport::skipped(
                board_id,
                TrackStatus::ShortCircuited,
            )));
        }

        let is_root = scope.roots.is_structural_root(&mut *self.backend, &board)?;
        if !is_root && !request.resumed && self.backend.is_any_pressure() {
            self.defer_tracking(board_id, &request.visited, request.buttons_changed, scope)?;
            return Ok(TrackOutcome::Delayed);
        }

        scope.record_tracked(board_id);
        let discovery = discover::discover(&mut *self.backend, &board, self.config, is_root)?;
        let relevant = closure::relevant_subgraph(&board.id, &discovery);
        let closure = closure::build_closure(&board, &relevant, &discovery, self.config);
        tracing::debug!(
            target: "boardgraph.tracker",
            op = "discover",
            board_id = %board_id,
            visited = discovery.visited(),
            batches = discovery.batches,
            absent = discovery.absent.len(),
            capped = discovery.capped,
            far_dropped = closure.far_dropped,
            "discovery completed"
        );

        let changes = ClosureChanges {
            ids: !same_members(&board.downstream_board_ids, &closure.ids),
            stats: board.total_downstream_buttons != closure.total_buttons
                || board.unlinked_downstream_buttons != closure.unlinked_buttons,
            revision: board.full_set_revision.as_deref()
                != Some(closure.full_set_revision.as_str()),
        };

        let mut status = TrackStatus::Unchanged;
        if changes.any() {
            let Some(current) = self.backend.fetch_board(board_id)? else {
                return Ok(TrackOutcome::Ok(TrackReport::skipped(
                    board_id,
                    TrackStatus::Missing,
                )));
            };
            let patch = closure.patch_against(&current, now);
            if self.backend.persist_fields(board_id, &patch, now)? {
                status = TrackStatus::Persisted;
            }
            tracing::info!(
                target: "boardgraph.tracker",
                op = "persist",
                board_id = %board_id,
                ids_changed = changes.ids,
                stats_changed = changes.stats,
                revision_changed = changes.revision,
                members = closure.ids.len(),
                truncated = closure.truncated,
                "closure updated"
            );
        } else {
            tracing::debug!(
                target: "boardgraph.tracker",
                op = "diff",
                board_id = %board_id,
                "closure unchanged"
            );
        }

        let follow_up = if changes.any() || request.buttons_changed {
            if !changes.ids && self.backend.is_any_pressure() {
                self.repair_back_edges(&board)?;
                let ancestors = self.touch_upstream_revisions(&board, scope)?;
                FollowUp::Touched { ancestors }
            } else {
                let mut visited = request.visited.clone();
                visited.insert(board.id.clone());
                let sequence = Sequence {
                    visited,
                    trigger_stamp,
                };
                FollowUp::Propagated(self.propagate_upstream(&board, Some(&sequence), scope)?)
            }
        } else {
            self.repair_back_edges(&board)?;
            FollowUp::Repaired
        };

        if request.update_available_boards
            && let Some(user_id) = board.user_id.as_deref()
        {
            scope.request_available_boards(user_id);
        }

        Ok(TrackOutcome::Ok(TrackReport {
            board_id: board_id.clone(),
            status,
            changes,
            downstream_board_ids: closure.ids,
            visited: discovery.visited(),
            truncated: closure.truncated,
            follow_up,
        }))
    }
}
