#![forbid(unsafe_code)]

use crate::board::{Board, BoardPatch};
use crate::engine::Engine;
use crate::ids::BoardId;
use crate::ports::{Backend, GraphError};
use crate::scope::JobScope;
use crate::tracker::TrackRequest;
use crate::visited::VisitedSet;

/// Context of an active recursive tracking sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sequence {
    pub visited: VisitedSet,
    pub trigger_stamp: i64,
}

/// What one upstream fan-out decided per neighbor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub depth: u32,
    pub strict: bool,
    /// Downstream boards that were missing this board as an upstream neighbor.
    pub repaired: usize,
    pub recursed: Vec<BoardId>,
    pub deferred: Vec<BoardId>,
    /// Neighbors left alone because the depth limit was reached.
    pub cut_off: Vec<BoardId>,
    pub skipped: usize,
}

impl<B> Engine<'_, B>
where
    B: Backend + ?Sized,
{
    /// Repairs back-edges of `board`, then, inside an active sequence, decides
    /// per upstream neighbor whether to track it now, later, or not at all.
    pub fn propagate_upstream(
        &mut self,
        board: &Board,
        sequence: Option<&Sequence>,
        scope: &mut JobScope,
    ) -> Result<FanOutReport, GraphError> {
        let repaired = self.repair_back_edges(board)?;
        let Some(sequence) = sequence else {
            return Ok(FanOutReport {
                repaired,
                ..FanOutReport::default()
            });
        };
        let mut report = self.fan_out(board, sequence, scope)?;
        report.repaired = repaired;
        Ok(report)
    }

    /// Makes sure every immediate downstream board lists `board` upstream.
    pub(crate) fn repair_back_edges(&mut self, board: &Board) -> Result<usize, GraphError> {
        let now = self.backend.now();
        let batch_size = self.config.discovery_batch_size.max(1);
        let mut repaired = 0;
        for chunk in board.immediately_downstream_board_ids.chunks(batch_size) {
            for child in self.backend.fetch_boards(chunk)? {
                if child.has_upstream(&board.id) {
                    continue;
                }
                let patch = BoardPatch {
                    add_upstream_board_ids: vec![board.id.clone()],
                    ..BoardPatch::default()
                };
                if self.backend.persist_fields(&child.id, &patch, now)? {
                    repaired += 1;
                }
            }
        }
        if repaired > 0 {
            tracing::debug!(
                target: "boardgraph.propagate",
                op = "repair_back_edges",
                board_id = %board.id,
                repaired,
                "back-edges repaired"
            );
        }
        Ok(repaired)
    }

    fn fan_out(
        &mut self,
        board: &Board,
        sequence: &Sequence,
        scope: &mut JobScope,
    ) -> Result<FanOutReport, GraphError> {
        let fresh = self.backend.fetch_board(&board.id)?;
        let mut upstream = fresh
            .as_ref()
            .unwrap_or(board)
            .immediately_upstream_board_ids
            .clone();

        let depth = sequence.visited.depth();
        let any_pressure = self.backend.is_any_pressure();
        let heavy_pressure = self.backend.is_under_pressure();
        let strict = depth >= self.config.strict_depth || (depth > 1 && any_pressure);
        if heavy_pressure {
            upstream.truncate(self.config.heavy_pressure_fanout);
        }

        let mut report = FanOutReport {
            depth,
            strict,
            ..FanOutReport::default()
        };
        let mut visited = sequence.visited.clone();
        let batch_size = self.config.discovery_batch_size.max(1);

        for chunk in upstream.chunks(batch_size) {
            let pending = chunk
                .iter()
                .filter(|id| !visited.contains(id))
                .cloned()
                .collect::<Vec<_>>();
            report.skipped += chunk.len() - pending.len();
            if pending.is_empty() {
                continue;
            }

            for neighbor in self.backend.fetch_boards(&pending)? {
                if visited.contains(&neighbor.id)
                    || neighbor
                        .last_tracked
                        .is_some_and(|stamp| stamp > sequence.trigger_stamp)
                {
                    report.skipped += 1;
                    continue;
                }
                visited.insert(neighbor.id.clone());

                let is_root = scope.roots.is_structural_root(&mut *self.backend, &neighbor)?;
                // Roots and lenient passes always defer; only strict non-roots are depth bound.
                if !strict || is_root {
                    self.defer_tracking(&neighbor.id, &visited.deeper(), false, scope)?;
                    report.deferred.push(neighbor.id);
                } else if depth < self.config.sync_recursion_depth {
                    let request = TrackRequest {
                        visited: visited.deeper(),
                        trigger_stamp: Some(sequence.trigger_stamp),
                        ..TrackRequest::default()
                    };
                    self.run_tracking_sequence(&neighbor.id, request, scope)?;
                    report.recursed.push(neighbor.id);
                } else if depth < self.config.max_depth {
                    self.defer_tracking(&neighbor.id, &visited.deeper(), false, scope)?;
                    report.deferred.push(neighbor.id);
                } else {
                    report.cut_off.push(neighbor.id);
                }
            }
        }

        if !report.cut_off.is_empty() {
            tracing::warn!(
                target: "boardgraph.propagate",
                op = "fan_out",
                board_id = %board.id,
                depth,
                cut_off = report.cut_off.len(),
                "depth limit reached, upstream boards left stale"
            );
        }
        tracing::debug!(
            target: "boardgraph.propagate",
            op = "fan_out",
            board_id = %board.id,
            depth,
            strict,
            heavy_pressure,
            recursed = report.recursed.len(),
            deferred = report.deferred.len(),
            skipped = report.skipped,
            "upstream fan-out done"
        );
        Ok(report)
    }
}
