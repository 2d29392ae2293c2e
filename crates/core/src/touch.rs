#![forbid(unsafe_code)]

//! Cheap "something below you changed" markers for ancestors.

use crate::board::{Board, BoardPatch};
use crate::engine::Engine;
use crate::ports::{Backend, GraphError};
use crate::scope::JobScope;
use crate::visited::VisitedSet;
use std::collections::{HashSet, VecDeque};

impl<B> Engine<'_, B>
where
    B: Backend + ?Sized,
{
    /// Appends an ordinal marker to the `full_set_revision` of ancestors of
    /// `origin`, breadth-first, up to the touch ceiling.
    ///
    /// Ancestors keep their stale closure until a full tracking run; the
    /// direct parents get one queued so the marker is eventually replaced.
    /// Returns how many ancestors were touched.
    pub(crate) fn touch_upstream_revisions(
        &mut self,
        origin: &Board,
        scope: &mut JobScope,
    ) -> Result<usize, GraphError> {
        let ceiling = if self.backend.is_under_pressure() {
            self.config.touch_limit_under_pressure
        } else {
            self.config.touch_limit
        };
        let batch_size = self.config.discovery_batch_size.max(1);
        let now = self.backend.now();

        let mut seen = HashSet::from([origin.id.clone()]);
        let mut frontier = origin
            .immediately_upstream_board_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect::<VecDeque<_>>();
        let parents = frontier.iter().cloned().collect::<Vec<_>>();

        let mut touched = 0usize;
        while touched < ceiling && !frontier.is_empty() {
            let take = batch_size.min(ceiling - touched).min(frontier.len());
            let batch = frontier.drain(..take).collect::<Vec<_>>();
            for ancestor in self.backend.fetch_boards(&batch)? {
                if touched >= ceiling {
                    break;
                }
                touched += 1;
                let patch = BoardPatch {
                    revision_marker: Some(touched.to_string()),
                    ..BoardPatch::default()
                };
                self.backend.persist_fields(&ancestor.id, &patch, now)?;
                for next in &ancestor.immediately_upstream_board_ids {
                    if seen.insert(next.clone()) {
                        frontier.push_back(next.clone());
                    }
                }
            }
        }

        let mut visited = VisitedSet::new();
        visited.insert(origin.id.clone());
        for parent in &parents {
            self.defer_tracking(parent, &visited, false, scope)?;
        }

        tracing::info!(
            target: "boardgraph.touch",
            op = "touch",
            board_id = %origin.id,
            touched,
            ceiling,
            "ancestor revisions touched"
        );
        Ok(touched)
    }
}
