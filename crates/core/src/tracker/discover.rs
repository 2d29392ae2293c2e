#![forbid(unsafe_code)]

use crate::board::Board;
use crate::config::TrackingConfig;
use crate::ids::BoardId;
use crate::ports::{GraphError, GraphStore};
use crate::stats::{EditStats, compute_edit_stats};
use std::collections::{HashMap, HashSet, VecDeque};

/// Edges and stats collected for one tracking pass.
#[derive(Debug, Default)]
pub(crate) struct Discovery {
    pub(crate) children: HashMap<BoardId, Vec<BoardId>>,
    pub(crate) stats: HashMap<BoardId, EditStats>,
    /// Referenced ids that no longer resolve to a board.
    pub(crate) absent: HashSet<BoardId>,
    /// Hit the visited ceiling with boards still waiting to be fetched.
    pub(crate) capped: bool,
    pub(crate) batches: usize,
}

impl Discovery {
    pub(crate) fn visited(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn is_known(&self, id: &BoardId) -> bool {
        self.children.contains_key(id) || self.absent.contains(id)
    }

    fn record(&mut self, board: &Board) -> bool {
        if self.children.contains_key(&board.id) {
            return false;
        }
        self.children.insert(
            board.id.clone(),
            board.immediately_downstream_board_ids.clone(),
        );
        self.stats.insert(board.id.clone(), compute_edit_stats(board));
        true
    }
}

/// Seeds from the previously recorded closure, then walks edges to boards
/// not fetched yet, batch by batch, until nothing is left or the visited
/// ceiling is reached.
pub(crate) fn discover<S>(
    store: &mut S,
    top: &Board,
    config: &TrackingConfig,
    is_root: bool,
) -> Result<Discovery, GraphError>
where
    S: GraphStore + ?Sized,
{
    let seed_limit = config.seed_limit(is_root);
    let ceiling = config.visited_ceiling(is_root);
    let batch_size = config.discovery_batch_size.max(1);

    let mut discovery = Discovery::default();
    let mut queue = VecDeque::new();
    let mut queued = HashSet::new();

    // The top board is already loaded; it opens the first batch.
    discovery.record(top);
    enqueue_children(&discovery, top, &mut queue, &mut queued);

    let seeds = top
        .downstream_board_ids
        .iter()
        .filter(|id| *id != &top.id && !id.is_sentinel_of(&top.id, &config.truncation_suffix))
        .take(seed_limit)
        .cloned()
        .collect::<Vec<_>>();
    for chunk in seeds.chunks(batch_size) {
        let fetched = fetch_batch(store, chunk, &mut discovery)?;
        for board in &fetched {
            enqueue_children(&discovery, board, &mut queue, &mut queued);
        }
    }

    while !queue.is_empty() {
        if discovery.visited() >= ceiling {
            discovery.capped = queue.iter().any(|id| !discovery.is_known(id));
            break;
        }
        let room = (ceiling - discovery.visited()).min(batch_size);
        let mut batch = Vec::with_capacity(room);
        while batch.len() < room {
            let Some(id) = queue.pop_front() else {
                break;
            };
            if !discovery.is_known(&id) {
                batch.push(id);
            }
        }
        if batch.is_empty() {
            continue;
        }
        let fetched = fetch_batch(store, &batch, &mut discovery)?;
        for board in &fetched {
            enqueue_children(&discovery, board, &mut queue, &mut queued);
        }
    }

    Ok(discovery)
}

fn fetch_batch<S>(
    store: &mut S,
    ids: &[BoardId],
    discovery: &mut Discovery,
) -> Result<Vec<Board>, GraphError>
where
    S: GraphStore + ?Sized,
{
    let wanted = ids
        .iter()
        .filter(|id| !discovery.children.contains_key(*id))
        .cloned()
        .collect::<Vec<_>>();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }
    let mut fetched = store.fetch_boards(&wanted)?;
    discovery.batches += 1;

    // Keep request order so children are queued in the order their parents were.
    let position = wanted
        .iter()
        .enumerate()
        .map(|(index, id)| (id.clone(), index))
        .collect::<HashMap<_, _>>();
    fetched.sort_by_key(|board| position.get(&board.id).copied().unwrap_or(usize::MAX));

    let found = fetched.iter().map(|b| b.id.clone()).collect::<HashSet<_>>();
    for id in wanted {
        if !found.contains(&id) {
            discovery.absent.insert(id);
        }
    }
    fetched.retain(|board| discovery.record(board));
    Ok(fetched)
}

fn enqueue_children(
    discovery: &Discovery,
    board: &Board,
    queue: &mut VecDeque<BoardId>,
    queued: &mut HashSet<BoardId>,
) {
    for child in &board.immediately_downstream_board_ids {
        if discovery.is_known(child) || !queued.insert(child.clone()) {
            continue;
        }
        queue.push_back(child.clone());
    }
}
