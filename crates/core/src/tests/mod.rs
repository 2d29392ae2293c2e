use crate::board::{Board, Button, LoadBoard};
use crate::config::TrackingConfig;
use crate::edges::derive_downstream_ids;
use crate::engine::{Engine, TaskRun};
use crate::ids::BoardId;
use crate::memory::MemoryGraph;
use crate::scope::JobScope;
use crate::tracker::{TrackOutcome, TrackReport, TrackRequest};

mod model;
mod tracking;

const T0: i64 = 1_000_000;

fn id(raw: &str) -> BoardId {
    BoardId::try_new(raw).expect("board id")
}

fn link(button_id: &str, target: &str) -> Button {
    Button {
        id: button_id.to_string(),
        label: Some(format!("to {target}")),
        load_board: Some(LoadBoard {
            id: Some(id(target)),
            key: None,
        }),
        hidden: false,
    }
}

fn plain(button_id: &str) -> Button {
    Button {
        id: button_id.to_string(),
        label: Some("word".to_string()),
        ..Button::default()
    }
}

/// A board linking to `targets` plus one unlinked button.
fn board(name: &str, targets: &[&str]) -> Board {
    let mut board = Board::new(id(name));
    board.buttons = targets
        .iter()
        .enumerate()
        .map(|(index, target)| link(&format!("{name}-{index}"), target))
        .collect();
    board.buttons.push(plain(&format!("{name}-word")));
    board.current_revision = format!("rev-{name}");
    board
}

/// Builds a graph from `(board, targets)` pairs with derived edges and back-edges.
fn graph_of(edges: &[(&str, &[&str])]) -> MemoryGraph {
    let config = TrackingConfig::default();
    let mut boards = edges
        .iter()
        .map(|(name, targets)| {
            let mut board = board(name, targets);
            board.immediately_downstream_board_ids = derive_downstream_ids(&board, &config);
            board
        })
        .collect::<Vec<_>>();
    let reverse = boards
        .iter()
        .flat_map(|board| {
            board
                .immediately_downstream_board_ids
                .iter()
                .map(|child| (child.clone(), board.id.clone()))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    for board in &mut boards {
        let mut upstream = reverse
            .iter()
            .filter(|(child, _)| child == &board.id)
            .map(|(_, parent)| parent.clone())
            .collect::<Vec<_>>();
        upstream.sort();
        upstream.dedup();
        board.immediately_upstream_board_ids = upstream;
    }

    let mut graph = MemoryGraph::new(T0);
    for board in boards {
        graph.insert_board(board);
    }
    graph
}

/// Linear chain where `names[i + 1]` links to `names[i]`.
fn chain(names: &[String]) -> MemoryGraph {
    let targets = names
        .iter()
        .enumerate()
        .map(|(index, _)| if index == 0 { Vec::new() } else { vec![names[index - 1].as_str()] })
        .collect::<Vec<_>>();
    let edges = names
        .iter()
        .zip(&targets)
        .map(|(name, targets)| (name.as_str(), targets.as_slice()))
        .collect::<Vec<_>>();
    graph_of(&edges)
}

fn run(
    graph: &mut MemoryGraph,
    config: &TrackingConfig,
    name: &str,
    request: TrackRequest,
) -> TrackOutcome {
    let mut scope = JobScope::new();
    let mut engine = Engine::new(graph, config);
    engine
        .run_tracking_sequence(&id(name), request, &mut scope)
        .expect("run tracking sequence")
}

fn track(graph: &mut MemoryGraph, config: &TrackingConfig, name: &str) -> TrackReport {
    match run(graph, config, name, TrackRequest::default()) {
        TrackOutcome::Ok(report) => report,
        TrackOutcome::Delayed => panic!("tracking {name} was delayed"),
    }
}

fn stored(graph: &MemoryGraph, name: &str) -> Board {
    graph.board(&id(name)).cloned().expect("stored board")
}

fn ids(names: &[&str]) -> Vec<BoardId> {
    names.iter().map(|name| id(name)).collect()
}

/// Runs due queue tasks round after round, advancing the clock past every
/// delay, until the queue is empty. Returns the tasks that ran.
fn drain(graph: &mut MemoryGraph, config: &TrackingConfig, max_rounds: usize) -> Vec<TaskRun> {
    let mut runs = Vec::new();
    for _ in 0..max_rounds {
        graph.advance(config.extended_delay_secs + 1);
        let now = crate::ports::Clock::now(graph);
        let due = graph.drain_due(now);
        if due.is_empty() {
            return runs;
        }
        for task in due {
            let mut scope = JobScope::new();
            let mut engine = Engine::new(&mut *graph, config);
            runs.push(engine.run_task(&task, &mut scope).expect("run task"));
            engine.finish_job(&mut scope).expect("finish job");
        }
    }
    panic!("queue did not drain within {max_rounds} rounds");
}
