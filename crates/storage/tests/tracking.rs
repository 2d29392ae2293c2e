use bg_core::{
    Board, BoardId, Button, Engine, JobScope, LoadBoard, TaskKey, TaskRun, TrackOutcome,
    TrackRequest, TrackStatus, TrackingConfig,
};
use bg_storage::{PressureConfig, SqliteStore};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "bg_storage_{test_name}_{}_{}",
        std::process::id(),
        nanos
    ));
    dir
}

fn id(raw: &str) -> BoardId {
    BoardId::try_new(raw).expect("board id")
}

fn board_linking(name: &str, targets: &[&str]) -> Board {
    let mut board = Board::new(id(name));
    board.user_id = Some("owner".to_string());
    board.buttons = targets
        .iter()
        .enumerate()
        .map(|(index, target)| Button {
            id: format!("{name}-{index}"),
            label: Some((*target).to_string()),
            load_board: Some(LoadBoard {
                id: Some(id(target)),
                key: None,
            }),
            hidden: false,
        })
        .collect();
    board.buttons.push(Button {
        id: format!("{name}-word"),
        label: Some("word".to_string()),
        ..Button::default()
    });
    board
}

/// Saves every board through the grid-saved entry point, the way an editor would.
fn save_all(store: &mut SqliteStore, config: &TrackingConfig, boards: &[Board]) {
    for board in boards {
        store.upsert_board(board).expect("upsert");
    }
    let mut scope = JobScope::new();
    let mut engine = Engine::new(store, config);
    for board in boards {
        engine
            .on_button_grid_saved(board, true, &mut scope)
            .expect("grid saved");
    }
}

/// Claims and runs due tasks until the queue is empty, moving the clock past each delay.
fn run_worker(store: &mut SqliteStore, config: &TrackingConfig, mut now: i64) -> Vec<TaskRun> {
    let mut runs = Vec::new();
    for _ in 0..20 {
        now += config.extended_delay_secs + 1;
        store.set_clock(Some(now));
        let due = store.claim_due_tasks(now, 100).expect("claim");
        if due.is_empty() {
            return runs;
        }
        for task in due {
            let mut scope = JobScope::new();
            let mut engine = Engine::new(&mut *store, config);
            runs.push(engine.run_task(&task, &mut scope).expect("run task"));
            engine.finish_job(&mut scope).expect("finish job");
        }
    }
    panic!("worker did not go idle");
}

#[test]
fn saved_grids_converge_to_closures_through_the_queue() {
    let dir = temp_dir("converge");
    let config = TrackingConfig::default();
    let mut store = SqliteStore::open(&dir).expect("open store");
    store.set_clock(Some(10_000));

    let boards = vec![
        board_linking("root", &["mid"]),
        board_linking("mid", &["leaf", "side"]),
        board_linking("side", &["leaf"]),
        board_linking("leaf", &[]),
    ];
    save_all(&mut store, &config, &boards);
    for board in &boards {
        assert!(
            store
                .load_board(&board.id)
                .expect("load")
                .expect("present")
                .deferred
                .is_some()
        );
    }

    let runs = run_worker(&mut store, &config, 10_000);
    assert!(runs.iter().any(|run| matches!(run, TaskRun::AvailableBoards { user_id } if user_id == "owner")));

    let root = store.load_board(&id("root")).expect("load").expect("root");
    assert_eq!(root.downstream_board_ids, vec![id("leaf"), id("mid"), id("side")]);
    // mid: 2 links + word, side: link + word, leaf: word.
    assert_eq!(root.total_downstream_buttons, 6);
    assert_eq!(root.unlinked_downstream_buttons, 3);
    assert!(root.deferred.is_none());

    let leaf = store.load_board(&id("leaf")).expect("load").expect("leaf");
    assert_eq!(leaf.immediately_upstream_board_ids, vec![id("mid"), id("side")]);

    // Nothing left to do: another pass over root is a no-op.
    let mut scope = JobScope::new();
    let outcome = Engine::new(&mut store, &config)
        .run_tracking_sequence(&id("root"), TrackRequest::default(), &mut scope)
        .expect("track");
    let TrackOutcome::Ok(report) = outcome else {
        panic!("root is never delayed");
    };
    assert_eq!(report.status, TrackStatus::Unchanged);
}

#[test]
fn queue_backlog_delays_non_root_tracking() {
    let dir = temp_dir("backlog_delay");
    let config = TrackingConfig::default();
    let pressure = PressureConfig {
        any_pressure_backlog: 1,
        heavy_pressure_backlog: 100,
        overdue_grace_secs: 0,
    };
    let mut store = SqliteStore::open_with(&dir, pressure).expect("open store");
    store.set_clock(Some(5_000));

    let mut parent = board_linking("parent", &["child"]);
    parent.immediately_downstream_board_ids = vec![id("child")];
    let mut child = board_linking("child", &[]);
    child.immediately_upstream_board_ids = vec![id("parent")];
    store.upsert_board(&parent).expect("upsert");
    store.upsert_board(&child).expect("upsert");
    store
        .upsert_task(&TaskKey::available_boards("someone"), 1_000, None)
        .expect("stale task");

    let mut scope = JobScope::new();
    let outcome = Engine::new(&mut store, &config)
        .run_tracking_sequence(&id("child"), TrackRequest::default(), &mut scope)
        .expect("track");
    assert!(outcome.is_delayed());

    let task = store
        .scheduled_task(&TaskKey::track(&id("child")))
        .expect("lookup")
        .expect("queued");
    assert_eq!(task.run_at, 5_000 + config.default_delay_secs);
    assert!(store.load_board(&id("child")).expect("load").expect("child").last_tracked.is_none());

    // The root is tracked regardless.
    let outcome = Engine::new(&mut store, &config)
        .run_tracking_sequence(&id("parent"), TrackRequest::default(), &mut scope)
        .expect("track");
    assert!(!outcome.is_delayed());
}
