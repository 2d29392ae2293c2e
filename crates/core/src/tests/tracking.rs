use super::*;
use crate::ports::{AVAILABLE_BOARDS_ACTION, TaskKey};
use crate::tracker::{FollowUp, TrackStatus};
use crate::visited::VisitedSet;

#[test]
fn fresher_last_tracked_short_circuits_the_sequence() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("a", &["b"]), ("b", &[])]);
    let mut a = stored(&graph, "a");
    a.last_tracked = Some(T0 + 50);
    graph.insert_board(a);

    let outcome = run(
        &mut graph,
        &config,
        "a",
        TrackRequest {
            trigger_stamp: Some(T0 + 10),
            ..TrackRequest::default()
        },
    );
    let report = outcome.report().expect("report");
    assert_eq!(report.status, TrackStatus::ShortCircuited);
    assert!(graph.persist_log.is_empty());
    assert!(stored(&graph, "a").downstream_board_ids.is_empty());
}

#[test]
fn missing_board_is_reported_not_raised() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("a", &[])]);

    let report = track(&mut graph, &config, "gone");
    assert_eq!(report.status, TrackStatus::Missing);
}

#[test]
fn pressure_delays_non_root_boards_without_computing() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("p", &["a"]), ("a", &["b"]), ("b", &[])]);
    graph.set_pressure(true, false);

    let outcome = run(&mut graph, &config, "a", TrackRequest::default());
    assert!(outcome.is_delayed());

    let a = stored(&graph, "a");
    assert!(a.downstream_board_ids.is_empty());
    assert!(a.last_tracked.is_none());
    assert!(a.deferred.is_some());
    let task = graph.task(&TaskKey::track(&id("a"))).expect("track task");
    assert_eq!(task.run_at, T0 + config.default_delay_secs);
    assert!(stored(&graph, "b").immediately_upstream_board_ids.contains(&id("a")));
    assert_eq!(graph.persist_count(&id("b")), 0);
}

#[test]
fn structural_roots_are_tracked_under_pressure() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[
        ("top", &["a"]),
        ("flagged", &["a"]),
        ("users", &["a"]),
        ("parent", &["flagged", "users"]),
        ("a", &[]),
    ]);
    let mut flagged = stored(&graph, "flagged");
    flagged.home_board = true;
    graph.insert_board(flagged);
    graph.set_user_home_board("u1", id("users"));
    graph.set_pressure(true, true);

    for name in ["top", "flagged", "users"] {
        let outcome = run(&mut graph, &config, name, TrackRequest::default());
        assert!(!outcome.is_delayed(), "{name} is a structural root");
        assert_eq!(stored(&graph, name).downstream_board_ids, ids(&["a"]));
    }
}

#[test]
fn resumed_runs_are_not_gated_again() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("p", &["a"]), ("a", &["b"]), ("b", &[])]);
    graph.set_pressure(true, false);

    let outcome = run(
        &mut graph,
        &config,
        "a",
        TrackRequest {
            resumed: true,
            ..TrackRequest::default()
        },
    );
    let report = outcome.report().expect("report");
    assert_eq!(report.status, TrackStatus::Persisted);
    assert_eq!(stored(&graph, "a").downstream_board_ids, ids(&["b"]));
}

#[test]
fn every_tracking_run_repairs_back_edges() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("a", &["b", "c"]), ("b", &[]), ("c", &[])]);
    for name in ["b", "c"] {
        let mut child = stored(&graph, name);
        child.immediately_upstream_board_ids.clear();
        graph.insert_board(child);
    }
    let mut a = stored(&graph, "a");
    a.downstream_board_ids = ids(&["b", "c"]);
    graph.insert_board(a);

    let first = track(&mut graph, &config, "a");
    for name in ["b", "c"] {
        assert_eq!(stored(&graph, name).immediately_upstream_board_ids, ids(&["a"]));
    }
    assert!(matches!(first.follow_up, FollowUp::Propagated(ref fan) if fan.repaired == 2));

    graph.advance(5);
    let second = track(&mut graph, &config, "a");
    assert_eq!(second.follow_up, FollowUp::Repaired);
    assert_eq!(graph.persist_count(&id("b")), 1);
}

#[test]
fn buttons_changed_propagates_even_without_closure_changes() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("p", &["a"]), ("a", &[]), ("root", &["p"])]);
    track(&mut graph, &config, "a");
    graph.advance(5);

    let outcome = run(
        &mut graph,
        &config,
        "a",
        TrackRequest {
            buttons_changed: true,
            ..TrackRequest::default()
        },
    );
    let report = outcome.report().expect("report");
    assert_eq!(report.status, TrackStatus::Unchanged);
    let FollowUp::Propagated(fan) = &report.follow_up else {
        panic!("expected fan-out, got {:?}", report.follow_up);
    };
    assert_eq!(fan.deferred, ids(&["p"]));
}

#[test]
fn available_boards_are_collected_per_job_and_scheduled_at_the_end() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("a", &["b"]), ("b", &[])]);
    let mut a = stored(&graph, "a");
    a.user_id = Some("u7".to_string());
    graph.insert_board(a);

    let mut scope = JobScope::new();
    let mut engine = Engine::new(&mut graph, &config);
    engine
        .run_tracking_sequence(
            &id("a"),
            TrackRequest {
                update_available_boards: true,
                ..TrackRequest::default()
            },
            &mut scope,
        )
        .expect("track");
    assert_eq!(scope.available_boards_users().collect::<Vec<_>>(), vec!["u7"]);
    assert_eq!(scope.tracked(), ids(&["a"]).as_slice());

    assert_eq!(engine.finish_job(&mut scope).expect("finish"), 1);
    assert_eq!(engine.finish_job(&mut scope).expect("finish again"), 0);

    let task = graph
        .task(&TaskKey::available_boards("u7"))
        .expect("available boards task");
    assert_eq!(task.key.action, AVAILABLE_BOARDS_ACTION);
    assert_eq!(task.run_at, T0);
}

#[test]
fn depth_from_the_request_is_reported_by_the_fan_out() {
    let config = TrackingConfig::default();
    let mut graph = graph_of(&[("p", &["a"]), ("a", &[])]);

    let outcome = run(
        &mut graph,
        &config,
        "a",
        TrackRequest {
            visited: VisitedSet::with_depth(3),
            ..TrackRequest::default()
        },
    );
    let FollowUp::Propagated(fan) = &outcome.report().expect("report").follow_up else {
        panic!("expected fan-out");
    };
    assert_eq!(fan.depth, 3);
    assert!(!fan.strict);
    assert_eq!(fan.deferred, ids(&["p"]));
    let parked = stored(&graph, "p").deferred.expect("parked context");
    assert_eq!(parked.depth, 4);
    assert!(parked.visited_ids.contains(&id("a")));
}
