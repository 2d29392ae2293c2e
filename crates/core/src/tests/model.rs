use super::*;
use crate::board::{BoardPatch, ButtonGrid, DeferredTracking, DeferredUpdate};
use crate::config::ConfigError;
use crate::ids::BoardIdError;
use crate::roots::{RootMemo, is_possible_home_board};
use crate::stats::{compute_edit_stats, full_set_revision, short_hash};

#[test]
fn board_id_validation() {
    assert_eq!(BoardId::try_new("").unwrap_err(), BoardIdError::Empty);
    assert_eq!(
        BoardId::try_new("bad id").unwrap_err(),
        BoardIdError::InvalidChar { ch: ' ', index: 3 }
    );
    assert_eq!(
        BoardId::try_new("x".repeat(129)).unwrap_err(),
        BoardIdError::TooLong
    );
    assert!(BoardId::try_new("board_1.v2-final").is_ok());

    let sentinel = id("abc").truncation_sentinel("_trunc");
    assert_eq!(sentinel.as_str(), "abc_trunc");
    assert!(sentinel.is_sentinel_of(&id("abc"), "_trunc"));
    assert!(!id("abc").is_sentinel_of(&id("abc"), "_trunc"));

    let long = id(&"x".repeat(128)).truncation_sentinel("_trunc");
    let reloaded: BoardId =
        serde_json::from_str(&serde_json::to_string(&long).expect("encode")).expect("decode");
    assert_eq!(reloaded, long);
}

#[test]
fn config_defaults_validate_and_json_overrides_apply() {
    let defaults = TrackingConfig::default();
    defaults.validate().expect("defaults are valid");
    assert_eq!(defaults.seed_limit(true), 500);
    assert_eq!(defaults.seed_limit(false), 250);
    assert_eq!(defaults.visited_ceiling(true), 750);
    assert_eq!(defaults.visited_ceiling(false), 375);

    let config = TrackingConfig::from_json(r#"{"far_board_limit": 12, "truncation_suffix": "_cut"}"#)
        .expect("partial config");
    assert_eq!(config.far_board_limit, 12);
    assert_eq!(config.truncation_suffix, "_cut");
    assert_eq!(config.max_depth, defaults.max_depth);

    assert!(matches!(
        TrackingConfig::from_json(r#"{"strict_depth": 9, "sync_recursion_depth": 8}"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        TrackingConfig::from_json(r##"{"truncation_suffix": "#x"}"##),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        TrackingConfig::from_json("{"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn patch_merges_upstream_markers_and_keeps_last_tracked_monotonic() {
    let mut board = board("a", &[]);
    board.immediately_upstream_board_ids = ids(&["m"]);
    board.full_set_revision = Some("abc3".to_string());
    board.last_tracked = Some(500);

    let patch = BoardPatch {
        add_upstream_board_ids: ids(&["z", "m", "b"]),
        revision_marker: Some("4".to_string()),
        last_tracked: Some(400),
        ..BoardPatch::default()
    };
    assert!(patch.apply_to(&mut board));
    assert_eq!(board.immediately_upstream_board_ids, ids(&["b", "m", "z"]));
    assert_eq!(board.full_set_revision.as_deref(), Some("abc3-4"));
    assert_eq!(board.last_tracked, Some(500));

    let repeat = BoardPatch {
        add_upstream_board_ids: ids(&["m"]),
        last_tracked: Some(450),
        ..BoardPatch::default()
    };
    assert!(!repeat.apply_to(&mut board));
    assert!(BoardPatch::default().is_empty());
}

#[test]
fn deferred_context_merges_and_clears() {
    let mut board = board("a", &[]);
    let merge = |visited: &[&str], depth, buttons_changed| BoardPatch {
        deferred: DeferredUpdate::Merge(DeferredTracking {
            visited_ids: ids(visited),
            depth,
            buttons_changed,
        }),
        ..BoardPatch::default()
    };

    merge(&["c", "b"], 4, false).apply_to(&mut board);
    merge(&["b", "a"], 2, true).apply_to(&mut board);
    let parked = board.deferred.clone().expect("parked");
    assert_eq!(parked.visited_ids, ids(&["a", "b", "c"]));
    assert_eq!(parked.depth, 4);
    assert!(parked.buttons_changed);

    BoardPatch {
        deferred: DeferredUpdate::Clear,
        ..BoardPatch::default()
    }
    .apply_to(&mut board);
    assert!(board.deferred.is_none());
}

#[test]
fn edit_stats_count_visible_placed_buttons() {
    let mut board = board("a", &["b", "c"]);
    board.buttons[1].hidden = true;
    let stats = compute_edit_stats(&board);
    assert_eq!(stats.total_buttons, 2);
    assert_eq!(stats.unlinked_buttons, 1);
    assert_eq!(stats.revision, "rev-a");

    board.grid = ButtonGrid {
        rows: 1,
        columns: 2,
        order: vec![vec![Some("a-0".to_string()), None]],
    };
    let placed = compute_edit_stats(&board);
    assert_eq!(placed.total_buttons, 1);
    assert_eq!(placed.unlinked_buttons, 0);
}

#[test]
fn full_set_revision_is_order_sensitive_and_counts_members() {
    let markers = vec!["r1".to_string(), "r2".to_string()];
    let swapped = vec!["r2".to_string(), "r1".to_string()];
    let revision = full_set_revision(&markers, 10);
    assert_eq!(revision, format!("{}2", short_hash("r1_r2", 10)));
    assert_ne!(revision, full_set_revision(&swapped, 10));
    assert_eq!(short_hash("r1_r2", 64).len(), 64);
}

#[test]
fn structural_roots_are_memoized_per_job() {
    let mut graph = graph_of(&[("p", &["a"]), ("a", &[])]);
    let p = stored(&graph, "p");
    let a = stored(&graph, "a");
    assert!(is_possible_home_board(&p, false));
    assert!(!is_possible_home_board(&a, false));
    assert!(is_possible_home_board(&a, true));

    let mut memo = RootMemo::default();
    assert!(!memo.is_structural_root(&mut graph, &a).expect("root check"));
    graph.set_user_home_board("u1", id("a"));
    assert!(
        !memo.is_structural_root(&mut graph, &a).expect("memoized"),
        "answer is fixed for the rest of the job"
    );
    assert!(RootMemo::default()
        .is_structural_root(&mut graph, &a)
        .expect("fresh memo"));
}
