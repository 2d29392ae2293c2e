#![forbid(unsafe_code)]

use bg_core::{Engine, JobScope, TaskRun, TrackingConfig};
use bg_storage::{SqliteStore, StoreError};

/// Tally of one claim-and-run pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DrainStats {
    pub(crate) claimed: usize,
    pub(crate) tracked: usize,
    pub(crate) delayed: usize,
    pub(crate) available_boards: usize,
    pub(crate) skipped: usize,
    pub(crate) failed: usize,
}

/// Claims up to `limit` due tasks and runs each in its own job.
///
/// A task that fails is put back on the queue `default_delay_secs` out; the
/// pass itself only fails when the store does.
pub(crate) fn drain_once(
    store: &mut SqliteStore,
    config: &TrackingConfig,
    limit: usize,
) -> Result<DrainStats, StoreError> {
    let now = store.current_time();
    let tasks = store.claim_due_tasks(now, limit)?;
    let mut stats = DrainStats {
        claimed: tasks.len(),
        ..DrainStats::default()
    };

    for task in &tasks {
        let mut scope = JobScope::new();
        let mut engine = Engine::new(&mut *store, config);
        match engine.run_task(task, &mut scope) {
            Ok(TaskRun::Tracked(outcome)) if outcome.is_delayed() => stats.delayed += 1,
            Ok(TaskRun::Tracked(_)) => stats.tracked += 1,
            Ok(TaskRun::AvailableBoards { .. }) => stats.available_boards += 1,
            Ok(TaskRun::Skipped) => stats.skipped += 1,
            Err(err) => {
                stats.failed += 1;
                tracing::warn!(
                    target: "boardgraph.worker",
                    op = "run_task",
                    subject_id = %task.key.subject_id,
                    action = %task.key.action,
                    error = %err,
                    "task failed; rescheduling"
                );
                store.upsert_task(
                    &task.key,
                    now.saturating_add(config.default_delay_secs),
                    task.extra.as_ref(),
                )?;
                continue;
            }
        }
        if let Err(err) = engine.finish_job(&mut scope) {
            tracing::warn!(
                target: "boardgraph.worker",
                op = "finish_job",
                subject_id = %task.key.subject_id,
                error = %err,
                "end-of-job scheduling failed"
            );
        }
    }

    if stats.claimed > 0 {
        tracing::info!(
            target: "boardgraph.worker",
            op = "drain",
            claimed = stats.claimed,
            tracked = stats.tracked,
            delayed = stats.delayed,
            available_boards = stats.available_boards,
            skipped = stats.skipped,
            failed = stats.failed,
            "pass complete"
        );
    }
    Ok(stats)
}
