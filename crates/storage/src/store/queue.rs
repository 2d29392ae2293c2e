#![forbid(unsafe_code)]

use super::*;
use bg_core::{ScheduledTask, TaskKey};
use rusqlite::{OptionalExtension, params};

const MAX_CLAIM_LIMIT: usize = 1_000;

impl SqliteStore {
    pub fn scheduled_task(&self, key: &TaskKey) -> Result<Option<ScheduledTask>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT run_at, extra_json FROM scheduled_tasks WHERE subject_id=?1 AND action=?2",
                params![key.subject_id, key.action],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((run_at, extra_json)) = row else {
            return Ok(None);
        };
        Ok(Some(ScheduledTask {
            key: key.clone(),
            run_at,
            extra: decode_extra(extra_json)?,
        }))
    }

    /// Creates the task for `key`, or moves the existing one to `run_at`.
    pub fn upsert_task(
        &mut self,
        key: &TaskKey,
        run_at: i64,
        extra: Option<&serde_json::Value>,
    ) -> Result<(), StoreError> {
        if key.subject_id.is_empty() || key.action.is_empty() {
            return Err(StoreError::InvalidInput("task key must not be empty"));
        }
        let extra_json = extra.map(serde_json::to_string).transpose()?;
        let now = self.current_time();
        self.conn.execute(
            r#"
            INSERT INTO scheduled_tasks(subject_id, action, run_at, extra_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(subject_id, action) DO UPDATE SET
              run_at=excluded.run_at,
              extra_json=excluded.extra_json
            "#,
            params![key.subject_id, key.action, run_at, extra_json, now],
        )?;
        Ok(())
    }

    /// Removes and returns up to `limit` tasks due at `now`, earliest first.
    ///
    /// Claimed tasks are gone from the queue; a worker that fails one has to
    /// schedule it again.
    pub fn claim_due_tasks(
        &mut self,
        now: i64,
        limit: usize,
    ) -> Result<Vec<ScheduledTask>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit.min(MAX_CLAIM_LIMIT))
            .map_err(|_| StoreError::InvalidInput("numeric overflow"))?;

        let tx = self.conn.transaction()?;
        let mut claimed = Vec::new();
        {
            let mut stmt = tx.prepare(
                r#"
                SELECT subject_id, action, run_at, extra_json
                FROM scheduled_tasks
                WHERE run_at <= ?1
                ORDER BY run_at ASC, subject_id ASC, action ASC
                LIMIT ?2
                "#,
            )?;
            let mut rows = stmt.query(params![now, limit])?;
            while let Some(row) = rows.next()? {
                claimed.push(ScheduledTask {
                    key: TaskKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    run_at: row.get(2)?,
                    extra: decode_extra(row.get(3)?)?,
                });
            }
        }
        for task in &claimed {
            tx.execute(
                "DELETE FROM scheduled_tasks WHERE subject_id=?1 AND action=?2",
                params![task.key.subject_id, task.key.action],
            )?;
        }
        tx.commit()?;

        if !claimed.is_empty() {
            tracing::debug!(
                target: "boardgraph.storage",
                op = "claim",
                claimed = claimed.len(),
                now,
                "due tasks claimed"
            );
        }
        Ok(claimed)
    }

    pub fn backlog(&self, now: i64) -> Result<Backlog, StoreError> {
        let overdue_before = now.saturating_sub(self.pressure.overdue_grace_secs);
        let (pending, overdue): (i64, i64) = self.conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN run_at <= ?1 THEN 1 ELSE 0 END), 0)
            FROM scheduled_tasks
            "#,
            params![overdue_before],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(Backlog {
            pending: from_sqlite_u64(pending)?,
            overdue: from_sqlite_u64(overdue)?,
        })
    }
}

fn decode_extra(raw: Option<String>) -> Result<Option<serde_json::Value>, StoreError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
    }
}
