#![forbid(unsafe_code)]

mod boards;
mod error;
mod ports;
mod pressure;
mod queue;

pub use error::StoreError;
pub use pressure::{Backlog, PressureConfig};

use bg_core::BoardId;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const DB_FILE: &str = "boardgraph.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    pressure: PressureConfig,
    fixed_now: Option<i64>,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(storage_dir, PressureConfig::default())
    }

    pub fn open_with(
        storage_dir: impl AsRef<Path>,
        pressure: PressureConfig,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        install_schema(&conn)?;

        tracing::debug!(
            target: "boardgraph.storage",
            op = "open",
            path = %storage_dir.display(),
            "store opened"
        );
        Ok(Self {
            conn,
            pressure,
            fixed_now: None,
        })
    }

    /// Pins the clock to `now` (unix seconds); `None` returns to system time.
    pub fn set_clock(&mut self, now: Option<i64>) {
        self.fixed_now = now;
    }

    pub fn current_time(&self) -> i64 {
        self.fixed_now.unwrap_or_else(now_secs)
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS boards (
          id TEXT PRIMARY KEY,
          user_id TEXT,
          home_board INTEGER NOT NULL DEFAULT 0,
          buttons_json TEXT NOT NULL,
          grid_json TEXT NOT NULL,
          current_revision TEXT NOT NULL,
          immediately_downstream_json TEXT NOT NULL,
          immediately_upstream_json TEXT NOT NULL,
          downstream_json TEXT NOT NULL,
          total_downstream_buttons INTEGER NOT NULL DEFAULT 0,
          unlinked_downstream_buttons INTEGER NOT NULL DEFAULT 0,
          full_set_revision TEXT,
          last_tracked INTEGER,
          deferred_json TEXT,
          updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS boards_user ON boards(user_id);

        CREATE TABLE IF NOT EXISTS user_home_boards (
          user_id TEXT PRIMARY KEY,
          board_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS user_home_boards_board ON user_home_boards(board_id);

        CREATE TABLE IF NOT EXISTS scheduled_tasks (
          subject_id TEXT NOT NULL,
          action TEXT NOT NULL,
          run_at INTEGER NOT NULL,
          extra_json TEXT,
          created_at INTEGER NOT NULL,
          PRIMARY KEY (subject_id, action)
        );

        CREATE INDEX IF NOT EXISTS scheduled_tasks_due ON scheduled_tasks(run_at);
        "#,
    )?;
    Ok(())
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_secs()).unwrap_or(i64::MAX)
}

fn to_sqlite_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

fn from_sqlite_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::InvalidInput("stored count is negative"))
}

fn encode_id_list(ids: &[BoardId]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(ids)?)
}

fn decode_id_list(raw: &str) -> Result<Vec<BoardId>, StoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<String>>(trimmed)?
        .into_iter()
        .map(|id| {
            BoardId::try_from(id).map_err(|_| StoreError::InvalidInput("stored board id is invalid"))
        })
        .collect()
}
