#![forbid(unsafe_code)]

use super::*;
use bg_core::{Board, BoardPatch, ButtonGrid, DeferredTracking};
use rusqlite::{OptionalExtension, Row, Transaction, params, params_from_iter};
use std::collections::HashMap;

const BOARD_COLUMNS: &str = "id, user_id, home_board, buttons_json, grid_json, current_revision, \
     immediately_downstream_json, immediately_upstream_json, downstream_json, \
     total_downstream_buttons, unlinked_downstream_buttons, full_set_revision, last_tracked, \
     deferred_json";

// Stays well under SQLite's bound-parameter limit.
const FETCH_CHUNK: usize = 400;

impl SqliteStore {
    /// Inserts or fully replaces a board record.
    pub fn upsert_board(&mut self, board: &Board) -> Result<(), StoreError> {
        let now = self.current_time();
        let tx = self.conn.transaction()?;
        write_board_tx(&tx, board, now)?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_board(&self, id: &BoardId) -> Result<Option<Board>, StoreError> {
        let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id=?1");
        let raw = self
            .conn
            .query_row(&sql, params![id.as_str()], read_raw_board)
            .optional()?;
        raw.map(RawBoard::into_board).transpose()
    }

    /// Boards for `ids` in request order; unknown ids are skipped.
    pub fn load_boards(&self, ids: &[BoardId]) -> Result<Vec<Board>, StoreError> {
        let mut found = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(FETCH_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id IN ({placeholders})");
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter().map(BoardId::as_str)))?;
            while let Some(row) = rows.next()? {
                let board = read_raw_board(row)?.into_board()?;
                found.insert(board.id.clone(), board);
            }
        }
        let mut out = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(board) = found.remove(id) {
                out.push(board);
            }
        }
        Ok(out)
    }

    pub fn delete_board(&mut self, id: &BoardId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM boards WHERE id=?1", params![id.as_str()])?;
        if deleted == 0 {
            return Err(StoreError::UnknownBoard);
        }
        Ok(())
    }

    pub fn count_boards(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM boards", [], |row| row.get(0))?;
        from_sqlite_u64(count)
    }

    /// Reads, patches and writes back one board inside a single transaction.
    ///
    /// Returns `Ok(false)` when the board does not exist.
    pub fn apply_patch(
        &mut self,
        id: &BoardId,
        patch: &BoardPatch,
        now: i64,
    ) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id=?1");
        let raw = tx
            .query_row(&sql, params![id.as_str()], read_raw_board)
            .optional()?;
        let Some(raw) = raw else {
            return Ok(false);
        };
        let mut board = raw.into_board()?;
        if patch.apply_to(&mut board) {
            write_board_tx(&tx, &board, now)?;
        }
        tx.commit()?;
        Ok(true)
    }

    pub fn set_user_home_board(
        &mut self,
        user_id: &str,
        board_id: &BoardId,
    ) -> Result<(), StoreError> {
        if user_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("user_id must not be empty"));
        }
        self.conn.execute(
            r#"
            INSERT INTO user_home_boards(user_id, board_id) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET board_id=excluded.board_id
            "#,
            params![user_id, board_id.as_str()],
        )?;
        Ok(())
    }

    pub fn is_any_user_home_board(&self, id: &BoardId) -> Result<bool, StoreError> {
        let hit: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM user_home_boards WHERE board_id=?1 LIMIT 1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }
}

struct RawBoard {
    id: String,
    user_id: Option<String>,
    home_board: bool,
    buttons_json: String,
    grid_json: String,
    current_revision: String,
    immediately_downstream_json: String,
    immediately_upstream_json: String,
    downstream_json: String,
    total_downstream_buttons: i64,
    unlinked_downstream_buttons: i64,
    full_set_revision: Option<String>,
    last_tracked: Option<i64>,
    deferred_json: Option<String>,
}

fn read_raw_board(row: &Row<'_>) -> rusqlite::Result<RawBoard> {
    Ok(RawBoard {
        id: row.get(0)?,
        user_id: row.get(1)?,
        home_board: row.get::<_, i64>(2)? != 0,
        buttons_json: row.get(3)?,
        grid_json: row.get(4)?,
        current_revision: row.get(5)?,
        immediately_downstream_json: row.get(6)?,
        immediately_upstream_json: row.get(7)?,
        downstream_json: row.get(8)?,
        total_downstream_buttons: row.get(9)?,
        unlinked_downstream_buttons: row.get(10)?,
        full_set_revision: row.get(11)?,
        last_tracked: row.get(12)?,
        deferred_json: row.get(13)?,
    })
}

impl RawBoard {
    fn into_board(self) -> Result<Board, StoreError> {
        let id = BoardId::try_from(self.id)
            .map_err(|_| StoreError::InvalidInput("stored board id is invalid"))?;
        let grid = if self.grid_json.trim().is_empty() {
            ButtonGrid::default()
        } else {
            serde_json::from_str(&self.grid_json)?
        };
        let deferred = match self.deferred_json.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(serde_json::from_str::<DeferredTracking>(raw)?),
        };

        Ok(Board {
            id,
            user_id: self.user_id,
            home_board: self.home_board,
            buttons: serde_json::from_str(&self.buttons_json)?,
            grid,
            current_revision: self.current_revision,
            immediately_downstream_board_ids: decode_id_list(&self.immediately_downstream_json)?,
            immediately_upstream_board_ids: decode_id_list(&self.immediately_upstream_json)?,
            downstream_board_ids: decode_id_list(&self.downstream_json)?,
            total_downstream_buttons: from_sqlite_u64(self.total_downstream_buttons)?,
            unlinked_downstream_buttons: from_sqlite_u64(self.unlinked_downstream_buttons)?,
            full_set_revision: self.full_set_revision,
            last_tracked: self.last_tracked,
            deferred,
        })
    }
}

fn write_board_tx(tx: &Transaction<'_>, board: &Board, now: i64) -> Result<(), StoreError> {
    let deferred_json = board
        .deferred
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    tx.execute(
        r#"
        INSERT INTO boards(
          id, user_id, home_board, buttons_json, grid_json, current_revision,
          immediately_downstream_json, immediately_upstream_json, downstream_json,
          total_downstream_buttons, unlinked_downstream_buttons, full_set_revision,
          last_tracked, deferred_json, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(id) DO UPDATE SET
          user_id=excluded.user_id,
          home_board=excluded.home_board,
          buttons_json=excluded.buttons_json,
          grid_json=excluded.grid_json,
          current_revision=excluded.current_revision,
          immediately_downstream_json=excluded.immediately_downstream_json,
          immediately_upstream_json=excluded.immediately_upstream_json,
          downstream_json=excluded.downstream_json,
          total_downstream_buttons=excluded.total_downstream_buttons,
          unlinked_downstream_buttons=excluded.unlinked_downstream_buttons,
          full_set_revision=excluded.full_set_revision,
          last_tracked=excluded.last_tracked,
          deferred_json=excluded.deferred_json,
          updated_at=excluded.updated_at
        "#,
        params![
            board.id.as_str(),
            board.user_id,
            board.home_board,
            serde_json::to_string(&board.buttons)?,
            serde_json::to_string(&board.grid)?,
            board.current_revision,
            encode_id_list(&board.immediately_downstream_board_ids)?,
            encode_id_list(&board.immediately_upstream_board_ids)?,
            encode_id_list(&board.downstream_board_ids)?,
            to_sqlite_i64(board.total_downstream_buttons)?,
            to_sqlite_i64(board.unlinked_downstream_buttons)?,
            board.full_set_revision,
            board.last_tracked,
            deferred_json,
            now,
        ],
    )?;
    Ok(())
}
