use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use agentcore_types::{FileChange, FileOperation, StorageMode};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::JournalError;

const SCHEMA_VERSION: i64 = 1;

/// Connection manager for the file-change journal database. One instance is
/// shared per session; all access goes through the async mutex so callers
/// can hold `&self` across `.await` points.
pub struct JournalDb {
    conn: Arc<Mutex<Connection>>,
}

impl JournalDb {
    pub async fn open(db_path: &Path) -> Result<Self, JournalError> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute("PRAGMA synchronous = NORMAL", [])?;

        let db = Self { conn: Arc::new(Mutex::new(conn)) };
        db.init_schema().await?;
        db.validate_integrity().await;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), JournalError> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
            [],
        )?;
        let current: Option<i64> =
            conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |r| r.get(0)).optional()?;
        if current.is_none() {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS file_changes (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                tool_call_id TEXT,
                turn_number INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                operation TEXT NOT NULL,
                content_before TEXT,
                content_after TEXT,
                diff_unified TEXT,
                storage_mode TEXT NOT NULL,
                bytes_before INTEGER NOT NULL,
                bytes_after INTEGER NOT NULL,
                is_undone INTEGER NOT NULL DEFAULT 0,
                undo_change_id TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_file_changes_session_turn
             ON file_changes (session_id, turn_number)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_file_changes_session_path
             ON file_changes (session_id, file_path)",
            [],
        )?;

        Ok(())
    }

    /// `PRAGMA quick_check` is advisory here: a corrupt journal shouldn't
    /// block the session from starting, only get logged loudly.
    async fn validate_integrity(&self) {
        let conn = self.conn.lock().await;
        let check = match conn.query_row("PRAGMA quick_check(1)", [], |row| row.get::<_, String>(0)) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("journal integrity probe failed: {err}");
                return;
            }
        };
        if !check.trim().eq_ignore_ascii_case("ok") {
            tracing::warn!("journal database quick_check returned: {check}");
        }
    }

    pub async fn insert_change(&self, change: &FileChange) -> Result<(), JournalError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO file_changes (
                id, session_id, tool_call_id, turn_number, file_path, operation,
                content_before, content_after, diff_unified, storage_mode,
                bytes_before, bytes_after, is_undone, undo_change_id, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                change.id,
                change.session_id,
                change.tool_call_id,
                change.turn_number,
                change.file_path,
                operation_to_str(change.operation),
                change.content_before,
                change.content_after,
                change.diff_unified,
                storage_mode_to_str(change.storage_mode),
                change.bytes_before,
                change.bytes_after,
                change.is_undone as i64,
                change.undo_change_id,
                change.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn get(&self, change_id: &str) -> Result<Option<FileChange>, JournalError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, session_id, tool_call_id, turn_number, file_path, operation,
                    content_before, content_after, diff_unified, storage_mode,
                    bytes_before, bytes_after, is_undone, undo_change_id, created_at
             FROM file_changes WHERE id = ?1",
            params![change_id],
            row_to_change,
        )
        .optional()
        .map_err(JournalError::from)
    }

    pub async fn for_turn(&self, session_id: &str, turn_number: u32) -> Result<Vec<FileChange>, JournalError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, tool_call_id, turn_number, file_path, operation,
                    content_before, content_after, diff_unified, storage_mode,
                    bytes_before, bytes_after, is_undone, undo_change_id, created_at
             FROM file_changes WHERE session_id = ?1 AND turn_number = ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![session_id, turn_number], row_to_change)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn mark_undone(&self, change_id: &str, undo_change_id: &str) -> Result<(), JournalError> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "UPDATE file_changes SET is_undone = 1, undo_change_id = ?2 WHERE id = ?1",
            params![change_id, undo_change_id],
        )?;
        if affected == 0 {
            return Err(JournalError::NotFound(change_id.to_string()));
        }
        Ok(())
    }
}

fn operation_to_str(op: FileOperation) -> &'static str {
    match op {
        FileOperation::Create => "create",
        FileOperation::Write => "write",
        FileOperation::Edit => "edit",
        FileOperation::Delete => "delete",
    }
}

fn operation_from_str(s: &str) -> Result<FileOperation, rusqlite::Error> {
    match s {
        "create" => Ok(FileOperation::Create),
        "write" => Ok(FileOperation::Write),
        "edit" => Ok(FileOperation::Edit),
        "delete" => Ok(FileOperation::Delete),
        other => Err(rusqlite::Error::InvalidColumnName(format!("unknown operation `{other}`"))),
    }
}

fn storage_mode_to_str(mode: StorageMode) -> &'static str {
    match mode {
        StorageMode::Full => "full",
        StorageMode::Diff => "diff",
    }
}

fn storage_mode_from_str(s: &str) -> Result<StorageMode, rusqlite::Error> {
    match s {
        "full" => Ok(StorageMode::Full),
        "diff" => Ok(StorageMode::Diff),
        other => Err(rusqlite::Error::InvalidColumnName(format!("unknown storage mode `{other}`"))),
    }
}

fn row_to_change(row: &rusqlite::Row) -> rusqlite::Result<FileChange> {
    let operation: String = row.get(5)?;
    let storage_mode: String = row.get(9)?;
    let created_at: String = row.get(14)?;
    Ok(FileChange {
        id: row.get(0)?,
        session_id: row.get(1)?,
        tool_call_id: row.get(2)?,
        turn_number: row.get(3)?,
        file_path: row.get(4)?,
        operation: operation_from_str(&operation)?,
        content_before: row.get(6)?,
        content_after: row.get(7)?,
        diff_unified: row.get(8)?,
        storage_mode: storage_mode_from_str(&storage_mode)?,
        bytes_before: row.get(10)?,
        bytes_after: row.get(11)?,
        is_undone: row.get::<_, i64>(12)? != 0,
        undo_change_id: row.get(13)?,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| rusqlite::Error::InvalidColumnType(14, e.to_string(), rusqlite::types::Type::Text))?,
    })
}
