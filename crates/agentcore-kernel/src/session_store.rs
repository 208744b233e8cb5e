//! Session store (§6): `sessions`, `entries`, `checkpoints` tables, migrated
//! idempotently on open the same way `agentcore-journal`'s `JournalDb` does
//! it — a `schema_version` row gates one-time `ALTER`/`CREATE` statements.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::KernelError;

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub message_count: u64,
    pub token_count: u64,
}

#[derive(Debug, Clone)]
pub struct EntryRow {
    pub session_id: String,
    pub seq: i64,
    pub entry_type: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CheckpointRow {
    pub id: String,
    pub session_id: String,
    pub state_blob: Value,
    pub description: String,
    pub ts: DateTime<Utc>,
}

/// Connection manager for the session store. Shared per process; every
/// access goes through the async mutex so callers can hold `&self` across
/// `.await` points, matching the journal's own concurrency model.
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    pub async fn open(db_path: &Path) -> Result<Self, KernelError> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute("PRAGMA synchronous = NORMAL", [])?;

        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), KernelError> {
        let conn = self.conn.lock().await;

        conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", [])?;
        let current: Option<i64> =
            conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |r| r.get(0)).optional()?;
        if current.is_none() {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_active_at TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                token_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                type TEXT NOT NULL,
                payload TEXT NOT NULL,
                ts TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                state_blob TEXT NOT NULL,
                description TEXT NOT NULL,
                ts TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute("CREATE INDEX IF NOT EXISTS idx_checkpoints_session ON checkpoints (session_id, ts)", [])?;

        Ok(())
    }

    pub async fn upsert_session(&self, row: &SessionRow) -> Result<(), KernelError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sessions (id, name, created_at, last_active_at, message_count, token_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                last_active_at = excluded.last_active_at,
                message_count = excluded.message_count,
                token_count = excluded.token_count",
            params![
                row.id,
                row.name,
                row.created_at.to_rfc3339(),
                row.last_active_at.to_rfc3339(),
                row.message_count,
                row.token_count
            ],
        )?;
        Ok(())
    }

    /// Append one entry, assigning the next `seq` for this session so reads
    /// ordered by `(session_id, seq)` reconstruct insertion order (§6).
    pub async fn append_entry(&self, session_id: &str, entry_type: &str, payload: Value) -> Result<i64, KernelError> {
        let conn = self.conn.lock().await;
        let next_seq: i64 = conn
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM entries WHERE session_id = ?1", params![session_id], |r| r.get(0))?;
        conn.execute(
            "INSERT INTO entries (session_id, seq, type, payload, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, next_seq, entry_type, payload.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(next_seq)
    }

    pub async fn entries_for_session(&self, session_id: &str) -> Result<Vec<EntryRow>, KernelError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT session_id, seq, type, payload, ts FROM entries WHERE session_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |r| {
                let payload_str: String = r.get(3)?;
                let ts_str: String = r.get(4)?;
                Ok(EntryRow {
                    session_id: r.get(0)?,
                    seq: r.get(1)?,
                    entry_type: r.get(2)?,
                    payload: serde_json::from_str(&payload_str).unwrap_or(Value::Null),
                    ts: DateTime::parse_from_rfc3339(&ts_str).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn save_checkpoint(&self, row: &CheckpointRow, max_checkpoints: usize) -> Result<(), KernelError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO checkpoints (id, session_id, state_blob, description, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.id, row.session_id, row.state_blob.to_string(), row.description, row.ts.to_rfc3339()],
        )?;

        // Evict the oldest checkpoints beyond the configured cap so the
        // table doesn't grow unbounded over a long-running session.
        conn.execute(
            "DELETE FROM checkpoints WHERE session_id = ?1 AND id NOT IN (
                SELECT id FROM checkpoints WHERE session_id = ?1 ORDER BY ts DESC LIMIT ?2
             )",
            params![row.session_id, max_checkpoints as i64],
        )?;
        Ok(())
    }

    pub async fn checkpoints_for_session(&self, session_id: &str) -> Result<Vec<CheckpointRow>, KernelError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, state_blob, description, ts FROM checkpoints WHERE session_id = ?1 ORDER BY ts ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |r| {
                let blob_str: String = r.get(2)?;
                let ts_str: String = r.get(4)?;
                Ok(CheckpointRow {
                    id: r.get(0)?,
                    session_id: r.get(1)?,
                    state_blob: serde_json::from_str(&blob_str).unwrap_or(Value::Null),
                    description: r.get(3)?,
                    ts: DateTime::parse_from_rfc3339(&ts_str).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn entries_read_back_in_seq_order() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(&dir.path().join("sessions.db")).await.unwrap();

        store.append_entry("s1", "llm.request", json!({"n": 1})).await.unwrap();
        store.append_entry("s1", "llm.response", json!({"n": 2})).await.unwrap();
        store.append_entry("s1", "tool.execution", json!({"n": 3})).await.unwrap();

        let entries = store.entries_for_session("s1").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].seq, 1);
        assert_eq!(entries[2].payload["n"], 3);
    }

    #[tokio::test]
    async fn checkpoint_cap_evicts_oldest() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(&dir.path().join("sessions.db")).await.unwrap();

        for i in 0..5 {
            store
                .save_checkpoint(
                    &CheckpointRow {
                        id: format!("cp-{i}"),
                        session_id: "s1".to_string(),
                        state_blob: json!({"i": i}),
                        description: "step".to_string(),
                        ts: Utc::now(),
                    },
                    3,
                )
                .await
                .unwrap();
        }

        let checkpoints = store.checkpoints_for_session("s1").await.unwrap();
        assert_eq!(checkpoints.len(), 3);
    }
}
