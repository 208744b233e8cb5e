use std::path::Path;

use agentcore_types::{FileChange, FileOperation, StorageMode};
use chrono::Utc;
use uuid::Uuid;

use crate::db::JournalDb;
use crate::diff::{apply_reverse, generate_unified_diff};
use crate::error::JournalError;

/// Combined before+after size above which only the diff (plus the
/// post-image) is stored, not both full bodies.
pub const FULL_STORAGE_THRESHOLD_BYTES: u64 = 50 * 1024;

#[derive(Debug, Clone)]
pub struct CapturedWrite {
    pub session_id: String,
    pub turn_number: u32,
    pub tool_call_id: Option<String>,
    pub file_path: String,
    pub operation: FileOperation,
    pub content_before: Option<String>,
    pub content_after: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone,
    AlreadyUndone,
}

#[derive(Debug)]
pub struct TurnUndoReport {
    pub undone: Vec<String>,
    pub already_undone: Vec<String>,
    pub failed_at: Option<(String, String)>,
}

/// Wraps file-mutating tool calls to capture pre/post images, decides the
/// storage representation, and performs (reverse-apply) undo.
pub struct Journal {
    db: JournalDb,
}

impl Journal {
    pub async fn open(db_path: &Path) -> Result<Self, JournalError> {
        Ok(Self { db: JournalDb::open(db_path).await? })
    }

    /// Record one captured write, choosing full vs diff storage based on
    /// combined body size.
    pub async fn capture(&self, write: CapturedWrite) -> Result<FileChange, JournalError> {
        let before_bytes = write.content_before.as_deref().map(str::len).unwrap_or(0) as u64;
        let after_bytes = write.content_after.as_deref().map(str::len).unwrap_or(0) as u64;
        let combined = before_bytes + after_bytes;

        let (storage_mode, content_before, diff_unified) = if combined <= FULL_STORAGE_THRESHOLD_BYTES {
            (StorageMode::Full, write.content_before.clone(), None)
        } else {
            let before = write.content_before.clone().unwrap_or_default();
            let after = write.content_after.clone().unwrap_or_default();
            (StorageMode::Diff, None, Some(generate_unified_diff(&before, &after)))
        };

        let change = FileChange {
            id: Uuid::new_v4().to_string(),
            session_id: write.session_id,
            turn_number: write.turn_number,
            file_path: write.file_path,
            operation: write.operation,
            storage_mode,
            content_before,
            content_after: write.content_after,
            diff_unified,
            bytes_before: before_bytes,
            bytes_after: after_bytes,
            is_undone: false,
            undo_change_id: None,
            tool_call_id: write.tool_call_id,
            created_at: Utc::now(),
        };

        self.db.insert_change(&change).await?;
        Ok(change)
    }

    /// Reconstruct the pre-image for a stored change, from either the
    /// verbatim `content_before` column or by reverse-applying the diff
    /// against `content_after`.
    fn pre_image(change: &FileChange) -> Result<Option<String>, JournalError> {
        match change.storage_mode {
            StorageMode::Full => Ok(change.content_before.clone()),
            StorageMode::Diff => match (&change.diff_unified, &change.content_after) {
                (Some(diff), Some(after)) => Ok(Some(apply_reverse(after, diff)?)),
                _ => Ok(None),
            },
        }
    }

    /// Undo one change: restores the filesystem to its pre-image and marks
    /// the row undone. Atomic per change — if the filesystem write fails,
    /// the row is left untouched so a retry sees it as still pending.
    pub async fn undo_change(&self, change_id: &str) -> Result<UndoOutcome, JournalError> {
        let change = self.db.get(change_id).await?.ok_or_else(|| JournalError::NotFound(change_id.to_string()))?;
        if change.is_undone {
            return Ok(UndoOutcome::AlreadyUndone);
        }

        match change.operation {
            FileOperation::Create => {
                tokio::fs::remove_file(&change.file_path).await.ok();
            }
            FileOperation::Delete => {
                if let Some(pre) = Self::pre_image(&change)? {
                    tokio::fs::write(&change.file_path, pre).await?;
                }
            }
            FileOperation::Write | FileOperation::Edit => match Self::pre_image(&change)? {
                Some(pre) if !pre.is_empty() => {
                    tokio::fs::write(&change.file_path, pre).await?;
                }
                _ => {
                    tokio::fs::remove_file(&change.file_path).await.ok();
                }
            },
        }

        let undo_id = Uuid::new_v4().to_string();
        self.db.mark_undone(&change.id, &undo_id).await?;
        Ok(UndoOutcome::Undone)
    }

    /// Undo every non-undone row for a turn, in reverse insertion order
    /// (`for_turn` already returns most-recent first). Stops at the first
    /// failure and reports what got through.
    pub async fn undo_turn(&self, session_id: &str, turn_number: u32) -> Result<TurnUndoReport, JournalError> {
        let rows = self.db.for_turn(session_id, turn_number).await?;
        let mut report = TurnUndoReport { undone: Vec::new(), already_undone: Vec::new(), failed_at: None };

        for row in rows {
            if row.is_undone {
                report.already_undone.push(row.id);
                continue;
            }
            match self.undo_change(&row.id).await {
                Ok(UndoOutcome::Undone) => report.undone.push(row.id),
                Ok(UndoOutcome::AlreadyUndone) => report.already_undone.push(row.id),
                Err(e) => {
                    report.failed_at = Some((row.id, e.to_string()));
                    break;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn journal() -> (Journal, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("journal.sqlite3");
        (Journal::open(&db_path).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn small_write_is_stored_full() {
        let (journal, dir) = journal().await;
        let path = dir.path().join("a.txt");
        let change = journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 1,
                tool_call_id: Some("tc1".into()),
                file_path: path.to_string_lossy().into_owned(),
                operation: FileOperation::Write,
                content_before: Some("old".into()),
                content_after: Some("new".into()),
            })
            .await
            .unwrap();
        assert_eq!(change.storage_mode, StorageMode::Full);
        assert!(change.diff_unified.is_none());
    }

    #[tokio::test]
    async fn large_write_is_stored_as_diff() {
        let (journal, dir) = journal().await;
        let path = dir.path().join("b.txt");
        let before = "x".repeat(30 * 1024);
        let after = "y".repeat(30 * 1024);
        let change = journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 1,
                tool_call_id: None,
                file_path: path.to_string_lossy().into_owned(),
                operation: FileOperation::Write,
                content_before: Some(before),
                content_after: Some(after),
            })
            .await
            .unwrap();
        assert_eq!(change.storage_mode, StorageMode::Diff);
        assert!(change.content_before.is_none());
        assert!(change.diff_unified.is_some());
    }

    #[tokio::test]
    async fn undo_restores_pre_image_for_write() {
        let (journal, dir) = journal().await;
        let path = dir.path().join("c.txt");
        tokio::fs::write(&path, "new content").await.unwrap();
        let change = journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 1,
                tool_call_id: None,
                file_path: path.to_string_lossy().into_owned(),
                operation: FileOperation::Write,
                content_before: Some("old content".into()),
                content_after: Some("new content".into()),
            })
            .await
            .unwrap();

        let outcome = journal.undo_change(&change.id).await.unwrap();
        assert_eq!(outcome, UndoOutcome::Undone);
        let restored = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(restored, "old content");
    }

    #[tokio::test]
    async fn undo_is_idempotent() {
        let (journal, dir) = journal().await;
        let path = dir.path().join("d.txt");
        tokio::fs::write(&path, "v2").await.unwrap();
        let change = journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 1,
                tool_call_id: None,
                file_path: path.to_string_lossy().into_owned(),
                operation: FileOperation::Write,
                content_before: Some("v1".into()),
                content_after: Some("v2".into()),
            })
            .await
            .unwrap();

        assert_eq!(journal.undo_change(&change.id).await.unwrap(), UndoOutcome::Undone);
        assert_eq!(journal.undo_change(&change.id).await.unwrap(), UndoOutcome::AlreadyUndone);
    }

    #[tokio::test]
    async fn undo_turn_processes_in_reverse_insertion_order() {
        let (journal, dir) = journal().await;
        let path_a = dir.path().join("e.txt");
        let path_b = dir.path().join("f.txt");
        tokio::fs::write(&path_a, "a2").await.unwrap();
        tokio::fs::write(&path_b, "b2").await.unwrap();

        journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 7,
                tool_call_id: None,
                file_path: path_a.to_string_lossy().into_owned(),
                operation: FileOperation::Write,
                content_before: Some("a1".into()),
                content_after: Some("a2".into()),
            })
            .await
            .unwrap();
        journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 7,
                tool_call_id: None,
                file_path: path_b.to_string_lossy().into_owned(),
                operation: FileOperation::Write,
                content_before: Some("b1".into()),
                content_after: Some("b2".into()),
            })
            .await
            .unwrap();

        let report = journal.undo_turn("s1", 7).await.unwrap();
        assert_eq!(report.undone.len(), 2);
        assert!(report.failed_at.is_none());
        assert_eq!(tokio::fs::read_to_string(&path_a).await.unwrap(), "a1");
        assert_eq!(tokio::fs::read_to_string(&path_b).await.unwrap(), "b1");
    }

    #[tokio::test]
    async fn undo_create_deletes_the_file() {
        let (journal, dir) = journal().await;
        let path = dir.path().join("g.txt");
        tokio::fs::write(&path, "created").await.unwrap();
        let change = journal
            .capture(CapturedWrite {
                session_id: "s1".into(),
                turn_number: 1,
                tool_call_id: None,
                file_path: path.to_string_lossy().into_owned(),
                operation: FileOperation::Create,
                content_before: None,
                content_after: Some("created".into()),
            })
            .await
            .unwrap();

        journal.undo_change(&change.id).await.unwrap();
        assert!(!path.exists());
    }
}
