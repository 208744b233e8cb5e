use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Write,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Full,
    Diff,
}

/// One row of the undo journal (U). Either `content_before` or `diff_unified`
/// must be present so the pre-image can always be reconstructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub id: String,
    pub session_id: String,
    pub turn_number: u32,
    pub file_path: String,
    pub operation: FileOperation,
    pub storage_mode: StorageMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_unified: Option<String>,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub is_undone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_change_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
