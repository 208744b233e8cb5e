//! File change journal (U, §4.4): durable per-session change log with
//! unified-diff storage above a size threshold and reverse-apply undo.
//! `db` is the SQLite-backed storage layer, `diff` the unified-diff
//! generation/reverse-apply, `journal` the public capture/undo API that
//! ties them together.

pub mod db;
pub mod diff;
pub mod error;
pub mod journal;

pub use db::JournalDb;
pub use diff::{apply_reverse, generate_unified_diff, round_trips};
pub use error::JournalError;
pub use journal::{CapturedWrite, Journal, TurnUndoReport, UndoOutcome};
