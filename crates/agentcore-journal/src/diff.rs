//! Unified-diff generation and reverse-apply for the file-change journal (U).
//!
//! Generation delegates to `similar`. Reverse-apply is hand-rolled to the
//! exact algorithm the journal schema was designed around: walk each hunk's
//! context/remove/add lines and undo them in place. It assumes 1-based line
//! numbers in hunk headers and does not special-case a missing trailing
//! newline ("\ No newline at end of file"), matching what the generator
//! above actually emits.

use similar::{ChangeTag, TextDiff};

use crate::error::JournalError;

pub fn generate_unified_diff(before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header("before", "after")
        .to_string()
}

struct Hunk {
    new_start: usize,
    lines: Vec<(char, String)>,
}

fn parse_hunk_header(line: &str) -> Result<usize, JournalError> {
    // "@@ -old_start,old_len +new_start,new_len @@" (len parts optional when 1)
    let plus = line
        .split_whitespace()
        .find(|tok| tok.starts_with('+'))
        .ok_or_else(|| JournalError::MalformedDiff(format!("no hunk new-range in `{line}`")))?;
    let new_start = plus
        .trim_start_matches('+')
        .split(',')
        .next()
        .ok_or_else(|| JournalError::MalformedDiff(format!("no new-start in `{line}`")))?;
    new_start
        .parse::<usize>()
        .map_err(|e| JournalError::MalformedDiff(format!("bad new-start `{new_start}`: {e}")))
}

fn parse_hunks(diff: &str) -> Result<Vec<Hunk>, JournalError> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in diff.lines() {
        if line.starts_with("@@") {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            let new_start = parse_hunk_header(line)?;
            current = Some(Hunk { new_start, lines: Vec::new() });
            continue;
        }
        if line.starts_with("---") || line.starts_with("+++") {
            continue;
        }
        if let Some(hunk) = current.as_mut() {
            let mut chars = line.chars();
            let marker = chars.next().unwrap_or(' ');
            let rest: String = chars.collect();
            hunk.lines.push((marker, rest));
        }
    }
    if let Some(h) = current.take() {
        hunks.push(h);
    }
    Ok(hunks)
}

/// Reconstruct the pre-image (`before`) from the current content (`after`)
/// and a unified diff produced by [`generate_unified_diff`] going the other
/// direction (`before -> after`).
pub fn apply_reverse(after: &str, diff: &str) -> Result<String, JournalError> {
    let hunks = parse_hunks(diff)?;
    let mut lines: Vec<String> = after.lines().map(str::to_string).collect();
    let mut offset: isize = 0;

    for hunk in &hunks {
        let mut cursor = (hunk.new_start as isize - 1 + offset).max(0) as usize;
        let initial_len = lines.len();

        for (marker, text) in &hunk.lines {
            match marker {
                ' ' => {
                    cursor += 1;
                }
                '+' => {
                    if cursor >= lines.len() {
                        return Err(JournalError::MalformedDiff(format!(
                            "hunk references line {cursor} past end of content ({} lines)",
                            lines.len()
                        )));
                    }
                    lines.remove(cursor);
                }
                '-' => {
                    lines.insert(cursor, text.clone());
                    cursor += 1;
                }
                other => {
                    return Err(JournalError::MalformedDiff(format!("unknown diff marker `{other}`")));
                }
            }
        }

        offset += lines.len() as isize - initial_len as isize;
    }

    Ok(lines.join("\n"))
}

/// Sanity check used before persisting a diff: every change tag the
/// generator can produce must round-trip through [`apply_reverse`].
pub fn round_trips(before: &str, after: &str, diff: &str) -> bool {
    apply_reverse(after, diff).map(|rebuilt| rebuilt == before).unwrap_or(false)
}

#[allow(dead_code)]
fn change_tags_seen(diff: &str) -> Vec<ChangeTag> {
    // Kept for future diagnostics; not used on the hot path.
    let mut tags = Vec::new();
    for line in diff.lines() {
        if let Some(c) = line.chars().next() {
            match c {
                '+' => tags.push(ChangeTag::Insert),
                '-' => tags.push(ChangeTag::Delete),
                ' ' => tags.push(ChangeTag::Equal),
                _ => {}
            }
        }
    }
    tags
}
