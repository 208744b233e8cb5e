//! Tolerant parser (§4.6): turns raw, possibly-malformed LLM output into a
//! JSON array of raw subtask objects. Five layers, tried in order; each
//! layer's success is annotated in `reasoning`. Never panics — an empty or
//! hopeless input still returns a `DecomposerError::ParseError`, never an
//! `unwrap` panic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::DecomposerError;

pub struct ParseResult {
    pub raw_subtasks: Vec<Value>,
    pub reasoning: String,
}

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap());
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());
static UNQUOTED_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)"#).unwrap());
static LINE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"//[^\n]*").unwrap());
static BLOCK_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*[\s\S]*?\*/").unwrap());
static CHECKBOX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s*\[[ xX]\]\s*(.+)$").unwrap());
static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s*(.+)$").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s+(.+)$").unwrap());
static TASK_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?mi)^\s*Task\s+\d+\s*:\s*(.+)$").unwrap());
static SUBHEAD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{2,3}\s+(.+)$").unwrap());

const GENERIC_SUBHEADS: &[&str] = &["overview", "summary", "notes", "introduction", "background", "conclusion"];

/// Layer 1: pull a JSON candidate out of a fenced block, or the widest
/// top-level `{...}`/`[...]` span.
fn extract_json_candidate(text: &str) -> Option<String> {
    if let Some(caps) = FENCE_RE.captures(text) {
        let inner = caps.get(1).unwrap().as_str().trim();
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
    }

    let start = text.find(|c| c == '{' || c == '[')?;
    Some(text[start..].to_string())
}

/// Layer 2: repair common JSON sins so `serde_json` has a chance.
/// Idempotent: running this twice on its own output is a no-op (§8).
pub fn repair_json(input: &str) -> String {
    let mut s = input.to_string();
    s = BLOCK_COMMENT_RE.replace_all(&s, "").to_string();
    s = LINE_COMMENT_RE.replace_all(&s, "").to_string();
    s = single_quotes_to_double(&s);
    s = UNQUOTED_KEY_RE.replace_all(&s, "$1\"$2\"$3").to_string();
    s = TRAILING_COMMA_RE.replace_all(&s, "$1").to_string();
    s
}

/// Best-effort single-to-double quote conversion for string delimiters.
/// Only rewrites a `'` that looks like it opens/closes a JSON string (not an
/// apostrophe inside an already-double-quoted string).
fn single_quotes_to_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_double = false;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_double = !in_double;
                out.push(c);
            }
            '\'' if !in_double => out.push('"'),
            _ => out.push(c),
        }
    }
    out
}

fn stack_at(chars: &[char], upto: usize) -> Vec<char> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for &c in chars.iter().take(upto + 1) {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    stack
}

/// Layer 3: recover a truncated JSON document by trimming to the last fully
/// closed object and re-closing whatever arrays/objects remain open.
/// Returns `None` when there isn't even one complete object to recover.
pub fn recover_truncated(s: &str) -> Option<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut in_string = false;
    let mut escape = false;
    let mut depth_stack: Vec<char> = Vec::new();
    let mut last_complete_obj_end: Option<usize> = None;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth_stack.push(c),
            '}' => {
                if depth_stack.last() == Some(&'{') {
                    depth_stack.pop();
                    last_complete_obj_end = Some(i);
                }
            }
            ']' => {
                if depth_stack.last() == Some(&'[') {
                    depth_stack.pop();
                }
            }
            _ => {}
        }
    }

    let end = last_complete_obj_end?;
    let remaining = stack_at(&chars, end);
    if remaining.is_empty() {
        return None;
    }

    let mut truncated: String = chars[..=end].iter().collect();
    for c in remaining.iter().rev() {
        truncated.push(if *c == '{' { '}' } else { ']' });
    }
    Some(truncated)
}

fn value_to_raw_subtasks(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            for key in ["subtasks", "tasks", "steps", "task_list", "decomposition"] {
                if let Some(Value::Array(items)) = obj.remove(key) {
                    return items;
                }
            }
            vec![Value::Object(obj)]
        }
        other => vec![other],
    }
}

fn non_generic_subheads(text: &str) -> Vec<Value> {
    SUBHEAD_RE
        .captures_iter(text)
        .filter_map(|c| {
            let title = c.get(1)?.as_str().trim().to_string();
            if GENERIC_SUBHEADS.contains(&title.to_lowercase().as_str()) {
                None
            } else {
                Some(serde_json::json!({ "description": title }))
            }
        })
        .collect()
}

fn natural_language_extract(text: &str) -> Vec<Value> {
    let from_checkboxes: Vec<Value> = CHECKBOX_RE
        .captures_iter(text)
        .map(|c| serde_json::json!({ "description": c.get(1).unwrap().as_str().trim() }))
        .collect();
    if !from_checkboxes.is_empty() {
        return from_checkboxes;
    }

    let from_task_headers: Vec<Value> = TASK_HEADER_RE
        .captures_iter(text)
        .map(|c| serde_json::json!({ "description": c.get(1).unwrap().as_str().trim() }))
        .collect();
    if !from_task_headers.is_empty() {
        return from_task_headers;
    }

    let from_numbered: Vec<Value> = NUMBERED_RE
        .captures_iter(text)
        .map(|c| serde_json::json!({ "description": c.get(1).unwrap().as_str().trim() }))
        .collect();
    if !from_numbered.is_empty() {
        return from_numbered;
    }

    let from_bullets: Vec<Value> = BULLET_RE
        .captures_iter(text)
        .map(|c| serde_json::json!({ "description": c.get(1).unwrap().as_str().trim() }))
        .collect();
    if !from_bullets.is_empty() {
        return from_bullets;
    }

    non_generic_subheads(text)
}

/// Run the full five-layer pipeline (§4.6). Never panics; empty input
/// produces `ParseError`, not an empty `Ok`.
pub fn parse_decomposition_response(text: &str) -> Result<ParseResult, DecomposerError> {
    if text.trim().is_empty() {
        return Err(DecomposerError::ParseError);
    }

    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        let raw = value_to_raw_subtasks(value);
        if !raw.is_empty() {
            return Ok(ParseResult { raw_subtasks: raw, reasoning: "parsed as direct JSON".to_string() });
        }
    }

    if let Some(candidate) = extract_json_candidate(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            let raw = value_to_raw_subtasks(value);
            if !raw.is_empty() {
                return Ok(ParseResult { raw_subtasks: raw, reasoning: "extracted JSON from fenced/bracketed span".to_string() });
            }
        }

        let repaired = repair_json(&candidate);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            let raw = value_to_raw_subtasks(value);
            if !raw.is_empty() {
                return Ok(ParseResult { raw_subtasks: raw, reasoning: "repaired malformed JSON (quotes/commas/comments)".to_string() });
            }
        }

        if let Some(recovered) = recover_truncated(&repaired) {
            if let Ok(value) = serde_json::from_str::<Value>(&recovered) {
                let raw = value_to_raw_subtasks(value);
                if !raw.is_empty() {
                    return Ok(ParseResult { raw_subtasks: raw, reasoning: "recovered truncated JSON".to_string() });
                }
            }
        }
    }

    let nl = natural_language_extract(text);
    if !nl.is_empty() {
        return Ok(ParseResult { raw_subtasks: nl, reasoning: "extracted from natural-language list/headers".to_string() });
    }

    Ok(ParseResult {
        raw_subtasks: vec![serde_json::json!({ "description": text.trim() })],
        reasoning: "last-ditch: treated entire response as one mega-task".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_a_parse_error_never_a_panic() {
        assert!(matches!(parse_decomposition_response(""), Err(DecomposerError::ParseError)));
        assert!(matches!(parse_decomposition_response("   \n\t"), Err(DecomposerError::ParseError)));
    }

    #[test]
    fn direct_json_array_parses() {
        let result = parse_decomposition_response(r#"[{"description": "do a thing"}]"#).unwrap();
        assert_eq!(result.raw_subtasks.len(), 1);
    }

    #[test]
    fn fenced_json_block_is_extracted() {
        let text = "Here is the plan:\n```json\n{\"subtasks\": [{\"description\": \"x\"}, {\"description\": \"y\"}]}\n```\nDone.";
        let result = parse_decomposition_response(text).unwrap();
        assert_eq!(result.raw_subtasks.len(), 2);
    }

    #[test]
    fn repair_json_is_idempotent() {
        let inputs = [
            r#"{'a': 'b', c: 1,}"#,
            r#"[{"a": 1,},]"#,
            r#"{"clean": "already valid"}"#,
            r#"// comment\n{"a": 1}"#,
        ];
        for input in inputs {
            let once = repair_json(input);
            let twice = repair_json(&once);
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn repair_json_fixes_trailing_commas_and_unquoted_keys() {
        let repaired = repair_json(r#"{subtasks: [{description: "a",},],}"#);
        let value: Value = serde_json::from_str(&repaired).expect("should parse after repair");
        assert!(value.get("subtasks").is_some());
    }

    #[test]
    fn truncation_recovery_needs_at_least_one_complete_object() {
        let truncated = r#"{"subtasks": [{"description": "a"}, {"description": "b"#;
        let recovered = recover_truncated(truncated).expect("one complete object present");
        let value: Value = serde_json::from_str(&recovered).unwrap();
        let arr = value["subtasks"].as_array().unwrap();
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn truncation_recovery_fails_with_zero_complete_objects() {
        let truncated = r#"{"subtasks": [{"description": "a"#;
        assert!(recover_truncated(truncated).is_none());
    }

    #[test]
    fn markdown_checkbox_list_is_extracted() {
        let text = "Plan:\n- [ ] research auth\n- [x] write tests\n- [ ] ship it";
        let result = parse_decomposition_response(text).unwrap();
        assert_eq!(result.raw_subtasks.len(), 3);
    }

    #[test]
    fn hopeless_input_falls_back_to_single_mega_task() {
        let result = parse_decomposition_response("just refactor the thing please, thanks").unwrap();
        assert_eq!(result.raw_subtasks.len(), 1);
        assert!(result.reasoning.contains("mega-task"));
    }
}
