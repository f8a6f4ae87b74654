//! Human-readable before/after rendering of a record change.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::error::{DiffError, DiffResult};

/// Line diff of the pretty JSON forms of `old` and `new`.
///
/// Removed lines start with `-`, added lines with `+`, unchanged lines with
/// a space.
pub fn render_change<R: Serialize>(old: &R, new: &R) -> DiffResult<String> {
    let old = serde_json::to_string_pretty(old).map_err(|e| DiffError::Serialization(e.to_string()))?;
    let new = serde_json::to_string_pretty(new).map_err(|e| DiffError::Serialization(e.to_string()))?;
    let diff = TextDiff::from_lines(&old, &new);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        out.push(sign);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    Ok(out)
}
