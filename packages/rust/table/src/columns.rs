//! Logical-to-literal column resolution.
//!
//! Matching is normalization-only: lower-case, treat `_` and `-` as spaces,
//! collapse whitespace runs. There is no fuzzy or partial matching.

use leadenrich_shared::LeadField;

use crate::table::{ColumnId, Table};

/// Normalize a header for comparison.
pub fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve the first candidate name that matches a header of `table`.
///
/// Candidates are tried in priority order; for each, the first literal
/// header with the same normalized form wins.
pub fn resolve(table: &Table, candidates: &[&str]) -> Option<ColumnId> {
    let normalized: Vec<String> = table.headers().iter().map(|h| normalize_header(h)).collect();

    candidates.iter().find_map(|candidate| {
        let wanted = normalize_header(candidate);
        normalized
            .iter()
            .position(|h| *h == wanted)
            .and_then(|i| table.column(&table.headers()[i]))
    })
}

/// Resolve a logical field through its alias list.
pub fn resolve_field(table: &Table, field: LeadField) -> Option<ColumnId> {
    resolve(table, field.aliases())
}
