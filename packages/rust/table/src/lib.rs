//! In-memory lead table, CSV persistence, column resolution, and merge logic.
//!
//! This crate provides:
//! - [`Table`] / [`Row`]: a header-plus-rows table that stays rectangular
//! - [`columns`]: normalization-only matching of logical names to literal headers
//! - [`completeness`]: the single "does this cell already count as present" predicate
//! - [`merge`]: deduplicating append of freshly searched rows

pub mod columns;
pub mod completeness;
pub mod merge;
mod table;

pub use columns::{normalize_header, resolve, resolve_field};
pub use completeness::Completeness;
pub use merge::{DedupStrategy, MergeOutcome, append_dedup};
pub use table::{ColumnId, Row, Table};
