//! Deduplicating append of freshly searched rows into a saved table.
//!
//! Existing rows are never dropped; only incoming rows are filtered.

use std::collections::HashSet;

use tracing::{info, warn};

use leadenrich_shared::{FieldValue, LeadField};

use crate::columns::resolve_field;
use crate::table::{Row, Table};

/// Which key was used to detect duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Exact (trimmed) match on the detail URL column.
    DetailUrl,
    /// Normalized (name, address) pair, for files without a detail URL column.
    NameAddress,
    /// Name/address columns could not be identified; everything was appended.
    Skipped,
}

impl std::fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DetailUrl => f.write_str("detail URL"),
            Self::NameAddress => f.write_str("name + address"),
            Self::Skipped => f.write_str("none (name/address columns not identified)"),
        }
    }
}

/// Result of [`append_dedup`].
#[derive(Debug)]
pub struct MergeOutcome {
    /// Existing rows followed by the surviving incoming rows.
    pub table: Table,
    /// Incoming rows appended.
    pub appended: usize,
    /// Incoming rows dropped as duplicates.
    pub dropped: usize,
    pub strategy: DedupStrategy,
}

/// Append `incoming` rows to `existing`, skipping rows already present.
pub fn append_dedup(existing: Table, incoming: &Table) -> MergeOutcome {
    let (keep, strategy): (Vec<&Row>, DedupStrategy) =
        if let Some(url_col) = resolve_field(&existing, LeadField::DetailUrl) {
            let seen: HashSet<String> = existing
                .rows()
                .iter()
                .map(|r| r.get(url_col))
                .filter(|v| !v.is_blank())
                .map(FieldValue::trimmed)
                .collect();
            let incoming_url = resolve_field(incoming, LeadField::DetailUrl);
            let keep = incoming
                .rows()
                .iter()
                .filter(|r| !seen.contains(&r.get_opt(incoming_url).trimmed()))
                .collect();
            (keep, DedupStrategy::DetailUrl)
        } else {
            let name = resolve_field(&existing, LeadField::CompanyName);
            let address = resolve_field(&existing, LeadField::CompanyAddress);

            match (name, address) {
                (Some(name), Some(address)) => {
                    let seen: HashSet<(String, String)> = existing
                        .rows()
                        .iter()
                        .map(|r| (dedup_key(r.get(name)), dedup_key(r.get(address))))
                        .collect();
                    let in_name = resolve_field(incoming, LeadField::CompanyName);
                    let in_address = resolve_field(incoming, LeadField::CompanyAddress);
                    let keep = incoming
                        .rows()
                        .iter()
                        .filter(|r| {
                            let key = (
                                dedup_key(r.get_opt(in_name)),
                                dedup_key(r.get_opt(in_address)),
                            );
                            !seen.contains(&key)
                        })
                        .collect();
                    (keep, DedupStrategy::NameAddress)
                }
                _ => {
                    warn!(
                        columns = ?existing.headers(),
                        "append: could not identify name/address columns, skipping dedupe"
                    );
                    (incoming.rows().iter().collect(), DedupStrategy::Skipped)
                }
            }
        };

    let appended = keep.len();
    let dropped = incoming.len() - appended;
    let existing_rows = existing.len();

    let mut table = existing;
    table.append_rows(incoming, keep);

    info!(%strategy, existing_rows, appended, dropped, "appended search results");

    MergeOutcome {
        table,
        appended,
        dropped,
        strategy,
    }
}

/// Lower-case and collapse internal whitespace.
fn dedup_key(value: &FieldValue) -> String {
    value
        .to_string()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadenrich_shared::SearchResult;

    fn result(name: &str, address: &str, url: &str) -> SearchResult {
        SearchResult {
            name: name.into(),
            address: address.into(),
            detail_url: url.into(),
            ..SearchResult::default()
        }
    }

    fn names(table: &Table) -> Vec<String> {
        let col = resolve_field(table, LeadField::CompanyName).expect("name column");
        table.rows().iter().map(|r| r.get(col).to_string()).collect()
    }

    #[test]
    fn dedupes_by_detail_url_when_present() {
        let existing = Table::from_search_results(&[
            result("Alpha Dental", "1 Main St", "https://maps.example/a"),
            result("Beta Clinic", "2 Oak Ave", "https://maps.example/b"),
        ]);
        let incoming = Table::from_search_results(&[
            result("Alpha Dental (renamed)", "1 Main St", " https://maps.example/a "),
            result("Gamma Clinic", "3 Pine Rd", "https://maps.example/c"),
            result("Delta Dental", "4 Elm St", ""),
        ]);

        let outcome = append_dedup(existing, &incoming);

        assert_eq!(outcome.strategy, DedupStrategy::DetailUrl);
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(
            names(&outcome.table),
            vec!["Alpha Dental", "Beta Clinic", "Gamma Clinic", "Delta Dental"]
        );
    }

    #[test]
    fn falls_back_to_normalized_name_and_address() {
        let csv = "Business Name,Business Address\n\
                   Alpha Dental,\"123 Main St, Austin, TX\"\n";
        let existing = Table::from_reader(csv.as_bytes()).expect("parse");
        let incoming = Table::from_search_results(&[
            result(" alpha  dental ", "123   Main St, Austin, TX", ""),
            result("Gamma Clinic", "789 Pine Rd, Austin, TX", ""),
        ]);

        let outcome = append_dedup(existing, &incoming);

        assert_eq!(outcome.strategy, DedupStrategy::NameAddress);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(names(&outcome.table), vec!["Alpha Dental", "Gamma Clinic"]);
    }

    #[test]
    fn unknown_schema_appends_everything() {
        let csv = "Label,Where\nAlpha Dental,123 Main St\n";
        let existing = Table::from_reader(csv.as_bytes()).expect("parse");
        let incoming = Table::from_search_results(&[result("Alpha Dental", "123 Main St", "")]);

        let outcome = append_dedup(existing, &incoming);

        assert_eq!(outcome.strategy, DedupStrategy::Skipped);
        assert_eq!(outcome.appended, 1);
        assert_eq!(outcome.table.len(), 2);
        let label = outcome.table.column("Label").expect("label");
        assert_eq!(outcome.table.rows()[0].get(label).to_string(), "Alpha Dental");
    }

    #[test]
    fn existing_rows_are_never_dropped() {
        let existing = Table::from_search_results(&[
            result("Alpha Dental", "1 Main St", "https://maps.example/a"),
            result("Alpha Dental", "1 Main St", "https://maps.example/a"),
        ]);
        let incoming = Table::from_search_results(&[]);

        let outcome = append_dedup(existing, &incoming);

        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.appended, 0);
    }
}
