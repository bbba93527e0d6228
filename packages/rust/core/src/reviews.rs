//! Review enrichment: rating, review count and detail URL from the places index.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use leadenrich_places::{DetailMask, PlaceDetails, PlacesApi};
use leadenrich_shared::{FieldValue, LeadField, Result};
use leadenrich_table::{ColumnId, Completeness, Row, Table};

use crate::sink::ErrorSink;
use crate::stage::{EnrichmentStage, RowOutcome, require_column};

/// Error text recorded for rows without a usable name or address.
const MISSING_IDENTITY: &str = "missing business name or address";

/// Column positions bound by [`ReviewsStage`].
#[derive(Debug, Clone, Copy)]
pub struct ReviewColumns {
    pub name: ColumnId,
    pub address: ColumnId,
    pub rating: ColumnId,
    pub review_count: ColumnId,
    pub detail_url: ColumnId,
}

/// Fills rating, review count and detail URL, fetching as little as possible.
pub struct ReviewsStage<'a> {
    places: &'a dyn PlacesApi,
    completeness: Completeness,
    delay: Duration,
}

impl<'a> ReviewsStage<'a> {
    /// `delay` is slept before every row that makes remote calls.
    pub fn new(places: &'a dyn PlacesApi, completeness: Completeness, delay: Duration) -> Self {
        Self {
            places,
            completeness,
            delay,
        }
    }

    async fn fetch(&self, name: &str, address: &str, mask: DetailMask) -> Result<PlaceDetails> {
        let id = self.places.find_candidate_id(name, address).await?;
        self.places.lookup_by_id(&id, mask).await
    }
}

#[async_trait]
impl EnrichmentStage for ReviewsStage<'_> {
    type Columns = ReviewColumns;

    fn name(&self) -> &'static str {
        "reviews"
    }

    fn bind(&self, table: &mut Table) -> Result<ReviewColumns> {
        Ok(ReviewColumns {
            name: require_column(table, LeadField::CompanyName)?,
            address: require_column(table, LeadField::CompanyAddress)?,
            rating: table.resolve_or_create(LeadField::Rating),
            review_count: table.resolve_or_create(LeadField::ReviewCount),
            detail_url: table.resolve_or_create(LeadField::DetailUrl),
        })
    }

    async fn enrich_row(
        &self,
        line: usize,
        row: &mut Row,
        cols: &ReviewColumns,
        errors: &mut ErrorSink,
    ) -> RowOutcome {
        let name = row.get(cols.name).trimmed();
        let address = row.get(cols.address).trimmed();

        if name.is_empty() || address.is_empty() {
            warn!(line, "row has no business name or address");
            errors.record(line, name, address, MISSING_IDENTITY);
            return RowOutcome::Failed;
        }

        let has_rating = self.completeness.is_present(row.get(cols.rating));
        let has_count = self.completeness.is_present(row.get(cols.review_count));
        let has_url = self.completeness.is_present(row.get(cols.detail_url));

        if has_rating && has_count && has_url {
            return RowOutcome::Complete;
        }

        tokio::time::sleep(self.delay).await;

        let url_only = has_rating && has_count;
        let mask = if url_only {
            DetailMask::DetailUrl
        } else {
            DetailMask::Reviews
        };

        match self.fetch(&name, &address, mask).await {
            Ok(details) => {
                row.set(cols.detail_url, FieldValue::from_optional_text(details.detail_url));
                if url_only {
                    RowOutcome::UrlOnly
                } else {
                    row.set(cols.rating, details.rating.into());
                    row.set(cols.review_count, details.review_count.into());
                    RowOutcome::Fetched
                }
            }
            Err(e) => {
                if e.is_not_found() {
                    debug!(line, %name, "business not in places index");
                } else {
                    warn!(line, %name, error = %e, "review lookup failed");
                }
                errors.record(line, name, address, e.to_string());
                RowOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{SilentProgress, run_stage};
    use crate::testing::{FakePlaces, table};

    fn fake() -> FakePlaces {
        FakePlaces {
            details: PlaceDetails {
                rating: Some(4.5),
                review_count: Some(120),
                detail_url: Some("https://maps.example/alpha".into()),
            },
            ..FakePlaces::default()
        }
        .with_id("Alpha Dental", "alpha")
    }

    fn stage(places: &FakePlaces) -> ReviewsStage<'_> {
        ReviewsStage::new(places, Completeness::default(), Duration::ZERO)
    }

    fn cell(t: &Table, row: usize, header: &str) -> String {
        t.rows()[row].get(t.column(header).unwrap()).to_string()
    }

    #[tokio::test]
    async fn complete_rows_make_no_calls() {
        let places = fake();
        let mut t = table(
            "Business Name,Business Address,Google Review Rating,Google Review Count,Google Maps URL\n\
             Alpha Dental,1 Main St,4.5,120,https://maps.example/alpha\n",
        );
        let mut errors = ErrorSink::new();

        let report = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.complete, 1);
        assert!(places.calls().is_empty());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn missing_url_uses_the_narrow_lookup() {
        let places = fake();
        let mut t = table(
            "Company Name,Company Address,Google Review Rating,Google Review Count\n\
             Alpha Dental,1 Main St,4.9,87\n",
        );
        let mut errors = ErrorSink::new();

        let report = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.url_only, 1);
        assert_eq!(places.calls(), vec!["find:Alpha Dental", "lookup:alpha:DetailUrl"]);
        assert_eq!(cell(&t, 0, "Google Review Rating"), "4.9");
        assert_eq!(cell(&t, 0, "Google Review Count"), "87");
        assert_eq!(cell(&t, 0, "Google Maps URL"), "https://maps.example/alpha");
    }

    #[tokio::test]
    async fn empty_rows_get_a_full_fetch_and_new_columns() {
        let places = fake();
        let mut t = table("Business Name,Business Address\nAlpha Dental,1 Main St\n");
        let mut errors = ErrorSink::new();

        let report = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(places.calls(), vec!["find:Alpha Dental", "lookup:alpha:Reviews"]);
        assert_eq!(
            t.headers(),
            [
                "Business Name",
                "Business Address",
                "Google Review Rating",
                "Google Review Count",
                "Google Maps URL"
            ]
        );
        assert_eq!(cell(&t, 0, "Google Review Rating"), "4.5");
        assert_eq!(cell(&t, 0, "Google Review Count"), "120");
    }

    #[tokio::test]
    async fn missing_identity_is_recorded_before_anything_else() {
        let places = fake();
        let mut t = table(
            "Business Name,Business Address,Google Review Rating,Google Review Count,Google Maps URL\n\
             ,1 Main St,4.5,120,https://maps.example/x\n",
        );
        let mut errors = ErrorSink::new();

        let report = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(places.calls().is_empty());
        assert_eq!(errors.records()[0].row, 2);
        assert_eq!(errors.records()[0].error, MISSING_IDENTITY);
    }

    #[tokio::test]
    async fn rows_without_name_and_address_make_no_calls() {
        let places = fake();
        let mut t = table("Business Name,Business Address\n,\n");
        let mut errors = ErrorSink::new();

        let report = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(places.calls().is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.records()[0].row, 2);
        assert_eq!(errors.records()[0].error, MISSING_IDENTITY);
    }

    #[tokio::test]
    async fn failures_merge_nothing_and_do_not_stop_the_batch() {
        let places = fake().failing_for("Quota Dental");
        let mut t = table(
            "Business Name,Business Address\n\
             Quota Dental,2 Oak Ave\n\
             Ghost Dental,3 Elm St\n\
             Alpha Dental,1 Main St\n",
        );
        let mut errors = ErrorSink::new();

        let report = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.fetched, 1);
        assert_eq!(report.succeeded(), 1);

        assert_eq!(cell(&t, 0, "Google Review Rating"), "");
        assert_eq!(cell(&t, 1, "Google Maps URL"), "");
        assert_eq!(cell(&t, 2, "Google Maps URL"), "https://maps.example/alpha");

        let recorded: Vec<(usize, &str)> = errors
            .records()
            .iter()
            .map(|r| (r.row, r.error.as_str()))
            .collect();
        assert_eq!(recorded[0], (2, "API error: Quota exceeded"));
        assert_eq!(recorded[1].0, 3);
        assert!(recorded[1].1.starts_with("not found:"));
    }

    #[tokio::test]
    async fn missing_identity_columns_fail_fast() {
        let places = fake();
        let mut t = table("Name,Street\nAlpha Dental,1 Main St\n");
        let mut errors = ErrorSink::new();

        let err = run_stage(&stage(&places), &mut t, &mut errors, &SilentProgress)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Business Name, Company Name"), "{message}");
        assert!(message.contains("available columns: Name, Street"), "{message}");
        assert!(places.calls().is_empty());
    }
}
