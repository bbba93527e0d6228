//! Website profiling: social links and a research brief from the business home page.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use leadenrich_shared::{FieldValue, LeadField, Result};
use leadenrich_table::{ColumnId, Completeness, Row, Table, resolve_field};
use leadenrich_website::{PageSource, WebsiteProfile};

use crate::sink::ErrorSink;
use crate::stage::{EnrichmentStage, RowOutcome};

/// Brief written when a row has no website to fetch. Counts as complete.
pub const NO_WEBSITE: &str = "No website available";

/// Prefix of the brief written when a fetch fails. Counts as missing.
pub const FETCH_FAILED_PREFIX: &str = "Could not fetch";

/// Column positions bound by [`WebsiteProfileStage`].
#[derive(Debug, Clone)]
pub struct ProfileColumns {
    pub name: Option<ColumnId>,
    pub website: Option<ColumnId>,
    pub social: [(LeadField, ColumnId); 4],
    pub brief: ColumnId,
}

/// Fetches each row's website once and merges social links plus a brief.
pub struct WebsiteProfileStage<'a> {
    pages: &'a dyn PageSource,
    completeness: Completeness,
    delay: Duration,
}

impl<'a> WebsiteProfileStage<'a> {
    /// `completeness` should be the shared placeholder rules; the fetch
    /// failure prefix is added here. `delay` follows every remote fetch.
    pub fn new(pages: &'a dyn PageSource, completeness: Completeness, delay: Duration) -> Self {
        Self {
            pages,
            completeness: completeness.with_error_prefix(FETCH_FAILED_PREFIX),
            delay,
        }
    }
}

#[async_trait]
impl EnrichmentStage for WebsiteProfileStage<'_> {
    type Columns = ProfileColumns;

    fn name(&self) -> &'static str {
        "website"
    }

    fn bind(&self, table: &mut Table) -> Result<ProfileColumns> {
        Ok(ProfileColumns {
            name: resolve_field(table, LeadField::CompanyName),
            website: resolve_field(table, LeadField::Website),
            social: LeadField::SOCIAL.map(|field| (field, table.resolve_or_create(field))),
            brief: table.resolve_or_create(LeadField::ResearchBrief),
        })
    }

    async fn enrich_row(
        &self,
        line: usize,
        row: &mut Row,
        cols: &ProfileColumns,
        _errors: &mut ErrorSink,
    ) -> RowOutcome {
        if self.completeness.is_present(row.get(cols.brief)) {
            return RowOutcome::Complete;
        }

        let website = row.get_opt(cols.website).trimmed();
        if website.is_empty() {
            row.set(cols.brief, FieldValue::text(NO_WEBSITE));
            return RowOutcome::Filled;
        }

        let fetched = self.pages.fetch(&website).await;
        let outcome = match fetched {
            Ok(html) => {
                let name = row.get_opt(cols.name).trimmed();
                let profile = WebsiteProfile::from_html(&html, &name);
                for (field, col) in cols.social {
                    let link = profile.social.get(field).map(String::from);
                    row.set(col, FieldValue::from_optional_text(link));
                }
                row.set(cols.brief, FieldValue::text(profile.brief));
                debug!(line, %website, "website profiled");
                RowOutcome::Fetched
            }
            Err(failure) => {
                warn!(line, %website, %failure, "website fetch failed");
                row.set(cols.brief, FieldValue::text(format!("{FETCH_FAILED_PREFIX}: {failure}")));
                RowOutcome::Failed
            }
        };

        tokio::time::sleep(self.delay).await;
        outcome
    }
}
