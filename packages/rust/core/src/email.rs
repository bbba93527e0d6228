//! Outreach email generation from a prompt template.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use leadenrich_shared::{FieldValue, LeadField, Result};
use leadenrich_table::{ColumnId, Completeness, Row, Table, resolve_field};

use crate::generation::TextGenerator;
use crate::sink::ErrorSink;
use crate::stage::{EnrichmentStage, RowOutcome};

/// Prefix of the value written when generation fails. Counts as missing.
pub const GENERATION_FAILED_PREFIX: &str = "Error";

/// Substituted for blank or missing row values.
const MISSING_VALUE: &str = "N/A";

/// Template placeholders filled from row columns.
const ROW_PLACEHOLDERS: [(&str, LeadField); 11] = [
    ("company_name", LeadField::CompanyName),
    ("company_address", LeadField::CompanyAddress),
    ("company_phone", LeadField::Phone),
    ("website", LeadField::Website),
    ("rating", LeadField::Rating),
    ("review_count", LeadField::ReviewCount),
    ("research_brief", LeadField::ResearchBrief),
    ("linkedin_url", LeadField::LinkedIn),
    ("facebook_url", LeadField::Facebook),
    ("instagram_url", LeadField::Instagram),
    ("twitter_url", LeadField::Twitter),
];

/// Built-in prompt used when no template file is given.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are writing a short, friendly cold email to a local business.

Business: {company_name}
Address: {company_address}
Phone: {company_phone}
Website: {website}
Google rating: {rating} ({review_count} reviews)
What we know about them: {research_brief}
Social profiles: LinkedIn {linkedin_url}, Facebook {facebook_url}, Instagram {instagram_url}, Twitter {twitter_url}

What we offer:
{product_description}

Write the email in under 150 words. Open with one specific detail about the
business, connect it to what we offer, and end with a single low-pressure
question. Skip any detail listed as N/A. Return only the subject line and body.
";

/// Column positions bound by [`GeneratedEmailStage`].
#[derive(Debug, Clone)]
pub struct EmailColumns {
    pub inputs: Vec<(&'static str, Option<ColumnId>)>,
    pub email: ColumnId,
}

/// Generates one email per row that does not already have one.
pub struct GeneratedEmailStage<'a> {
    generator: &'a dyn TextGenerator,
    template: String,
    product_description: String,
    completeness: Completeness,
    delay: Duration,
}

impl<'a> GeneratedEmailStage<'a> {
    /// `delay` follows every generation call.
    pub fn new(
        generator: &'a dyn TextGenerator,
        template: impl Into<String>,
        product_description: impl Into<String>,
        completeness: Completeness,
        delay: Duration,
    ) -> Self {
        Self {
            generator,
            template: template.into(),
            product_description: product_description.into(),
            completeness: completeness.with_error_prefix(GENERATION_FAILED_PREFIX),
            delay,
        }
    }

    fn prompt_for(&self, row: &Row, cols: &EmailColumns) -> String {
        let mut values: HashMap<&str, String> = cols
            .inputs
            .iter()
            .map(|(key, col)| {
                let value = row.get_opt(*col).trimmed();
                let value = if value.is_empty() { MISSING_VALUE.to_string() } else { value };
                (*key, value)
            })
            .collect();
        values.insert("product_description", self.product_description.clone());
        fill_template(&self.template, &values)
    }
}

/// Substitute `{key}` tokens in one pass. Inserted values are never rescanned;
/// unknown keys are left as written.
fn fill_template(template: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };
        match values.get(&after[..close]) {
            Some(value) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[async_trait]
impl EnrichmentStage for GeneratedEmailStage<'_> {
    type Columns = EmailColumns;

    fn name(&self) -> &'static str {
        "emails"
    }

    fn bind(&self, table: &mut Table) -> Result<EmailColumns> {
        Ok(EmailColumns {
            inputs: ROW_PLACEHOLDERS
                .iter()
                .map(|(key, field)| (*key, resolve_field(table, *field)))
                .collect(),
            email: table.resolve_or_create(LeadField::GeneratedEmail),
        })
    }

    async fn enrich_row(
        &self,
        line: usize,
        row: &mut Row,
        cols: &EmailColumns,
        _errors: &mut ErrorSink,
    ) -> RowOutcome {
        if self.completeness.is_present(row.get(cols.email)) {
            return RowOutcome::Complete;
        }

        let prompt = self.prompt_for(row, cols);
        let outcome = match self.generator.generate(&prompt).await {
            Ok(text) => {
                debug!(line, chars = text.len(), "email generated");
                row.set(cols.email, FieldValue::text(text));
                RowOutcome::Fetched
            }
            Err(e) => {
                warn!(line, error = %e, "email generation failed");
                row.set(cols.email, FieldValue::text(format!("{GENERATION_FAILED_PREFIX}: {e}")));
                RowOutcome::Failed
            }
        };

        tokio::time::sleep(self.delay).await;
        outcome
    }
}
