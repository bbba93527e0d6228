//! End-to-end run: load or search → append-merge → stages → save → audit.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use leadenrich_places::PlacesApi;
use leadenrich_shared::{GeoBias, LeadEnrichError, Result};
use leadenrich_table::{Completeness, DedupStrategy, Table, append_dedup};
use leadenrich_website::PageSource;

use crate::email::GeneratedEmailStage;
use crate::generation::TextGenerator;
use crate::profile::WebsiteProfileStage;
use crate::reviews::ReviewsStage;
use crate::sink::ErrorSink;
use crate::stage::{ProgressReporter, StageReport, run_stage};

/// Where the run's table comes from.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// A previously saved or hand-made lead file.
    File(PathBuf),
    /// A fresh places search.
    Search(SearchRequest),
}

/// Parameters of a places search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub bias: Option<GeoBias>,
    /// Merge into the existing output file instead of replacing it.
    pub append: bool,
}

/// Inputs of the email stage.
#[derive(Debug, Clone)]
pub struct EmailOptions {
    pub template: String,
    pub product_description: String,
}

/// What one run does.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub source: TableSource,
    pub output: PathBuf,
    pub reviews: bool,
    pub website: bool,
    pub emails: Option<EmailOptions>,
}

/// Tunables shared by every run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub completeness: Completeness,
    /// Slept before every row of the reviews stage that calls the places index.
    pub review_delay: Duration,
    /// Slept after every website fetch.
    pub website_delay: Duration,
    /// Slept after every generation call.
    pub generation_delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            completeness: Completeness::default(),
            review_delay: Duration::from_millis(100),
            website_delay: Duration::from_millis(500),
            generation_delay: Duration::from_millis(200),
        }
    }
}

/// Outcome of an append-merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub existing: usize,
    pub appended: usize,
    pub dropped: usize,
    pub strategy: DedupStrategy,
}

/// Result of [`Pipeline::run`].
#[derive(Debug)]
pub struct RunReport {
    /// Rows in the saved table.
    pub rows: usize,
    /// Results returned by the search, when the source was a search.
    pub found: Option<usize>,
    pub merge: Option<MergeSummary>,
    /// One entry per stage that ran, in order.
    pub stages: Vec<StageReport>,
    /// File written, or `None` when a search found nothing.
    pub output: Option<PathBuf>,
    pub error_log: Option<PathBuf>,
    pub errors: usize,
    pub elapsed: Duration,
}

impl RunReport {
    /// Report of the named stage, if it ran.
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Drives runs against a fixed set of collaborators.
///
/// Collaborators are optional so a run that only needs, say, website
/// profiling does not require a places key; asking for a stage whose
/// collaborator is missing is a config error.
pub struct Pipeline<'a> {
    places: Option<&'a dyn PlacesApi>,
    pages: Option<&'a dyn PageSource>,
    generator: Option<&'a dyn TextGenerator>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            places: None,
            pages: None,
            generator: None,
            options,
        }
    }

    pub fn with_places(mut self, places: &'a dyn PlacesApi) -> Self {
        self.places = Some(places);
        self
    }

    pub fn with_pages(mut self, pages: &'a dyn PageSource) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_generator(mut self, generator: &'a dyn TextGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Execute `plan`. Stages run one after another over the whole table.
    #[instrument(skip_all, fields(output = %plan.output.display()))]
    pub async fn run(&self, plan: &RunPlan, progress: &dyn ProgressReporter) -> Result<RunReport> {
        let start = Instant::now();
        self.check_collaborators(plan)?;

        let mut report = RunReport {
            rows: 0,
            found: None,
            merge: None,
            stages: Vec::new(),
            output: None,
            error_log: None,
            errors: 0,
            elapsed: Duration::ZERO,
        };

        // --- Phase 1: Load or search ---
        let mut table = match &plan.source {
            TableSource::File(path) => {
                progress.phase("Loading leads");
                Table::read_csv(path)?
            }
            TableSource::Search(request) => {
                progress.phase("Searching places");
                let results = self.places()?.search(&request.query, request.limit, request.bias.as_ref()).await;
                report.found = Some(results.len());
                if results.is_empty() {
                    warn!(query = %request.query, "search returned no businesses, nothing saved");
                    report.elapsed = start.elapsed();
                    return Ok(report);
                }

                let incoming = Table::from_search_results(&results);
                if request.append && plan.output.exists() {
                    progress.phase("Merging with existing file");
                    let existing = Table::read_csv(&plan.output)?;
                    let existing_rows = existing.len();
                    let outcome = append_dedup(existing, &incoming);
                    report.merge = Some(MergeSummary {
                        existing: existing_rows,
                        appended: outcome.appended,
                        dropped: outcome.dropped,
                        strategy: outcome.strategy,
                    });
                    outcome.table
                } else {
                    if request.append {
                        info!(output = %plan.output.display(), "nothing to append to, writing a new file");
                    }
                    incoming
                }
            }
        };

        info!(rows = table.len(), "table ready");

        // --- Phase 2: Stages ---
        let mut errors = ErrorSink::new();
        let options = &self.options;

        if plan.reviews {
            let stage = ReviewsStage::new(self.places()?, options.completeness.clone(), options.review_delay);
            report.stages.push(run_stage(&stage, &mut table, &mut errors, progress).await?);
        }

        if plan.website {
            let pages = self.pages.ok_or_else(|| missing("website fetcher"))?;
            let stage = WebsiteProfileStage::new(pages, options.completeness.clone(), options.website_delay);
            report.stages.push(run_stage(&stage, &mut table, &mut errors, progress).await?);
        }

        if let Some(email) = &plan.emails {
            let generator = self.generator.ok_or_else(|| missing("text generator"))?;
            let stage = GeneratedEmailStage::new(
                generator,
                email.template.as_str(),
                email.product_description.as_str(),
                options.completeness.clone(),
                options.generation_delay,
            );
            report.stages.push(run_stage(&stage, &mut table, &mut errors, progress).await?);
        }

        // --- Phase 3: Persist ---
        progress.phase("Saving");
        save(&table, &plan.output)?;
        report.rows = table.len();
        report.output = Some(plan.output.clone());
        report.errors = errors.len();
        report.error_log = errors.persist_beside(&plan.output)?;
        report.elapsed = start.elapsed();

        info!(
            rows = report.rows,
            errors = report.errors,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(report)
    }

    fn places(&self) -> Result<&'a dyn PlacesApi> {
        self.places.ok_or_else(|| missing("places client"))
    }

    /// Fail before touching any file when the plan needs a missing collaborator.
    fn check_collaborators(&self, plan: &RunPlan) -> Result<()> {
        if (plan.reviews || matches!(plan.source, TableSource::Search(_))) && self.places.is_none() {
            return Err(missing("places client"));
        }
        if plan.website && self.pages.is_none() {
            return Err(missing("website fetcher"));
        }
        if plan.emails.is_some() && self.generator.is_none() {
            return Err(missing("text generator"));
        }
        Ok(())
    }
}

fn missing(what: &str) -> LeadEnrichError {
    LeadEnrichError::config(format!("this run needs a {what}, but none was configured"))
}

fn save(table: &Table, output: &Path) -> Result<()> {
    table.write_csv(output)?;
    info!(path = %output.display(), rows = table.len(), "table saved");
    Ok(())
}
