//! The uniform stage interface and the row loop that drives it.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use leadenrich_shared::{LeadEnrichError, LeadField, Result};
use leadenrich_table::{ColumnId, Row, Table, resolve_field};

use crate::sink::ErrorSink;

/// What a stage did with one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// The row already had usable values; nothing was called.
    Complete,
    /// A value was written without any remote call.
    Filled,
    /// Only the detail URL was fetched.
    UrlOnly,
    /// The full remote fetch succeeded.
    Fetched,
    /// The remote work failed; an error record or error sentinel was written.
    Failed,
}

/// Per-stage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub total: usize,
    pub complete: usize,
    pub filled: usize,
    pub url_only: usize,
    pub fetched: usize,
    pub failed: usize,
}

impl StageReport {
    fn new(stage: &'static str, total: usize) -> Self {
        Self {
            stage,
            total,
            ..Self::default()
        }
    }

    fn count(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Complete => self.complete += 1,
            RowOutcome::Filled => self.filled += 1,
            RowOutcome::UrlOnly => self.url_only += 1,
            RowOutcome::Fetched => self.fetched += 1,
            RowOutcome::Failed => self.failed += 1,
        }
    }

    /// Rows that did not fail.
    pub fn succeeded(&self) -> usize {
        self.total - self.failed
    }
}

/// One enrichment pass over a table.
///
/// `bind` runs once before the row loop: it resolves the columns the stage
/// reads and creates the ones it writes, so every row sees the same schema.
#[async_trait]
pub trait EnrichmentStage: Send + Sync {
    /// Resolved column positions used by [`enrich_row`](Self::enrich_row).
    type Columns: Send + Sync;

    fn name(&self) -> &'static str;

    fn bind(&self, table: &mut Table) -> Result<Self::Columns>;

    /// Enrich one row. `line` is the row's 1-based line in the file.
    async fn enrich_row(
        &self,
        line: usize,
        row: &mut Row,
        columns: &Self::Columns,
        errors: &mut ErrorSink,
    ) -> RowOutcome;
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage or phase starts.
    fn phase(&self, name: &str);
    /// Called after each row of a stage; `current` is 1-based.
    fn row_done(&self, current: usize, total: usize);
    /// Called when a stage finishes.
    fn stage_done(&self, report: &StageReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_done(&self, _current: usize, _total: usize) {}
    fn stage_done(&self, _report: &StageReport) {}
}

/// Run `stage` over every row of `table`, in order.
#[instrument(skip_all, fields(stage = stage.name(), rows = table.len()))]
pub async fn run_stage<S: EnrichmentStage>(
    stage: &S,
    table: &mut Table,
    errors: &mut ErrorSink,
    progress: &dyn ProgressReporter,
) -> Result<StageReport> {
    let columns = stage.bind(table)?;
    let total = table.len();
    let mut report = StageReport::new(stage.name(), total);

    progress.phase(stage.name());
    for (index, row) in table.rows_mut().iter_mut().enumerate() {
        let line = Table::line_number(index);
        let outcome = stage.enrich_row(line, row, &columns, errors).await;
        debug!(line, ?outcome, "row processed");
        report.count(outcome);
        progress.row_done(index + 1, total);
    }

    info!(
        complete = report.complete,
        filled = report.filled,
        url_only = report.url_only,
        fetched = report.fetched,
        failed = report.failed,
        "stage finished"
    );
    progress.stage_done(&report);
    Ok(report)
}

/// Resolve a column a stage cannot run without, listing the available
/// headers when it is missing.
pub(crate) fn require_column(table: &Table, field: LeadField) -> Result<ColumnId> {
    resolve_field(table, field).ok_or_else(|| {
        LeadEnrichError::validation(format!(
            "could not find a {} column (tried {}); available columns: {}",
            field.canonical_header(),
            field.aliases().join(", "),
            table.headers().join(", ")
        ))
    })
}
