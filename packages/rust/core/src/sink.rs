//! Per-row failure ledger, persisted as `error_log.csv` next to the output.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use leadenrich_shared::{ErrorRecord, LeadEnrichError, Result};

/// File name of the audit artifact.
pub const ERROR_LOG_FILE: &str = "error_log.csv";

/// Append-only list of [`ErrorRecord`]s for one run.
#[derive(Debug, Default)]
pub struct ErrorSink {
    records: Vec<ErrorRecord>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for the row at 1-based file line `line`.
    pub fn record(
        &mut self,
        line: usize,
        business_name: impl Into<String>,
        business_address: impl Into<String>,
        error: impl Into<String>,
    ) {
        self.records.push(ErrorRecord {
            row: line,
            business_name: business_name.into(),
            business_address: business_address.into(),
            error: error.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the ledger beside `output` if anything was recorded.
    ///
    /// Returns the path written, or `None` when the sink is empty.
    pub fn persist_beside(&self, output: &Path) -> Result<Option<PathBuf>> {
        if self.is_empty() {
            return Ok(None);
        }

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| LeadEnrichError::io(dir, e))?;

        let path = dir.join(ERROR_LOG_FILE);
        let mut writer = csv::Writer::from_path(&path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| LeadEnrichError::io(&path, e))?;

        info!(path = %path.display(), errors = self.records.len(), "error log written");
        Ok(Some(path))
    }
}
