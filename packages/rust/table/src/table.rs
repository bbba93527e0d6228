//! Rectangular lead table with CSV load/save.

use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, warn};

use leadenrich_shared::{FieldValue, LeadEnrichError, LeadField, Result, SearchResult};

use crate::columns::{resolve, resolve_field};

static ABSENT: FieldValue = FieldValue::Absent;

// ---------------------------------------------------------------------------
// ColumnId / Row
// ---------------------------------------------------------------------------

/// Position of a column within a [`Table`]. Stable for the table's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(usize);

impl ColumnId {
    /// Zero-based column position.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One record of a table. Cells beyond the row's length read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<FieldValue>,
}

impl Row {
    /// Build a row from cells in column order.
    pub fn new(cells: Vec<FieldValue>) -> Self {
        Self { cells }
    }

    /// Value at `col`, or [`FieldValue::Absent`] when the row is short.
    pub fn get(&self, col: ColumnId) -> &FieldValue {
        self.cells.get(col.0).unwrap_or(&ABSENT)
    }

    /// Value at an optional column; an unresolved column reads as absent.
    pub fn get_opt(&self, col: Option<ColumnId>) -> &FieldValue {
        col.map_or(&ABSENT, |c| self.get(c))
    }

    /// Overwrite the value at `col`.
    pub fn set(&mut self, col: ColumnId, value: FieldValue) {
        if self.cells.len() <= col.0 {
            self.cells.resize(col.0 + 1, FieldValue::Absent);
        }
        self.cells[col.0] = value;
    }

    fn pad_to(&mut self, width: usize) {
        if self.cells.len() < width {
            self.cells.resize(width, FieldValue::Absent);
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// An ordered sequence of rows sharing a header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given headers.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Literal header strings, in column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Literal header for a column.
    pub fn header(&self, col: ColumnId) -> &str {
        &self.headers[col.0]
    }

    /// Exact (literal) header lookup.
    pub fn column(&self, literal: &str) -> Option<ColumnId> {
        self.headers.iter().position(|h| h == literal).map(ColumnId)
    }

    /// Return the column with this literal header, adding it table-wide if needed.
    ///
    /// New columns are appended after existing ones and every row gets an
    /// absent cell, so the table stays rectangular.
    pub fn ensure_column(&mut self, literal: &str) -> ColumnId {
        if let Some(col) = self.column(literal) {
            return col;
        }
        self.headers.push(literal.to_string());
        let width = self.headers.len();
        for row in &mut self.rows {
            row.pad_to(width);
        }
        debug!(column = literal, "added column");
        ColumnId(width - 1)
    }

    /// Resolve a logical field to an existing column, or create it under its canonical header.
    pub fn resolve_or_create(&mut self, field: LeadField) -> ColumnId {
        match resolve_field(self, field) {
            Some(col) => col,
            None => self.ensure_column(field.canonical_header()),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row at the end, padded to the table width.
    pub fn push_row(&mut self, mut row: Row) {
        row.pad_to(self.headers.len());
        self.rows.push(row);
    }

    /// 1-based line number of the row at `index`, counting the header line.
    pub fn line_number(index: usize) -> usize {
        index + 2
    }

    /// Append rows taken from `source`, mapping its columns onto this table's.
    ///
    /// A source column lands in the destination column with the same
    /// normalized header, or in the column resolved for the same logical
    /// field; otherwise it is added table-wide.
    pub fn append_rows<'a>(&mut self, source: &Table, rows: impl IntoIterator<Item = &'a Row>) {
        let mapping: Vec<ColumnId> = source
            .headers
            .iter()
            .map(|header| self.map_foreign_column(header))
            .collect();

        for row in rows {
            let mut merged = Row::new(vec![FieldValue::Absent; self.headers.len()]);
            for (src, dest) in mapping.iter().enumerate() {
                merged.set(*dest, row.get(ColumnId(src)).clone());
            }
            self.push_row(merged);
        }
    }

    fn map_foreign_column(&mut self, header: &str) -> ColumnId {
        if let Some(col) = resolve(self, &[header]) {
            return col;
        }
        let field = ALL_FIELDS
            .iter()
            .find(|f| f.aliases().iter().any(|a| resolve_literal_eq(a, header)));
        if let Some(col) = field.and_then(|f| resolve_field(self, *f)) {
            return col;
        }
        self.ensure_column(header)
    }

    // -----------------------------------------------------------------------
    // Search results
    // -----------------------------------------------------------------------

    /// Shape search results into a table with canonical headers.
    pub fn from_search_results(results: &[SearchResult]) -> Self {
        let fields = [
            LeadField::CompanyName,
            LeadField::CompanyAddress,
            LeadField::Phone,
            LeadField::Website,
            LeadField::Rating,
            LeadField::ReviewCount,
            LeadField::DetailUrl,
        ];
        let mut table = Self::new(
            fields
                .iter()
                .map(|f| f.canonical_header().to_string())
                .collect(),
        );

        for r in results {
            table.push_row(Row::new(vec![
                FieldValue::text(r.name.clone()),
                FieldValue::text(r.address.clone()),
                FieldValue::text(r.phone.clone()),
                FieldValue::text(r.website.clone()),
                FieldValue::from(r.rating),
                FieldValue::from(r.review_count),
                FieldValue::text(r.detail_url.clone()),
            ]));
        }

        table
    }

    // -----------------------------------------------------------------------
    // CSV persistence
    // -----------------------------------------------------------------------

    /// Load a comma-separated file with a header line.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| LeadEnrichError::io(path, e))?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.display(), rows = table.len(), columns = table.headers.len(), "loaded table");
        Ok(table)
    }

    /// Parse CSV content from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();

        let width = headers.len();
        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > width {
                warn!(
                    line = Self::line_number(index),
                    cells = record.len(),
                    width,
                    "row has more cells than the header, extra cells dropped"
                );
            }
            let cells = record
                .iter()
                .take(width)
                .map(FieldValue::text)
                .collect();
            rows.push(Row::new(cells));
        }

        Ok(Self { headers, rows })
    }

    /// Write the table as CSV, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LeadEnrichError::io(parent, e))?;
        }
        let file = std::fs::File::create(path).map_err(|e| LeadEnrichError::io(path, e))?;
        self.to_writer(file)?;
        debug!(path = %path.display(), rows = self.len(), "saved table");
        Ok(())
    }

    /// Serialize the table as CSV into any writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(&self.headers)?;

        let width = self.headers.len();
        for row in &self.rows {
            writer.write_record((0..width).map(|i| row.get(ColumnId(i)).to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| LeadEnrichError::io("<csv writer>", e))?;
        Ok(())
    }
}

const ALL_FIELDS: [LeadField; 13] = [
    LeadField::CompanyName,
    LeadField::CompanyAddress,
    LeadField::Phone,
    LeadField::Website,
    LeadField::Rating,
    LeadField::ReviewCount,
    LeadField::DetailUrl,
    LeadField::LinkedIn,
    LeadField::Facebook,
    LeadField::Instagram,
    LeadField::Twitter,
    LeadField::ResearchBrief,
    LeadField::GeneratedEmail,
];

fn resolve_literal_eq(a: &str, b: &str) -> bool {
    crate::columns::normalize_header(a) == crate::columns::normalize_header(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let csv = "Business Name,Business Address,Notes\n\
                   Alpha Dental,\"123 Main St, Austin, TX\",call back\n\
                   Beta Clinic,\"456 Oak Ave, Austin, TX\"\n";
        Table::from_reader(csv.as_bytes()).expect("parse")
    }

    #[test]
    fn short_rows_read_as_absent() {
        let table = sample();
        assert_eq!(table.len(), 2);
        let notes = table.column("Notes").expect("notes column");
        assert_eq!(table.rows()[0].get(notes), &FieldValue::text("call back"));
        assert_eq!(table.rows()[1].get(notes), &FieldValue::Absent);
    }

    #[test]
    fn quoted_delimiters_survive_a_round_trip() {
        let table = sample();
        let mut out = Vec::new();
        table.to_writer(&mut out).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("Business Name,Business Address,Notes\n"));
        assert!(text.contains("\"123 Main St, Austin, TX\""));

        let reparsed = Table::from_reader(text.as_bytes()).expect("reparse");
        assert_eq!(reparsed.headers(), table.headers());
        assert_eq!(reparsed.len(), 2);
    }

    #[test]
    fn ensure_column_keeps_table_rectangular() {
        let mut table = sample();
        let rating = table.ensure_column("Google Review Rating");
        assert_eq!(rating.index(), 3);
        assert_eq!(table.ensure_column("Google Review Rating"), rating);
        assert_eq!(table.headers().len(), 4);

        let mut out = Vec::new();
        table.to_writer(&mut out).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        for line in text.lines().skip(1) {
            let reparsed = Table::from_reader(format!("a,b,c,d\n{line}\n").as_bytes())
                .expect("line parses");
            assert_eq!(reparsed.rows()[0].get(ColumnId(3)), &FieldValue::text(""));
        }
    }

    #[test]
    fn resolve_or_create_reuses_aliased_columns() {
        let mut table = sample();
        let name = table.resolve_or_create(LeadField::CompanyName);
        assert_eq!(table.header(name), "Business Name");
        let url = table.resolve_or_create(LeadField::DetailUrl);
        assert_eq!(table.header(url), "Google Maps URL");
    }

    #[test]
    fn search_results_use_canonical_headers() {
        let table = Table::from_search_results(&[SearchResult {
            name: "Alpha Dental".into(),
            rating: Some(4.0),
            review_count: Some(12),
            ..SearchResult::default()
        }]);
        assert_eq!(table.headers()[0], "Company Name");
        assert_eq!(table.headers()[6], "Google Maps URL");
        assert_eq!(table.rows()[0].get(ColumnId(4)).to_string(), "4.0");
        assert_eq!(table.rows()[0].get(ColumnId(5)).to_string(), "12");
    }

    #[test]
    fn append_rows_maps_known_fields_onto_existing_aliases() {
        let mut existing = sample();
        let incoming = Table::from_search_results(&[SearchResult {
            name: "Gamma Clinic".into(),
            address: "789 Pine Rd, Austin, TX".into(),
            ..SearchResult::default()
        }]);

        existing.append_rows(&incoming, incoming.rows());

        assert_eq!(existing.len(), 3);
        let name = existing.column("Business Name").expect("name");
        assert_eq!(existing.rows()[2].get(name), &FieldValue::text("Gamma Clinic"));
        assert!(existing.column("Company Name").is_none());
        assert!(existing.column("Google Maps URL").is_some());
    }

    #[test]
    fn csv_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("leads.csv");
        let table = sample();
        table.write_csv(&path).expect("write");
        let loaded = Table::read_csv(&path).expect("read");
        assert_eq!(loaded.headers(), table.headers());
        assert_eq!(loaded.rows()[0], table.rows()[0]);
    }

    #[test]
    fn line_numbers_count_the_header() {
        assert_eq!(Table::line_number(0), 2);
        assert_eq!(Table::line_number(9), 11);
    }
}
