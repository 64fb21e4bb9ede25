//! Parsing of the provider's `;`-separated text format.
//!
//! The first line holds header names; each following line is one record.

use crate::report::{ReportSchema, ReportType};
use rankgrid_core::ProviderError;

pub(crate) fn malformed(report: ReportType, reason: impl Into<String>) -> ProviderError {
    ProviderError::MalformedResponse {
        report: report.as_str().to_string(),
        reason: reason.into(),
    }
}

/// A parsed response: header names plus raw data rows.
#[derive(Debug)]
pub(crate) struct CsvTable<'a> {
    report: ReportType,
    schema: ReportSchema,
    headers: Vec<&'a str>,
    rows: Vec<Vec<&'a str>>,
}

impl<'a> CsvTable<'a> {
    /// Split `raw` into header and rows. Fewer than two non-empty lines is a
    /// hard failure.
    pub(crate) fn parse(report: ReportType, raw: &'a str) -> Result<Self, ProviderError> {
        let mut lines = raw
            .trim()
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| malformed(report, "empty response"))?;
        let rows: Vec<Vec<&str>> = lines.map(|line| line.split(';').collect()).collect();
        if rows.is_empty() {
            return Err(malformed(report, "expected a header line and at least one data line"));
        }

        Ok(Self {
            report,
            schema: report.schema(),
            headers: header.split(';').map(str::trim).collect(),
            rows,
        })
    }

    /// The first data row, addressed by header name.
    pub(crate) fn first_named(&self) -> NamedRow<'_, 'a> {
        NamedRow {
            table: self,
            cells: &self.rows[0],
        }
    }

    /// Data rows with at least `min_columns` cells, addressed by position.
    /// Shorter rows are skipped.
    pub(crate) fn valid_rows(&self, min_columns: usize) -> impl Iterator<Item = IndexedRow<'_, 'a>> {
        self.rows
            .iter()
            .filter(move |cells| cells.len() >= min_columns)
            .map(move |cells| IndexedRow { table: self, cells })
    }

    /// First cell of the given column in the first data row, regardless of
    /// row length.
    pub(crate) fn first_cell(&self, code: &str) -> &'a str {
        self.schema
            .index_of(code)
            .and_then(|idx| self.rows[0].get(idx))
            .map_or("", |cell| cell.trim())
    }
}

/// A data row read by header name.
pub(crate) struct NamedRow<'t, 'a> {
    table: &'t CsvTable<'a>,
    cells: &'t [&'a str],
}

impl<'t, 'a> NamedRow<'t, 'a> {
    fn cell(&self, code: &str) -> Result<&'a str, ProviderError> {
        let report = self.table.report;
        let spec = self
            .table
            .schema
            .column(code)
            .ok_or_else(|| malformed(report, format!("unknown column code {}", code)))?;
        let idx = self
            .table
            .headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(spec.header))
            .ok_or_else(|| malformed(report, format!("missing column '{}'", spec.header)))?;
        // A short row yields empty cells.
        Ok(self.cells.get(idx).map_or("", |c| c.trim()))
    }

    pub(crate) fn text(&self, code: &str) -> Result<String, ProviderError> {
        self.cell(code).map(str::to_string)
    }

    pub(crate) fn integer(&self, code: &str) -> Result<i64, ProviderError> {
        parse_integer(self.table.report, code, self.cell(code)?)
    }

    pub(crate) fn decimal(&self, code: &str) -> Result<f64, ProviderError> {
        parse_decimal(self.table.report, code, self.cell(code)?)
    }
}

/// A data row read by schema position.
pub(crate) struct IndexedRow<'t, 'a> {
    table: &'t CsvTable<'a>,
    cells: &'t [&'a str],
}

impl<'t, 'a> IndexedRow<'t, 'a> {
    fn cell(&self, code: &str) -> Result<&'a str, ProviderError> {
        let report = self.table.report;
        let idx = self
            .table
            .schema
            .index_of(code)
            .ok_or_else(|| malformed(report, format!("unknown column code {}", code)))?;
        Ok(self.cells.get(idx).map_or("", |c| c.trim()))
    }

    pub(crate) fn text(&self, code: &str) -> Result<String, ProviderError> {
        self.cell(code).map(str::to_string)
    }

    pub(crate) fn integer(&self, code: &str) -> Result<i64, ProviderError> {
        parse_integer(self.table.report, code, self.cell(code)?)
    }

    pub(crate) fn optional_integer(&self, code: &str) -> Result<Option<i64>, ProviderError> {
        let cell = self.cell(code)?;
        if cell.is_empty() {
            Ok(None)
        } else {
            parse_integer(self.table.report, code, cell).map(Some)
        }
    }

    pub(crate) fn decimal(&self, code: &str) -> Result<f64, ProviderError> {
        parse_decimal(self.table.report, code, self.cell(code)?)
    }

    pub(crate) fn flag(&self, code: &str) -> Result<bool, ProviderError> {
        match self.cell(code)?.to_ascii_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(malformed(
                self.table.report,
                format!("column {} is not a flag: {:?}", code, other),
            )),
        }
    }
}

/// Empty cells read as 0. Decimal values are truncated toward zero.
pub(crate) fn parse_integer(report: ReportType, code: &str, cell: &str) -> Result<i64, ProviderError> {
    if cell.is_empty() {
        return Ok(0);
    }
    if let Ok(value) = cell.parse::<i64>() {
        return Ok(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value.trunc() as i64),
        _ => Err(malformed(
            report,
            format!("column {} is not an integer: {:?}", code, cell),
        )),
    }
}

pub(crate) fn parse_decimal(report: ReportType, code: &str, cell: &str) -> Result<f64, ProviderError> {
    if cell.is_empty() {
        return Ok(0.0);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(malformed(
            report,
            format!("column {} is not a number: {:?}", code, cell),
        )),
    }
}
