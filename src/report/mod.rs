// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Violation report export

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::violations::ViolationRecord;

/// Column headers, in output order
pub const REPORT_COLUMNS: [&str; 8] = [
    "Employee ID",
    "Employee Name",
    "Missing PPE",
    "Timestamp",
    "Notified",
    "Notified At",
    "Location",
    "Severity",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNKNOWN: &str = "Unknown";
const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 50;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "jsonl",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/x-ndjson",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "json" | "jsonl" => Ok(ExportFormat::Json),
            other => Err(ServiceError::Validation(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One report line, already rendered to display strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Employee ID")]
    pub employee_id: String,
    #[serde(rename = "Employee Name")]
    pub employee_name: String,
    #[serde(rename = "Missing PPE")]
    pub missing_ppe: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Notified")]
    pub notified: String,
    #[serde(rename = "Notified At")]
    pub notified_at: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Severity")]
    pub severity: String,
}

impl ReportRow {
    /// Cells in [`REPORT_COLUMNS`] order
    pub fn cells(&self) -> [&str; 8] {
        [
            self.employee_id.as_str(),
            self.employee_name.as_str(),
            self.missing_ppe.as_str(),
            self.timestamp.as_str(),
            self.notified.as_str(),
            self.notified_at.as_str(),
            self.location.as_str(),
            self.severity.as_str(),
        ]
    }
}

/// Rendered report ready to be sent to a client
#[derive(Debug, Clone)]
pub struct Report {
    pub format: ExportFormat,
    pub filename: String,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

impl Report {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// `PPE_Violations_Report_<date>.<ext>`
pub fn report_filename(date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "PPE_Violations_Report_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Renders ledger snapshots as XLSX, CSV or JSON lines
pub struct ReportExporter {
    zone: FixedOffset,
    sheet_name: String,
}

impl ReportExporter {
    pub fn new(zone: FixedOffset, sheet_name: impl Into<String>) -> Self {
        Self {
            zone,
            sheet_name: sheet_name.into(),
        }
    }

    /// Rows in ledger order
    pub fn build_rows(&self, records: &[ViolationRecord]) -> Vec<ReportRow> {
        records.iter().map(|r| self.row(r)).collect()
    }

    fn row(&self, record: &ViolationRecord) -> ReportRow {
        ReportRow {
            employee_id: record.employee_id.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            employee_name: record.employee_name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            missing_ppe: record.missing_ppe.join(", "),
            timestamp: self.format_time(record.timestamp),
            notified: if record.notified { "Yes" } else { "No" }.to_string(),
            notified_at: record
                .notified_at
                .map(|at| self.format_time(at))
                .unwrap_or_default(),
            location: record.location.clone(),
            severity: record.severity.label().to_string(),
        }
    }

    fn format_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.zone).format(TIMESTAMP_FORMAT).to_string()
    }

    /// Render `records` in `format`; the filename carries `now`'s date
    pub fn export(
        &self,
        records: &[ViolationRecord],
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> ServiceResult<Report> {
        let rows = self.build_rows(records);
        let bytes = match format {
            ExportFormat::Xlsx => self.to_xlsx(&rows)?,
            ExportFormat::Csv => to_csv(&rows).into_bytes(),
            ExportFormat::Json => to_json_lines(&rows)?.into_bytes(),
        };
        let filename = report_filename(now.with_timezone(&self.zone).date_naive(), format);

        info!(rows = rows.len(), %filename, "Report exported");
        Ok(Report {
            format,
            filename,
            rows: rows.len(),
            bytes,
        })
    }

    fn to_xlsx(&self, rows: &[ReportRow]) -> ServiceResult<Vec<u8>> {
        self.write_workbook(rows)
            .map_err(|e| ServiceError::Export(e.to_string()))
    }

    fn write_workbook(&self, rows: &[ReportRow]) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name)?;

        for (col, header) in REPORT_COLUMNS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (i, row) in rows.iter().enumerate() {
            for (col, cell) in row.cells().iter().enumerate() {
                sheet.write_string(i as u32 + 1, col as u16, *cell)?;
            }
        }
        for (col, width) in column_widths(rows).into_iter().enumerate() {
            sheet.set_column_width(col as u16, width as f64)?;
        }

        workbook.save_to_buffer()
    }
}

/// Widest cell per column, clamped to the readable range
fn column_widths(rows: &[ReportRow]) -> Vec<usize> {
    REPORT_COLUMNS
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let widest = rows
                .iter()
                .map(|row| row.cells()[col].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            (widest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn to_csv(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    out.push_str(&REPORT_COLUMNS.join(","));
    out.push('\n');
    for row in rows {
        let line = row
            .cells()
            .iter()
            .map(|cell| csv_escape(cell))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_json_lines(rows: &[ReportRow]) -> ServiceResult<String> {
    let mut out = String::new();
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| ServiceError::Export(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
