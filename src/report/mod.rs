//! Persistent spreadsheet report.
//!
//! The report is a single-sheet `.xlsx` workbook with a header row. Every run
//! reads it back, appends its batch at the bottom, and writes the whole
//! workbook to a temporary sibling before renaming it into place, so a crash
//! mid-write leaves the previous file intact.
//!
//! Columns are matched by header name, so files written by older versions
//! (fewer columns, different order) are carried forward without losing data.
//! Columns we don't know are kept after the known ones.

pub mod snippets;

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::Timelike;
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::TrendRecord;

/// Header row, in the order new files are written.
pub const COLUMNS: [&str; 8] = [
    "timestamp",
    "date",
    "rank",
    "keyword",
    "source",
    "item_code",
    "rakuten_url",
    "amazon_url",
];

const SHEET_NAME: &str = "trends";

// ---------------------------------------------------------------------------
// Cells and sheets
// ---------------------------------------------------------------------------

/// A cell value as far as the report cares.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    fn text(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    /// Plain-text rendering, used for header names and comparisons.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(d: &Data) -> Self {
        match d {
            Data::String(s) => Cell::text(s),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            // Dates become text so they survive a rewrite without a date format.
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(ndt) if ndt.num_seconds_from_midnight() == 0 => {
                    Cell::Text(ndt.format("%Y-%m-%d").to_string())
                }
                Some(ndt) => Cell::Text(ndt.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => Cell::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
            // Keep the error's display form (`#N/A`, `#DIV/0!`) rather than blanking it.
            Data::Error(e) => Cell::Text(e.to_string()),
            _ => Cell::Empty,
        }
    }
}

/// In-memory copy of the report sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// An empty sheet with the canonical header.
    pub fn empty() -> Self {
        Self {
            headers: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Read the first worksheet of an existing workbook.
    pub fn read(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("Failed to open report {}", path.display()))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range
                .with_context(|| format!("Failed to read first sheet of {}", path.display()))?,
            None => return Ok(Self::empty()),
        };

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header) => unique_headers(
                header
                    .iter()
                    .enumerate()
                    .map(|(i, d)| {
                        let name = Cell::from(d).as_text().trim().to_string();
                        if name.is_empty() {
                            format!("column_{}", i + 1)
                        } else {
                            name
                        }
                    })
                    .collect(),
            ),
            None => return Ok(Self::empty()),
        };

        // Blank rows inside the used range are kept; they are part of the file.
        let rows = rows
            .map(|r| r.iter().map(Cell::from).collect::<Vec<_>>())
            .collect();

        Ok(Self { headers, rows }.conform())
    }

    /// Reorder columns to the canonical header, keeping unknown columns
    /// (and their data) after it. Headers must already be unique.
    fn conform(self) -> Self {
        let canonical = COLUMNS.iter().map(|c| c.to_string());
        let unknown = self
            .headers
            .iter()
            .filter(|h| !COLUMNS.contains(&h.as_str()))
            .cloned();
        let headers: Vec<String> = canonical.chain(unknown).collect();

        // Source column index for each output column, by position.
        let mapping: Vec<Option<usize>> = headers
            .iter()
            .map(|h| self.headers.iter().position(|s| s == h))
            .collect();

        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                mapping
                    .iter()
                    .map(|src| {
                        src.and_then(|i| row.get(i).cloned())
                            .unwrap_or(Cell::Empty)
                    })
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Text of `column` in every row.
    pub fn column_values(&self, name: &str) -> Vec<String> {
        match self.column(name) {
            Some(i) => self
                .rows
                .iter()
                .map(|r| r.get(i).map(Cell::as_text).unwrap_or_default())
                .collect(),
            None => vec![String::new(); self.rows.len()],
        }
    }

    fn contains_daily(&self, date: &str, keyword: &str) -> bool {
        let (Some(d), Some(k)) = (self.column("date"), self.column("keyword")) else {
            return false;
        };
        self.rows.iter().any(|r| {
            r.get(d).map(Cell::as_text).as_deref() == Some(date)
                && r.get(k).map(Cell::as_text).as_deref() == Some(keyword)
        })
    }

    fn push_record(&mut self, record: &TrendRecord) {
        let mut row = vec![Cell::Empty; self.headers.len()];
        let values = [
            Cell::text(&record.timestamp),
            Cell::text(&record.date),
            Cell::Number(f64::from(record.rank)),
            Cell::text(&record.keyword),
            Cell::text(&record.source.to_string()),
            Cell::text(&record.item_code),
            Cell::text(&record.rakuten_url),
            Cell::text(&record.amazon_url),
        ];
        // Canonical columns always lead the header, in `COLUMNS` order.
        for (slot, value) in row.iter_mut().zip(values) {
            *slot = value;
        }
        self.rows.push(row);
    }

    /// Write to `path` via a temporary sibling and an atomic rename.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }

        let tmp = temp_path(path);
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        for (col, name) in self.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &header_format)?;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let c = col as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        sheet.write_string(r, c, s)?;
                    }
                    Cell::Number(n) => {
                        sheet.write_number(r, c, *n)?;
                    }
                    Cell::Bool(b) => {
                        sheet.write_boolean(r, c, *b)?;
                    }
                }
            }
        }

        let saved = workbook
            .save(&tmp)
            .with_context(|| format!("Failed to write report {}", tmp.display()))
            .and_then(|()| {
                fs::rename(&tmp, path).with_context(|| {
                    format!("Failed to move report into place at {}", path.display())
                })
            });
        if saved.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        saved?;

        debug!(path = %path.display(), rows = self.rows.len(), "Report written");
        Ok(())
    }
}

/// Make repeated header names unique the way pandas does: the second
/// `memo` becomes `memo.1`, the third `memo.2`, skipping names already taken.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for name in &raw {
        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) || (candidate != *name && raw.contains(&candidate)) {
            candidate = format!("{name}.{n}");
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Report file
// ---------------------------------------------------------------------------

/// Counts from one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendSummary {
    /// Rows already in the file.
    pub existing: usize,
    pub appended: usize,
    /// New rows dropped as same-day duplicates.
    pub skipped: usize,
    pub total: usize,
}

/// The on-disk report.
#[derive(Debug, Clone)]
pub struct ReportFile {
    path: PathBuf,
}

impl ReportFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents, or an empty sheet if the file doesn't exist yet.
    pub fn load(&self) -> Result<Sheet> {
        if self.path.exists() {
            Sheet::read(&self.path)
        } else {
            info!(path = %self.path.display(), "No report yet, starting a new one");
            Ok(Sheet::empty())
        }
    }

    /// Append `records` below the existing rows.
    ///
    /// An unreadable existing file is an error: the run stops and the file
    /// is left alone. With `dedupe_daily`, records whose (date, keyword)
    /// is already present are skipped; existing rows are never removed.
    pub fn append(&self, records: &[TrendRecord], dedupe_daily: bool) -> Result<AppendSummary> {
        let mut sheet = self.load()?;
        let existing = sheet.rows.len();
        let mut skipped = 0;

        for record in records {
            if dedupe_daily && sheet.contains_daily(&record.date, &record.keyword) {
                debug!(keyword = %record.keyword, date = %record.date, "Skipping same-day duplicate");
                skipped += 1;
                continue;
            }
            sheet.push_record(record);
        }

        sheet.write(&self.path)?;

        let summary = AppendSummary {
            existing,
            appended: sheet.rows.len() - existing,
            skipped,
            total: sheet.rows.len(),
        };
        info!(
            path = %self.path.display(),
            appended = summary.appended,
            skipped = summary.skipped,
            total = summary.total,
            "Report updated"
        );
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
