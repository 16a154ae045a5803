//! Cohort ingestion from CSV.
//!
//! A cohort file carries at least a `Symbol` and an `IPO Date` column; other
//! columns are ignored. Bad rows are recorded and skipped, never fatal.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ipolab_core::{normalize_symbol, AnchorEvent};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

pub const SYMBOL_COLUMN: &str = "Symbol";
pub const DATE_COLUMN: &str = "IPO Date";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Errors that prevent a cohort file from loading at all.
#[derive(Debug, Error)]
pub enum CohortError {
    #[error("failed to read cohort file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cohort CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("cohort file is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// A row that was skipped during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line number in the source file (header is line 1).
    pub line: u64,
    pub symbol: String,
    pub reason: String,
}

/// An ordered list of anchor events plus the rows that were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub label: String,
    pub events: Vec<AnchorEvent>,
    pub rejected: Vec<RejectedRow>,
}

impl Cohort {
    pub fn new(label: impl Into<String>, events: Vec<AnchorEvent>) -> Self {
        Self {
            label: label.into(),
            events,
            rejected: Vec::new(),
        }
    }

    pub fn from_csv_path(label: impl Into<String>, path: &Path) -> Result<Self, CohortError> {
        let file = std::fs::File::open(path).map_err(|source| CohortError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cohort = Self::from_reader(label, file)?;
        tracing::info!(
            path = %path.display(),
            label = %cohort.label,
            rows = cohort.events.len(),
            rejected = cohort.rejected.len(),
            "loaded cohort"
        );
        Ok(cohort)
    }

    pub fn from_reader<R: Read>(label: impl Into<String>, reader: R) -> Result<Self, CohortError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let symbol_idx = column_index(&headers, SYMBOL_COLUMN)?;
        let date_idx = column_index(&headers, DATE_COLUMN)?;

        let mut cohort = Cohort::new(label, Vec::new());
        for record in rdr.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                    let line = e.position().map_or(0, |p| p.line());
                    cohort.reject(line, "", e.to_string());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let line = record.position().map_or(0, |p| p.line());
            let raw_symbol = record.get(symbol_idx).unwrap_or_default();
            let raw_date = record.get(date_idx).unwrap_or_default();

            let symbol = normalize_symbol(raw_symbol);
            if symbol.is_empty() {
                cohort.reject(line, raw_symbol, "empty symbol");
                continue;
            }

            match parse_anchor_date(raw_date) {
                Some(date) => cohort.events.push(AnchorEvent::new(symbol, date)),
                None => cohort.reject(line, raw_symbol, format!("unparseable date '{raw_date}'")),
            }
        }

        Ok(cohort)
    }

    fn reject(&mut self, line: u64, symbol: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(line, symbol, reason = %reason, "rejected cohort row");
        self.rejected.push(RejectedRow {
            line,
            symbol: symbol.to_string(),
            reason,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn column_index(headers: &csv::StringRecord, name: &'static str) -> Result<usize, CohortError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or(CohortError::MissingColumn(name))
}

/// Parse a cohort date string into a calendar date.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `MM/DD/YYYY`, RFC 3339, and
/// `YYYY-MM-DD HH:MM:SS`; for timestamps only the date part is kept.
pub fn parse_anchor_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_supported_date_formats() {
        let want = Some(d("2024-03-21"));
        assert_eq!(parse_anchor_date("2024-03-21"), want);
        assert_eq!(parse_anchor_date("2024/03/21"), want);
        assert_eq!(parse_anchor_date("03/21/2024"), want);
        assert_eq!(parse_anchor_date(" 2024-03-21 "), want);
        assert_eq!(parse_anchor_date("2024-03-21 09:30:00"), want);
        assert_eq!(parse_anchor_date("2024-03-21T09:30:00"), want);
        assert_eq!(parse_anchor_date("2024-03-21T09:30:00-04:00"), want);
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_anchor_date(""), None);
        assert_eq!(parse_anchor_date("soon"), None);
        assert_eq!(parse_anchor_date("2024-13-01"), None);
    }

    #[test]
    fn loads_rows_in_order_and_normalizes_symbols() {
        let csv = "\
Symbol,Company,IPO Date
 rddt ,Reddit,2024-03-21
ARM,Arm Holdings,09/14/2023
";
        let cohort = Cohort::from_reader("2023-24", csv.as_bytes()).unwrap();
        assert_eq!(cohort.label, "2023-24");
        assert_eq!(
            cohort.events,
            vec![
                AnchorEvent::new("RDDT", d("2024-03-21")),
                AnchorEvent::new("ARM", d("2023-09-14")),
            ]
        );
        assert!(cohort.rejected.is_empty());
    }

    #[test]
    fn bad_rows_are_recorded_and_skipped() {
        let csv = "\
Symbol,IPO Date
AAA,2021-01-05
,2021-01-06
BBB,not a date
CCC,2021-01-07
";
        let cohort = Cohort::from_reader("c", csv.as_bytes()).unwrap();
        assert_eq!(cohort.len(), 2);
        assert_eq!(cohort.rejected.len(), 2);
        assert_eq!(cohort.rejected[0].line, 3);
        assert_eq!(cohort.rejected[0].reason, "empty symbol");
        assert_eq!(cohort.rejected[1].line, 4);
        assert_eq!(cohort.rejected[1].symbol, "BBB");
    }

    #[test]
    fn undecodable_row_is_skipped() {
        let csv = b"Symbol,IPO Date\nAAA,2021-01-05\nB\xffB,2021-01-06\nCCC,2021-01-07\n";
        let cohort = Cohort::from_reader("c", &csv[..]).unwrap();
        assert_eq!(
            cohort.events,
            vec![
                AnchorEvent::new("AAA", d("2021-01-05")),
                AnchorEvent::new("CCC", d("2021-01-07")),
            ]
        );
        assert_eq!(cohort.rejected.len(), 1);
        assert_eq!(cohort.rejected[0].line, 3);
        assert!(cohort.rejected[0].reason.contains("utf-8"));
    }

    #[test]
    fn duplicate_symbols_are_kept() {
        let csv = "Symbol,IPO Date\nDUP,2020-01-02\nDUP,2020-06-01\n";
        let cohort = Cohort::from_reader("c", csv.as_bytes()).unwrap();
        assert_eq!(cohort.len(), 2);
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "Ticker,IPO Date\nAAA,2021-01-05\n";
        let err = Cohort::from_reader("c", csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CohortError::MissingColumn("Symbol")));
    }

    #[test]
    fn short_rows_do_not_abort() {
        let csv = "Symbol,IPO Date\nAAA\nBBB,2021-01-05\n";
        let cohort = Cohort::from_reader("c", csv.as_bytes()).unwrap();
        assert_eq!(cohort.len(), 1);
        assert_eq!(cohort.rejected.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Cohort::from_csv_path("c", Path::new("/nonexistent/cohort.csv")).unwrap_err();
        assert!(matches!(err, CohortError::Io { .. }));
    }
}
