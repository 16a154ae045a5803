//! Offline provider backed by a directory of per-symbol CSV files.
//!
//! Layout: `{dir}/{SYMBOL}.csv`, one row per day with a `Date` column and any
//! number of numeric columns (`Open`, `Close`, `Adj Close`, ...). Columns are
//! passed through under their header names, so a file exported without
//! `Adj Close` exercises the resolver's fallback exactly like the live source.

use super::provider::{DataError, DataSource, PriceProvider, RawDailyRecord};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y"];

/// Reads `{dir}/{SYMBOL}.csv` files.
#[derive(Debug, Clone)]
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the symbol's file, or `None` if the symbol would escape `dir`.
    fn symbol_path(&self, symbol: &str) -> Option<PathBuf> {
        let escapes = symbol.is_empty()
            || symbol.contains("..")
            || symbol.contains(['/', '\\'])
            || Path::new(symbol).is_absolute();
        (!escapes).then(|| self.dir.join(format!("{symbol}.csv")))
    }

    fn read_file(path: &Path) -> Result<Vec<RawDailyRecord>, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| DataError::Io(format!("open {}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| DataError::ResponseFormatChanged(format!("read headers: {e}")))?
            .clone();

        let date_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("date"))
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("{}: no Date column", path.display()))
            })?;

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::debug!(path = %path.display(), line = line + 2, error = %e, "skipping unreadable row");
                    continue;
                }
            };

            let Some(date) = row.get(date_idx).and_then(parse_date) else {
                tracing::debug!(path = %path.display(), line = line + 2, "skipping row without a valid date");
                continue;
            };

            let mut record = RawDailyRecord::new(date);
            for (idx, header) in headers.iter().enumerate() {
                if idx == date_idx {
                    continue;
                }
                if let Some(value) = row.get(idx).and_then(|v| v.parse::<f64>().ok()) {
                    record.fields.insert(header.to_string(), value);
                }
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(raw, fmt)
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(raw, fmt)
                    .ok()
                    .map(|dt| dt.date())
            })
    })
}

impl PriceProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_directory"
    }

    fn source(&self) -> DataSource {
        DataSource::CsvDirectory
    }

    fn fetch_ohlc(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, DataError> {
        let Some(path) = self.symbol_path(symbol).filter(|p| p.exists()) else {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        };

        let records = Self::read_file(&path)?
            .into_iter()
            .filter(|r| r.date >= start && r.date < end)
            .collect();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::fields;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn write(dir: &Path, symbol: &str, body: &str) {
        std::fs::write(dir.join(format!("{symbol}.csv")), body).unwrap();
    }

    #[test]
    fn reads_window_with_exclusive_end() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ZZZ",
            "Date,Open,Close,Adj Close\n\
             2023-01-09,9.0,9.5,9.4\n\
             2023-01-10,10.0,10.0,10.0\n\
             2023-01-11,10.5,11.0,11.0\n\
             2023-01-12,9.0,9.0,9.0\n",
        );
        let provider = CsvDirProvider::new(dir.path());

        let records = provider
            .fetch_ohlc("ZZZ", d(2023, 1, 10), d(2023, 1, 12))
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, d(2023, 1, 10));
        assert_eq!(records[1].get(fields::ADJ_CLOSE), Some(11.0));
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDirProvider::new(dir.path());
        let result = provider.fetch_ohlc("DEAD", d(2023, 1, 1), d(2023, 3, 1));
        assert!(matches!(result, Err(DataError::SymbolNotFound { .. })));
    }

    #[test]
    fn symbols_cannot_leave_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let prices = root.path().join("prices");
        std::fs::create_dir(&prices).unwrap();
        write(root.path(), "OUT", "Date,Close\n2023-01-10,10.0\n");
        let provider = CsvDirProvider::new(&prices);

        for symbol in ["../OUT", "..\\OUT", "sub/OUT", ".."] {
            let result = provider.fetch_ohlc(symbol, d(2023, 1, 1), d(2023, 2, 1));
            assert!(
                matches!(result, Err(DataError::SymbolNotFound { .. })),
                "{symbol} should not resolve"
            );
        }
    }

    #[test]
    fn blank_cells_are_absent_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "GAP",
            "date,Close,Adj Close\n2023-01-10,10.0,\n01/11/2023,11.0,10.9\nnot-a-date,1.0,1.0\n",
        );
        let provider = CsvDirProvider::new(dir.path());

        let records = provider
            .fetch_ohlc("GAP", d(2023, 1, 1), d(2023, 2, 1))
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get(fields::ADJ_CLOSE), None);
        assert_eq!(records[0].get(fields::CLOSE), Some(10.0));
        assert_eq!(records[1].date, d(2023, 1, 11));
    }

    #[test]
    fn file_without_date_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "BAD", "Day,Close\n2023-01-10,10.0\n");
        let provider = CsvDirProvider::new(dir.path());
        let result = provider.fetch_ohlc("BAD", d(2023, 1, 1), d(2023, 2, 1));
        assert!(matches!(result, Err(DataError::ResponseFormatChanged(_))));
    }
}
