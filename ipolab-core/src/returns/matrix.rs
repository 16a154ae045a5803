//! Horizon-aligned return matrix.
//!
//! Rows are symbols in harvest order, columns are horizon days `1..=H`, and a
//! cell holds `price(d) / price(0) - 1`. A cell is `None` when the return is not
//! computable; `None` is never zero.
//!
//! Construction is row-at-a-time: every row starts fully missing and only the
//! cells its series supports are filled in. A symbol with an unusable day-0
//! price keeps a fully missing row; short series leave their later columns
//! missing (ragged policy).

use crate::domain::{is_valid_price, FailureKind, PriceSeries, SeriesMap};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Dense `symbols × [1..=max_horizon]` table of relative returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMatrix {
    symbols: Vec<String>,
    max_horizon: usize,
    /// Row-major, `symbols.len() * max_horizon` cells.
    cells: Vec<Option<f64>>,
}

/// Build the return matrix for every symbol in `series`, in map order.
pub fn build_return_matrix(series: &SeriesMap, max_horizon: usize) -> ReturnMatrix {
    let mut symbols = Vec::with_capacity(series.len());
    let mut cells = Vec::with_capacity(series.len() * max_horizon);

    for (symbol, path) in series {
        symbols.push(symbol.clone());
        cells.extend(row_returns(symbol, path, max_horizon));
    }

    ReturnMatrix {
        symbols,
        max_horizon,
        cells,
    }
}

/// Returns for horizon days `1..=max_horizon` of one series.
fn row_returns(symbol: &str, series: &PriceSeries, max_horizon: usize) -> Vec<Option<f64>> {
    let mut row = vec![None; max_horizon];

    if series.is_empty() {
        return row;
    }

    let base = match series.price_at(0) {
        Some(base) if is_valid_price(base) => base,
        other => {
            tracing::debug!(
                symbol,
                base = ?other,
                kind = %FailureKind::InvalidBasePrice,
                "skipping row"
            );
            return row;
        }
    };

    let last_day = max_horizon.min(series.len() - 1);
    for day in 1..=last_day {
        row[day - 1] = series.price_at(day).and_then(|price| relative_return(price, base));
    }

    row
}

/// `price / base - 1`, or `None` if the price or the result is unusable.
fn relative_return(price: f64, base: f64) -> Option<f64> {
    if !is_valid_price(price) {
        return None;
    }
    let ret = price / base - 1.0;
    ret.is_finite().then_some(ret)
}

impl ReturnMatrix {
    /// Row symbols, in order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn max_horizon(&self) -> usize {
        self.max_horizon
    }

    /// Column labels: horizon days `1..=max_horizon`.
    pub fn horizons(&self) -> RangeInclusive<usize> {
        1..=self.max_horizon
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.symbols.len(), self.max_horizon)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn row_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Cells of one row, horizon day 1 first.
    pub fn row(&self, symbol: &str) -> Option<&[Option<f64>]> {
        let idx = self.row_index(symbol)?;
        let start = idx * self.max_horizon;
        Some(&self.cells[start..start + self.max_horizon])
    }

    /// Iterate `(symbol, row)` pairs in row order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        let width = self.max_horizon;
        self.symbols
            .iter()
            .enumerate()
            .map(move |(i, symbol)| (symbol.as_str(), &self.cells[i * width..(i + 1) * width]))
    }

    /// Return for `symbol` at horizon `day`; `None` if missing or out of range.
    pub fn get(&self, symbol: &str, day: usize) -> Option<f64> {
        if day == 0 || day > self.max_horizon {
            return None;
        }
        self.row(symbol).and_then(|row| row[day - 1])
    }

    /// All cells of one horizon column, in row order.
    pub fn column(&self, day: usize) -> Option<Vec<Option<f64>>> {
        if day == 0 || day > self.max_horizon {
            return None;
        }
        Some(self.rows().map(|(_, row)| row[day - 1]).collect())
    }

    pub fn populated_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn missing_cells(&self) -> usize {
        self.cells.len() - self.populated_cells()
    }

    /// Deterministic BLAKE3 digest over symbols, shape, and exact cell bits.
    ///
    /// Two builds from the same input produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.max_horizon as u64).to_le_bytes());
        for (symbol, row) in self.rows() {
            hasher.update(symbol.as_bytes());
            hasher.update(&[0xff]);
            for cell in row {
                match cell {
                    Some(v) => {
                        hasher.update(&[1]);
                        hasher.update(&v.to_bits().to_le_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Wide DataFrame: a `symbol` column followed by `d1..dH`; missing cells are null.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns = Vec::with_capacity(self.max_horizon + 1);
        columns.push(Column::new("symbol".into(), self.symbols.clone()));
        for day in self.horizons() {
            let values: Vec<Option<f64>> = self.rows().map(|(_, row)| row[day - 1]).collect();
            columns.push(Column::new(format!("d{day}").into(), values));
        }
        DataFrame::new(columns)
    }
}
