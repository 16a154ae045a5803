//! Domain types shared by every pipeline stage.
//!
//! An [`AnchorEvent`] names a symbol and the calendar date its history is
//! aligned to. A [`PriceSeries`] is the resolved, chronologically ordered
//! single-field price path for one symbol. Harvested series are collected in a
//! [`SeriesMap`], which keeps symbols in first-seen order.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol → aligned price series, in order of first insertion.
///
/// Re-inserting an existing symbol replaces its series but keeps its row position.
pub type SeriesMap = IndexMap<String, PriceSeries>;

/// One cohort row: a symbol and the date its series is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEvent {
    pub symbol: String,
    pub anchor_date: NaiveDate,
}

impl AnchorEvent {
    pub fn new(symbol: impl Into<String>, anchor_date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            anchor_date,
        }
    }
}

/// Trim surrounding whitespace and upper-case a ticker symbol.
///
/// Upstream symbol matching is case- and whitespace-sensitive.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A single resolved price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Ordered `(date, price)` observations for one symbol.
///
/// Series built through [`PriceSeries::from_observations`] are strictly
/// increasing by date and hold only positive, finite prices. An empty series
/// is the "fetch or validation failed" sentinel.
///
/// The points are public so externally supplied series (deserialized, or built
/// by hand in tests) can be fed to the matrix builder; those are not
/// re-validated, which is why the builder guards its base price on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// The empty sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series from raw observations.
    ///
    /// Drops observations whose price is missing, non-finite, or non-positive,
    /// sorts by date, and keeps the first observation for any repeated date.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut points: Vec<PricePoint> = observations
            .into_iter()
            .filter_map(|(date, price)| match price {
                Some(p) if is_valid_price(p) => Some(PricePoint { date, price: p }),
                _ => None,
            })
            .collect();

        // Stable sort keeps the upstream order among same-date rows, so dedup keeps the first.
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Price at a trading-day offset from day 0.
    pub fn price_at(&self, index: usize) -> Option<f64> {
        self.points.get(index).map(|p| p.price)
    }

    /// Date of day 0.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.price)
    }

    /// Keep only observations dated on or after `anchor`.
    pub fn on_or_after(&self, anchor: NaiveDate) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| p.date >= anchor)
                .copied()
                .collect(),
        }
    }

    /// The first `n` observations, or fewer if the series is shorter.
    pub fn head(&self, n: usize) -> Self {
        Self {
            points: self.points.iter().take(n).copied().collect(),
        }
    }

    /// True if dates are strictly increasing (no duplicates, no reordering).
    pub fn is_strictly_increasing(&self) -> bool {
        self.points.windows(2).all(|w| w[0].date < w[1].date)
    }
}

/// True if `price` can serve as a price observation or a return base.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Why a symbol produced no usable data.
///
/// Every kind is recovered where it is detected; only the aggregate counters
/// leave the harvest, and the kinds exist for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    /// Upstream returned nothing for the requested window.
    NoData,
    /// Neither the adjusted nor the plain close field was present.
    FieldNotFound,
    /// Fewer than `n` trading days on or after the anchor date.
    InsufficientHistory,
    /// Day-0 price was non-positive, non-finite, or missing.
    InvalidBasePrice,
    /// Network, timeout, or parse failure while contacting the upstream.
    TransientFetchFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::NoData => "no_data",
            FailureKind::FieldNotFound => "field_not_found",
            FailureKind::InsufficientHistory => "insufficient_history",
            FailureKind::InvalidBasePrice => "invalid_base_price",
            FailureKind::TransientFetchFailure => "transient_fetch_failure",
        };
        f.write_str(label)
    }
}
