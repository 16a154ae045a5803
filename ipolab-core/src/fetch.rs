//! Event-anchored series fetching.
//!
//! Given a symbol and its anchor date, the fetcher requests a padded calendar
//! window from the provider, resolves the price field, keeps only days on or
//! after the anchor (day 0 is the first trading day on/after the anchor date),
//! and returns exactly the first `n` trading days.
//!
//! [`SeriesFetcher::try_fetch`] reports why a symbol failed;
//! [`SeriesFetcher::fetch`] collapses every failure to the empty sentinel so a
//! harvest can treat it as a skip.

use crate::data::provider::{DataError, PriceProvider};
use crate::domain::{FailureKind, PriceSeries};
use crate::resolve::{FieldNotFound, FieldResolver};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Share of expected weekdays in the window treated as reliably available.
/// Covers holidays, halts, and anchors that land late in the lower pad.
const SAFE_COVERAGE_NUM: u64 = 2;
const SAFE_COVERAGE_DEN: u64 = 3;

/// Calendar-day padding around the anchor date.
///
/// The lower pad absorbs anchors that fall on non-trading days; the upper pad
/// has to cover `n` trading days through weekends and holidays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalWindow {
    pub pad_before_days: u64,
    pub pad_after_days: u64,
}

impl Default for RetrievalWindow {
    fn default() -> Self {
        Self {
            pad_before_days: 5,
            pad_after_days: 85,
        }
    }
}

impl RetrievalWindow {
    /// Smallest window (never narrower than the default) whose safe capacity covers `n`.
    pub fn for_trading_days(n: usize) -> Self {
        let default = Self::default();
        if n <= default.safe_trading_days() {
            return default;
        }
        // Invert safe_trading_days: n * (3/2) weekdays * (7/5) calendar days.
        let estimate = (n as u64 * 7 * SAFE_COVERAGE_DEN).div_ceil(5 * SAFE_COVERAGE_NUM);
        let mut window = Self {
            pad_after_days: estimate.max(default.pad_after_days),
            ..default
        };
        // Integer flooring in safe_trading_days can leave the estimate a day or two short.
        while window.safe_trading_days() < n {
            window.pad_after_days += 1;
        }
        window
    }

    /// Conservative number of trading days the window reliably yields after the anchor.
    ///
    /// The default window gives 40.
    pub fn safe_trading_days(&self) -> usize {
        let weekdays = self.pad_after_days * 5 / 7;
        (weekdays * SAFE_COVERAGE_NUM / SAFE_COVERAGE_DEN) as usize
    }

    /// `(start, end)` calendar bounds for an anchor; `end` is exclusive.
    pub fn bounds(&self, anchor: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let start = anchor.checked_sub_days(Days::new(self.pad_before_days))?;
        let end = anchor.checked_add_days(Days::new(self.pad_after_days))?;
        Some((start, end))
    }
}

/// Why a fetch produced no series.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("no data returned for the requested window")]
    NoData,

    #[error(transparent)]
    FieldNotFound(#[from] FieldNotFound),

    #[error("insufficient history: {have} trading days on/after anchor, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("upstream failure: {0}")]
    Transient(DataError),
}

impl FetchFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchFailure::NoData => FailureKind::NoData,
            FetchFailure::FieldNotFound(_) => FailureKind::FieldNotFound,
            FetchFailure::InsufficientHistory { .. } => FailureKind::InsufficientHistory,
            FetchFailure::Transient(_) => FailureKind::TransientFetchFailure,
        }
    }
}

impl From<DataError> for FetchFailure {
    fn from(err: DataError) -> Self {
        match err {
            DataError::SymbolNotFound { .. } => FetchFailure::NoData,
            other => FetchFailure::Transient(other),
        }
    }
}

/// Fetches anchored series from a provider.
pub struct SeriesFetcher<'a> {
    provider: &'a dyn PriceProvider,
    resolver: FieldResolver,
    window: RetrievalWindow,
}

impl<'a> SeriesFetcher<'a> {
    pub fn new(provider: &'a dyn PriceProvider) -> Self {
        Self {
            provider,
            resolver: FieldResolver::default(),
            window: RetrievalWindow::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: FieldResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_window(mut self, window: RetrievalWindow) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> RetrievalWindow {
        self.window
    }

    pub fn provider(&self) -> &dyn PriceProvider {
        self.provider
    }

    /// Fetch the first `n` trading days on or after `anchor`, reporting failures.
    pub fn try_fetch(
        &self,
        symbol: &str,
        anchor: NaiveDate,
        n: usize,
    ) -> Result<PriceSeries, FetchFailure> {
        if n == 0 {
            return Err(FetchFailure::InsufficientHistory { have: 0, need: 0 });
        }
        if n > self.window.safe_trading_days() {
            tracing::warn!(
                symbol,
                n,
                safe = self.window.safe_trading_days(),
                pad_after_days = self.window.pad_after_days,
                "requested trading days exceed the window's safe capacity; widen the window"
            );
        }

        let (start, end) = self.window.bounds(anchor).ok_or(FetchFailure::NoData)?;
        let records = self.provider.fetch_ohlc(symbol, start, end)?;
        if records.is_empty() {
            return Err(FetchFailure::NoData);
        }

        let resolved = self.resolver.resolve(&records)?;
        tracing::trace!(symbol, field = %resolved.field, rows = records.len(), "resolved price field");

        // Anchor rule: nothing before the anchor date survives.
        let anchored = resolved.series.on_or_after(anchor);
        if anchored.len() < n {
            return Err(FetchFailure::InsufficientHistory {
                have: anchored.len(),
                need: n,
            });
        }

        Ok(anchored.head(n))
    }

    /// Fetch the first `n` trading days on or after `anchor`.
    ///
    /// Never fails: every failure becomes the empty sentinel and is logged.
    pub fn fetch(&self, symbol: &str, anchor: NaiveDate, n: usize) -> PriceSeries {
        match self.try_fetch(symbol, anchor, n) {
            Ok(series) => series,
            Err(failure) => {
                match failure.kind() {
                    FailureKind::TransientFetchFailure => tracing::warn!(
                        symbol,
                        anchor = %anchor,
                        kind = %failure.kind(),
                        error = %failure,
                        "fetch failed"
                    ),
                    _ => tracing::debug!(
                        symbol,
                        anchor = %anchor,
                        kind = %failure.kind(),
                        error = %failure,
                        "no usable series"
                    ),
                }
                PriceSeries::empty()
            }
        }
    }
}
