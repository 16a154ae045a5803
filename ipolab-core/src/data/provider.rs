//! Upstream price capability and structured error types.
//!
//! The PriceProvider trait abstracts over data sources (Yahoo Finance, a
//! directory of CSV files, synthetic walks) so the fetcher can be pointed at
//! any of them and mocked in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Field names in the upstream vocabulary.
pub mod fields {
    pub const OPEN: &str = "Open";
    pub const HIGH: &str = "High";
    pub const LOW: &str = "Low";
    pub const CLOSE: &str = "Close";
    pub const ADJ_CLOSE: &str = "Adj Close";
    pub const VOLUME: &str = "Volume";
}

/// One day of raw upstream data for one symbol.
///
/// Fields are whatever the source returned that day; a field may be absent
/// from some or all rows depending on the source and its request parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDailyRecord {
    pub date: NaiveDate,
    pub fields: BTreeMap<String, f64>,
}

impl RawDailyRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// Structured error types for upstream access.
///
/// These are designed to be displayable in both logs and CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a provider gets its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    CsvDirectory,
    Synthetic,
}

/// Upstream market-data capability.
///
/// Implementations handle the specifics of one source. Pacing and per-symbol
/// failure policy live above this trait; providers only report what happened.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Which source this provider reads from.
    fn source(&self) -> DataSource;

    /// Fetch daily records for `symbol` with `start <= date < end`.
    ///
    /// An empty vector means the source had nothing for the window.
    fn fetch_ohlc(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
