//! Synthetic provider for demos and offline runs.
//!
//! Produces a deterministic random walk per symbol (seeded from BLAKE3 of the
//! symbol), on weekdays only. These are clearly fake prices; the CLI tags any
//! output produced from them.

use super::provider::{fields, DataError, DataSource, PriceProvider, RawDailyRecord};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic daily records.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    include_adjusted_close: bool,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            include_adjusted_close: true,
        }
    }

    /// Emit only plain OHLCV fields, as the live source does for some requests.
    pub fn without_adjusted_close(mut self) -> Self {
        self.include_adjusted_close = false;
        self
    }

    fn rng_for(symbol: &str) -> StdRng {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        StdRng::from_seed(seed)
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch_ohlc(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, DataError> {
        let mut rng = Self::rng_for(symbol);
        let mut price: f64 = rng.gen_range(8.0..40.0);
        let mut records = Vec::new();

        for date in start.iter_days().take_while(|d| *d < end) {
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.05..0.05);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.02));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.02));
            let volume = rng.gen_range(100_000..2_000_000u64) as f64;

            let mut record = RawDailyRecord::new(date)
                .with_field(fields::OPEN, open)
                .with_field(fields::HIGH, high)
                .with_field(fields::LOW, low)
                .with_field(fields::CLOSE, close)
                .with_field(fields::VOLUME, volume);
            if self.include_adjusted_close {
                record = record.with_field(fields::ADJ_CLOSE, close);
            }
            records.push(record);

            price = close;
        }

        Ok(records)
    }
}
