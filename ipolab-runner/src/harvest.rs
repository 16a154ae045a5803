//! Cohort harvest: fetch an anchored series for every cohort row.
//!
//! Rows are processed strictly sequentially in input order, with the pacer
//! consulted before each upstream call. A failed symbol is a skip: it counts
//! toward `attempted` but never aborts the run. Duplicate symbols are fetched
//! independently; a later successful fetch replaces the earlier series in
//! place (last-write-wins, first-seen position). While the provider reports
//! itself unavailable (a tripped circuit breaker), rows are counted as failed
//! without pacing or calling it.

use ipolab_core::{normalize_symbol, AnchorEvent, SeriesFetcher, SeriesMap};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pacing::{FixedDelay, Pacer};

/// Harvested series plus counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestResult {
    /// Normalized symbol → series of exactly `n` trading days.
    pub series: SeriesMap,
    /// Cohort rows processed, whatever their outcome.
    pub attempted: usize,
    /// Rows whose fetch produced a non-empty series.
    pub succeeded: usize,
}

impl HarvestResult {
    /// `succeeded / attempted`; 0.0 for an empty cohort.
    ///
    /// Observability only; nothing aborts on a low ratio.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    /// Distinct symbols in the mapping (duplicates collapse).
    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    /// BLAKE3 over every symbol, date, and exact price bit pattern, in map order.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (symbol, series) in &self.series {
            hasher.update(symbol.as_bytes());
            hasher.update(&[0xff]);
            for point in series.iter() {
                hasher.update(point.date.to_string().as_bytes());
                hasher.update(&point.price.to_bits().to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Harvest `n` trading days per cohort row, pacing with `pacer`.
pub fn harvest(
    fetcher: &SeriesFetcher<'_>,
    cohort: &[AnchorEvent],
    n: usize,
    pacer: &mut dyn Pacer,
) -> HarvestResult {
    let mut result = HarvestResult::default();
    let mut unavailable = 0usize;

    tracing::info!(
        rows = cohort.len(),
        n,
        provider = fetcher.provider().name(),
        "harvest started"
    );

    for event in cohort {
        result.attempted += 1;

        let symbol = normalize_symbol(&event.symbol);
        if symbol.is_empty() {
            tracing::debug!(raw = %event.symbol, "blank symbol; skipped");
            continue;
        }

        if !fetcher.provider().is_available() {
            if unavailable == 0 {
                tracing::warn!(
                    symbol = %symbol,
                    provider = fetcher.provider().name(),
                    "provider unavailable; skipping fetches"
                );
            }
            unavailable += 1;
            continue;
        }

        pacer.pace();
        let series = fetcher.fetch(&symbol, event.anchor_date, n);
        if series.is_empty() {
            continue;
        }

        if result.series.insert(symbol.clone(), series).is_some() {
            tracing::debug!(symbol = %symbol, anchor = %event.anchor_date, "duplicate symbol; later row wins");
        }
        result.succeeded += 1;
    }

    if unavailable > 0 {
        tracing::warn!(skipped = unavailable, "rows skipped while the provider was unavailable");
    }
    tracing::info!(
        attempted = result.attempted,
        succeeded = result.succeeded,
        success_rate = %format!("{:.1}%", result.success_rate() * 100.0),
        "Successfully downloaded {}/{}",
        result.succeeded,
        result.attempted
    );

    result
}

/// [`harvest`] with a [`FixedDelay`] of `min_delay` between calls.
pub fn harvest_with_delay(
    fetcher: &SeriesFetcher<'_>,
    cohort: &[AnchorEvent],
    n: usize,
    min_delay: Duration,
) -> HarvestResult {
    let mut pacer = FixedDelay::new(min_delay);
    harvest(fetcher, cohort, n, &mut pacer)
}
