//! Yahoo Finance price provider.
//!
//! Fetches daily records from Yahoo's v8 chart API. Handles per-request
//! timeouts, retries with exponential backoff, response parsing, and the
//! circuit breaker.
//!
//! Whether the `Adj Close` field comes back depends on the request: with
//! `include_adjusted_close` off (or when Yahoo omits the `adjclose` block) the
//! records carry only the plain OHLCV fields, and the field resolver falls
//! back to `Close`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{fields, DataError, DataSource, PriceProvider, RawDailyRecord};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Request settings for [`YahooProvider`].
#[derive(Debug, Clone)]
pub struct YahooConfig {
    /// Per-request timeout; a stalled request degrades to a per-symbol failure.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub base_delay: Duration,
    /// Ask for (and keep) the `Adj Close` series.
    pub include_adjusted_close: bool,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            include_adjusted_close: true,
        }
    }
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    config: YahooConfig,
}

impl YahooProvider {
    pub fn new(config: YahooConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            config,
        })
    }

    /// Provider with default settings and a fresh default breaker.
    pub fn with_defaults() -> Result<Self, DataError> {
        Self::new(
            YahooConfig::default(),
            Arc::new(CircuitBreaker::default_provider()),
        )
    }

    /// Build the chart API URL. `end` is exclusive: period2 is midnight of `end`.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate, include_adjusted: bool) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{CHART_ENDPOINT}/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose={include_adjusted}"
        )
    }

    /// Parse the chart API response into raw daily records.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        include_adjusted: bool,
    ) -> Result<Vec<RawDailyRecord>, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };

        // A listed symbol with no trading in the window comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = if include_adjusted {
            data.indicators
                .adjclose
                .and_then(|v| v.into_iter().next())
                .map(|a| a.adjclose)
        } else {
            None
        };

        let mut records = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let at = |series: &Vec<Option<f64>>| series.get(i).copied().flatten();
            let columns = [
                (fields::OPEN, at(&quote.open)),
                (fields::HIGH, at(&quote.high)),
                (fields::LOW, at(&quote.low)),
                (fields::CLOSE, at(&quote.close)),
                (fields::VOLUME, at(&quote.volume)),
            ];

            // Skip rows where every price field is null (holidays/non-trading days)
            if columns.iter().all(|(_, v)| v.is_none()) {
                continue;
            }

            let mut record = RawDailyRecord::new(date);
            for (name, value) in columns {
                if let Some(v) = value {
                    record.fields.insert(name.to_string(), v);
                }
            }
            if let Some(adj) = adj_closes.as_ref().and_then(|v| at(v)) {
                record.fields.insert(fields::ADJ_CLOSE.to_string(), adj);
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Execute the request with retry and circuit breaker logic.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(symbol, start, end, self.config.include_adjusted_close);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::Timeout(e.to_string()));
                    continue;
                }
                Err(e) if e.is_connect() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                // Unknown symbols come back as 404 with a chart error body.
                self.circuit_breaker.record_success();
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;

            let records = Self::parse_response(symbol, chart, self.config.include_adjusted_close)?;
            self.circuit_breaker.record_success();
            return Ok(records);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn source(&self) -> DataSource {
        DataSource::YahooFinance
    }

    fn fetch_ohlc(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>, DataError> {
        self.fetch_with_retry(symbol, start, end)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
