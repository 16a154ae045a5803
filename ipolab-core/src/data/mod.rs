//! Upstream price sources

pub mod circuit_breaker;
pub mod csv_dir;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_dir::CsvDirProvider;
pub use provider::{fields, DataError, DataSource, PriceProvider, RawDailyRecord};
pub use synthetic::SyntheticProvider;
pub use yahoo::{YahooConfig, YahooProvider};
