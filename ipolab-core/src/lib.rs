//! IPOLab Core: event-anchored price series and horizon return matrices.
//!
//! This crate contains the post-IPO return pipeline:
//! - Domain types (anchor events, resolved price series, failure taxonomy)
//! - Upstream price providers (Yahoo Finance, CSV directory, synthetic)
//! - Price field resolution with an explicit adjusted → plain close fallback
//! - The event-anchored series fetcher ("day 0 is the first trading day on
//!   or after the anchor date")
//! - The return matrix builder and cross-sectional horizon statistics

pub mod data;
pub mod domain;
pub mod fetch;
pub mod resolve;
pub mod returns;

pub use domain::{normalize_symbol, AnchorEvent, FailureKind, PricePoint, PriceSeries, SeriesMap};
pub use fetch::{FetchFailure, RetrievalWindow, SeriesFetcher};
pub use resolve::{FieldNotFound, FieldResolver, ResolvedSeries};
pub use returns::{build_return_matrix, horizon_stats, HorizonStats, ReturnMatrix};
