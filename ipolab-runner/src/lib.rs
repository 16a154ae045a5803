//! IPOLab Runner: cohort harvests, studies, and exports.
//!
//! This crate builds on `ipolab-core` to provide:
//! - Cohort ingestion from CSV with per-row rejection
//! - Pacing policies for upstream calls
//! - The sequential harvest orchestrator
//! - TOML study configuration and the multi-cohort study runner
//! - CSV, JSON, and Parquet export

pub mod cohort;
pub mod config;
pub mod export;
pub mod harvest;
pub mod pacing;
pub mod study;

pub use cohort::{parse_anchor_date, Cohort, CohortError, RejectedRow};
pub use config::{
    CohortSource, ConfigError, HarvestSettings, MatrixSettings, ProviderKind, ProviderSettings,
    StudyConfig, WindowPolicy,
};
pub use export::{save_cohort, save_study, ExportError, StudySummary};
pub use harvest::{harvest, harvest_with_delay, HarvestResult};
pub use pacing::{FixedDelay, NoDelay, Pacer};
pub use study::{run_cohort, run_study, CohortOutcome, CohortRun, StudyReport};
