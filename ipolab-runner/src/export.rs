//! Export of study results as CSV, JSON, and Parquet artifacts.
//!
//! - **Matrix CSV**: `symbol,1,2,...,H`, one row per symbol, missing cells empty
//! - **Stats CSV**: one row per horizon day
//! - **Summary JSON**: per-cohort counters, hashes, and rejected rows
//! - **Matrix Parquet**: the wide DataFrame form (`symbol`, `d1..dH`)
//!
//! Files are written to `{name}.tmp` and renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ipolab_core::{HorizonStats, ReturnMatrix};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cohort::RejectedRow;
use crate::study::{CohortOutcome, CohortRun, StudyReport};

/// Bump when the summary layout changes.
pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] PolarsError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Matrix as CSV text. Header is `symbol` followed by the horizon days.
pub fn export_matrix_csv(matrix: &ReturnMatrix) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["symbol".to_string()];
    header.extend(matrix.horizons().map(|d| d.to_string()));
    wtr.write_record(&header)?;

    for (symbol, row) in matrix.rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(symbol.to_string());
        record.extend(row.iter().map(|c| c.map(|v| v.to_string()).unwrap_or_default()));
        wtr.write_record(&record)?;
    }

    into_string(wtr)
}

/// Horizon statistics as CSV text; undefined statistics are empty.
pub fn export_stats_csv(stats: &[HorizonStats]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "day", "count", "mean", "median", "std_dev", "min", "max", "hit_rate",
    ])?;

    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
    for s in stats {
        wtr.write_record([
            s.day.to_string(),
            s.count.to_string(),
            fmt(s.mean),
            fmt(s.median),
            fmt(s.std_dev),
            fmt(s.min),
            fmt(s.max),
            fmt(s.hit_rate),
        ])?;
    }

    into_string(wtr)
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| ExportError::Io {
        path: "<memory>".into(),
        source: e.into_error(),
    })?;
    // csv only ever writes the UTF-8 we handed it.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ─── JSON summary ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub label: String,
    pub status: CohortStatus,
    pub attempted: usize,
    pub succeeded: usize,
    pub success_rate: f64,
    pub rejected_rows: Vec<RejectedRow>,
    pub dataset_hash: Option<String>,
    pub matrix_fingerprint: Option<String>,
    pub populated_cells: usize,
    pub missing_cells: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortStatus {
    Completed,
    Failed,
}

impl CohortSummary {
    fn from_run(run: &CohortRun) -> Self {
        Self {
            label: run.label.clone(),
            status: CohortStatus::Completed,
            attempted: run.harvest.attempted,
            succeeded: run.harvest.succeeded,
            success_rate: run.harvest.success_rate(),
            rejected_rows: run.rejected.clone(),
            dataset_hash: Some(run.harvest.dataset_hash()),
            matrix_fingerprint: Some(run.matrix.fingerprint()),
            populated_cells: run.matrix.populated_cells(),
            missing_cells: run.matrix.missing_cells(),
            error: None,
        }
    }

    fn failed(label: &str, error: &str) -> Self {
        Self {
            label: label.to_string(),
            status: CohortStatus::Failed,
            attempted: 0,
            succeeded: 0,
            success_rate: 0.0,
            rejected_rows: Vec::new(),
            dataset_hash: None,
            matrix_fingerprint: None,
            populated_cells: 0,
            missing_cells: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Machine-readable record of a study run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub trading_days: usize,
    pub max_horizon: usize,
    pub cohorts: Vec<CohortSummary>,
}

impl StudySummary {
    pub fn from_report(report: &StudyReport) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            generated_at: Utc::now(),
            provider: report.provider.clone(),
            trading_days: report.trading_days,
            max_horizon: report.max_horizon,
            cohorts: report
                .outcomes
                .iter()
                .map(|o| match o {
                    CohortOutcome::Completed(run) => CohortSummary::from_run(run),
                    CohortOutcome::Failed { label, error } => CohortSummary::failed(label, error),
                })
                .collect(),
        }
    }
}

pub fn export_summary_json(summary: &StudySummary) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

// ─── Parquet ────────────────────────────────────────────────────────

pub fn write_matrix_parquet(matrix: &ReturnMatrix, path: &Path) -> Result<(), ExportError> {
    let mut df = matrix.to_dataframe()?;
    let tmp = tmp_path(path);
    let file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
    ParquetWriter::new(file).finish(&mut df)?;
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

// ─── Files ──────────────────────────────────────────────────────────

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` via a temp file and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ExportError> {
    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(contents.as_bytes()).map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

/// File-name-safe form of a cohort label.
fn slug(label: &str) -> String {
    let s: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() {
        "cohort".into()
    } else {
        s
    }
}

/// Write one cohort's matrix (CSV + Parquet) and stats CSV into `dir`.
pub fn save_cohort(run: &CohortRun, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let stem = slug(&run.label);

    let matrix_csv = dir.join(format!("{stem}_returns.csv"));
    write_atomic(&matrix_csv, &export_matrix_csv(&run.matrix)?)?;

    let stats_csv = dir.join(format!("{stem}_horizon_stats.csv"));
    write_atomic(&stats_csv, &export_stats_csv(&run.stats)?)?;

    let parquet = dir.join(format!("{stem}_returns.parquet"));
    write_matrix_parquet(&run.matrix, &parquet)?;

    Ok(vec![matrix_csv, stats_csv, parquet])
}

/// Write every completed cohort plus `summary.json` into `dir`.
pub fn save_study(report: &StudyReport, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();
    for run in report.completed() {
        written.extend(save_cohort(run, dir)?);
    }

    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let summary_path = dir.join("summary.json");
    write_atomic(
        &summary_path,
        &export_summary_json(&StudySummary::from_report(report))?,
    )?;
    written.push(summary_path);

    tracing::info!(dir = %dir.display(), files = written.len(), "exported study artifacts");
    Ok(written)
}
