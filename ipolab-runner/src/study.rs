//! Multi-cohort study runner.
//!
//! Each cohort in the config is loaded, harvested, and turned into a return
//! matrix, in file order. A cohort whose file cannot be loaded is reported
//! as failed; the remaining cohorts still run.

use ipolab_core::data::PriceProvider;
use ipolab_core::{build_return_matrix, horizon_stats, HorizonStats, ReturnMatrix, SeriesFetcher};

use crate::cohort::{Cohort, RejectedRow};
use crate::config::StudyConfig;
use crate::harvest::{harvest, HarvestResult};
use crate::pacing::Pacer;

/// Everything produced for one cohort.
#[derive(Debug, Clone)]
pub struct CohortRun {
    pub label: String,
    pub rejected: Vec<RejectedRow>,
    pub harvest: HarvestResult,
    pub matrix: ReturnMatrix,
    pub stats: Vec<HorizonStats>,
}

#[derive(Debug, Clone)]
pub enum CohortOutcome {
    Completed(Box<CohortRun>),
    Failed { label: String, error: String },
}

impl CohortOutcome {
    pub fn label(&self) -> &str {
        match self {
            CohortOutcome::Completed(run) => &run.label,
            CohortOutcome::Failed { label, .. } => label,
        }
    }

    pub fn as_completed(&self) -> Option<&CohortRun> {
        match self {
            CohortOutcome::Completed(run) => Some(run),
            CohortOutcome::Failed { .. } => None,
        }
    }
}

/// Outcomes in config order.
#[derive(Debug, Clone, Default)]
pub struct StudyReport {
    pub trading_days: usize,
    pub max_horizon: usize,
    pub provider: String,
    pub outcomes: Vec<CohortOutcome>,
}

impl StudyReport {
    pub fn completed(&self) -> impl Iterator<Item = &CohortRun> {
        self.outcomes.iter().filter_map(CohortOutcome::as_completed)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CohortOutcome::Failed { .. }))
            .count()
    }
}

/// Harvest an already-loaded cohort and build its matrix.
pub fn run_cohort(
    cohort: Cohort,
    fetcher: &SeriesFetcher<'_>,
    trading_days: usize,
    max_horizon: usize,
    pacer: &mut dyn Pacer,
) -> CohortRun {
    let harvest = harvest(fetcher, &cohort.events, trading_days, pacer);
    let matrix = build_return_matrix(&harvest.series, max_horizon);
    let stats = horizon_stats(&matrix);

    tracing::info!(
        label = %cohort.label,
        rows = matrix.shape().0,
        populated = matrix.populated_cells(),
        missing = matrix.missing_cells(),
        "built return matrix"
    );

    CohortRun {
        label: cohort.label,
        rejected: cohort.rejected,
        harvest,
        matrix,
        stats,
    }
}

/// Run every cohort in `config` against `provider`.
pub fn run_study(
    config: &StudyConfig,
    provider: &dyn PriceProvider,
    pacer: &mut dyn Pacer,
) -> StudyReport {
    let fetcher = SeriesFetcher::new(provider).with_window(config.harvest.retrieval_window());
    let mut report = StudyReport {
        trading_days: config.harvest.trading_days,
        max_horizon: config.matrix.max_horizon,
        provider: provider.name().to_string(),
        outcomes: Vec::with_capacity(config.cohorts.len()),
    };

    for source in &config.cohorts {
        let outcome = match Cohort::from_csv_path(source.label.clone(), &source.path) {
            Ok(cohort) => CohortOutcome::Completed(Box::new(run_cohort(
                cohort,
                &fetcher,
                config.harvest.trading_days,
                config.matrix.max_horizon,
                pacer,
            ))),
            Err(e) => {
                tracing::error!(label = %source.label, path = %source.path.display(), error = %e, "cohort failed to load");
                CohortOutcome::Failed {
                    label: source.label.clone(),
                    error: e.to_string(),
                }
            }
        };
        report.outcomes.push(outcome);
    }

    tracing::info!(
        cohorts = report.outcomes.len(),
        failed = report.failed_count(),
        "study complete"
    );
    report
}
