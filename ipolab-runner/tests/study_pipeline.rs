//! Study runs end to end: TOML config → cohort files → CSV price directory →
//! matrices → exported artifacts.

use ipolab_runner::export::CohortStatus;
use ipolab_runner::{run_study, save_study, NoDelay, StudyConfig, StudySummary};
use std::fmt::Write as _;
use std::path::Path;

/// Write `{dir}/{symbol}.csv` with `days` weekday rows starting at `start`.
fn write_prices(dir: &Path, symbol: &str, start: &str, days: usize, base: f64) {
    let start = chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    let mut text = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    let mut price = base;
    for date in start
        .iter_days()
        .filter(|d| chrono::Datelike::weekday(d).number_from_monday() <= 5)
        .take(days)
    {
        writeln!(text, "{date},{price},{price},{price},{price},{price},1000").unwrap();
        price += 0.5;
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), text).unwrap();
}

fn setup(dir: &Path) -> StudyConfig {
    let prices = dir.join("prices");
    std::fs::create_dir_all(&prices).unwrap();
    write_prices(&prices, "AAA", "2021-03-01", 30, 10.0);
    write_prices(&prices, "BBB", "2021-04-12", 30, 20.0);
    write_prices(&prices, "CCC", "2021-05-03", 4, 5.0);

    std::fs::write(
        dir.join("early.csv"),
        "Symbol,Name,IPO Date\naaa,Alpha,2021-03-01\nBBB,Beta,04/12/2021\nCCC,Gamma,2021-05-03\nXYZ,Bad,someday\n",
    )
    .unwrap();

    let toml = r#"
[harvest]
trading_days = 10
min_delay_ms = 0

[matrix]
max_horizon = 12

[provider]
kind = "csv"
dir = "prices"

[[cohorts]]
label = "early"
path = "early.csv"

[[cohorts]]
label = "missing"
path = "does_not_exist.csv"
"#;
    let config_path = dir.join("study.toml");
    std::fs::write(&config_path, toml).unwrap();
    StudyConfig::load(&config_path).unwrap()
}

#[test]
fn study_runs_every_cohort_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let provider = config.provider.build().unwrap();

    let report = run_study(&config, provider.as_ref(), &mut NoDelay);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.outcomes[1].label(), "missing");

    let early = report.outcomes[0].as_completed().unwrap();
    assert_eq!(early.rejected.len(), 1, "unparseable date row is rejected");
    assert_eq!(early.harvest.attempted, 3, "rejected rows are not attempted");
    assert_eq!(early.harvest.succeeded, 2);

    let matrix = &early.matrix;
    assert_eq!(matrix.shape(), (2, 12));
    // Series have 10 days, so horizons 10..=12 are missing.
    assert!(matrix.get("AAA", 9).is_some());
    assert!(matrix.get("AAA", 10).is_none());
    assert!((matrix.get("AAA", 1).unwrap() - 0.05).abs() < 1e-12);
    assert!((matrix.get("BBB", 2).unwrap() - 0.05).abs() < 1e-12);

    assert_eq!(early.stats.len(), 12);
    assert_eq!(early.stats[0].count, 2);
    assert_eq!(early.stats[11].count, 0);
}

#[test]
fn study_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let provider = config.provider.build().unwrap();

    let a = run_study(&config, provider.as_ref(), &mut NoDelay);
    let b = run_study(&config, provider.as_ref(), &mut NoDelay);
    let (a, b) = (
        a.outcomes[0].as_completed().unwrap(),
        b.outcomes[0].as_completed().unwrap(),
    );
    assert_eq!(a.harvest.dataset_hash(), b.harvest.dataset_hash());
    assert_eq!(a.matrix.fingerprint(), b.matrix.fingerprint());
}

#[test]
fn saved_study_contains_summary_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());
    let provider = config.provider.build().unwrap();
    let report = run_study(&config, provider.as_ref(), &mut NoDelay);

    let out = dir.path().join("out");
    let written = save_study(&report, &out).unwrap();
    assert_eq!(written.len(), 4);
    assert!(out.join("early_returns.csv").exists());
    assert!(out.join("early_horizon_stats.csv").exists());
    assert!(out.join("early_returns.parquet").exists());

    let json = std::fs::read_to_string(out.join("summary.json")).unwrap();
    let summary: StudySummary = serde_json::from_str(&json).unwrap();
    assert_eq!(summary.provider, "csv_directory");
    assert_eq!(summary.cohorts.len(), 2);
    assert_eq!(summary.cohorts[0].status, CohortStatus::Completed);
    assert_eq!(summary.cohorts[0].succeeded, 2);
    assert_eq!(summary.cohorts[1].status, CohortStatus::Failed);
    assert!(summary.cohorts[1].error.is_some());

    let csv = std::fs::read_to_string(out.join("early_returns.csv")).unwrap();
    assert!(csv.starts_with("symbol,1,2,3,4,5,6,7,8,9,10,11,12\n"));
    assert!(csv.contains("\nAAA,"));
}
