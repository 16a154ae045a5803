//! IPOLab CLI: harvest post-IPO price paths and build return matrices.
//!
//! Commands:
//! - `harvest`: one cohort CSV → harvested series → return matrix + stats
//! - `study`: every cohort in a TOML study config
//! - `inspect`: fetch one symbol and show why it did or did not resolve

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ipolab_core::data::PriceProvider;
use ipolab_core::{HorizonStats, SeriesFetcher};
use ipolab_runner::{
    parse_anchor_date, run_cohort, run_study, save_cohort, save_study, Cohort, CohortOutcome,
    CohortRun, FixedDelay, ProviderKind, ProviderSettings, StudyConfig, WindowPolicy,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ipolab",
    version,
    about = "IPOLab CLI: post-IPO event-anchored return matrices"
)]
struct Cli {
    /// Verbose logging (debug level). A set RUST_LOG takes precedence.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Yahoo,
    Csv,
    Synthetic,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Yahoo => ProviderKind::Yahoo,
            ProviderArg::Csv => ProviderKind::Csv,
            ProviderArg::Synthetic => ProviderKind::Synthetic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum WindowArg {
    Fixed,
    Scaled,
}

impl From<WindowArg> for WindowPolicy {
    fn from(arg: WindowArg) -> Self {
        match arg {
            WindowArg::Fixed => WindowPolicy::Fixed,
            WindowArg::Scaled => WindowPolicy::Scaled,
        }
    }
}

/// Upstream selection shared by `harvest` and `inspect`.
#[derive(clap::Args)]
struct ProviderOpts {
    /// Upstream price source.
    #[arg(long, value_enum, default_value = "yahoo")]
    provider: ProviderArg,

    /// Directory of {SYMBOL}.csv files (required with --provider csv).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Do not request the adjusted close; resolve from the plain close.
    #[arg(long, default_value_t = false)]
    no_adjusted: bool,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl ProviderOpts {
    fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            kind: self.provider.into(),
            timeout_secs: self.timeout_secs,
            include_adjusted_close: !self.no_adjusted,
            dir: self.data_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest one cohort CSV and build its return matrix.
    Harvest {
        /// Cohort CSV with `Symbol` and `IPO Date` columns.
        #[arg(long)]
        cohort: PathBuf,

        /// Cohort label. Defaults to the file stem.
        #[arg(long)]
        label: Option<String>,

        /// Trading days to keep per symbol (day 0 included).
        #[arg(long, default_value_t = 10)]
        trading_days: usize,

        /// Last horizon day in the matrix.
        #[arg(long, default_value_t = 9)]
        max_horizon: usize,

        /// Minimum spacing between upstream calls, in milliseconds.
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,

        /// Retrieval window policy.
        #[arg(long, value_enum, default_value = "fixed")]
        window: WindowArg,

        #[command(flatten)]
        provider: ProviderOpts,

        /// Output directory for matrix and stats files.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run every cohort in a TOML study config.
    Study {
        /// Path to the study TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Override `[harvest] min_delay_ms`.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Override `[provider] kind`.
        #[arg(long, value_enum)]
        provider: Option<ProviderArg>,

        /// Output directory for artifacts and summary.json.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Fetch one symbol's anchored series and print it.
    Inspect {
        #[arg(long)]
        symbol: String,

        /// Anchor date (YYYY-MM-DD, YYYY/MM/DD, or MM/DD/YYYY).
        #[arg(long)]
        ipo_date: String,

        #[arg(long, default_value_t = 10)]
        trading_days: usize,

        /// Retrieval window policy.
        #[arg(long, value_enum, default_value = "fixed")]
        window: WindowArg,

        #[command(flatten)]
        provider: ProviderOpts,
    },
}

/// `RUST_LOG` wins when set and valid; otherwise `-v` picks debug over info.
fn log_filter(verbose: bool, env_directives: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    env_directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

fn init_tracing(verbose: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, env.as_deref()))
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Harvest {
            cohort,
            label,
            trading_days,
            max_horizon,
            delay_ms,
            window,
            provider,
            output_dir,
        } => run_harvest_cmd(
            &cohort,
            label,
            trading_days,
            max_horizon,
            delay_ms,
            window.into(),
            &provider.settings(),
            &output_dir,
        ),
        Commands::Study {
            config,
            delay_ms,
            provider,
            output_dir,
        } => run_study_cmd(&config, delay_ms, provider, &output_dir),
        Commands::Inspect {
            symbol,
            ipo_date,
            trading_days,
            window,
            provider,
        } => run_inspect(
            &symbol,
            &ipo_date,
            trading_days,
            window.into(),
            &provider.settings(),
        ),
    }
}

fn build_provider(settings: &ProviderSettings) -> Result<Box<dyn PriceProvider>> {
    if settings.kind == ProviderKind::Csv && settings.dir.is_none() {
        bail!("--data-dir is required with --provider csv");
    }
    let provider = settings.build().context("failed to set up the price provider")?;
    if settings.kind == ProviderKind::Synthetic {
        eprintln!("WARNING: synthetic prices; results are not real market data");
    }
    Ok(provider)
}

#[allow(clippy::too_many_arguments)]
fn run_harvest_cmd(
    cohort_path: &Path,
    label: Option<String>,
    trading_days: usize,
    max_horizon: usize,
    delay_ms: u64,
    window: WindowPolicy,
    provider_settings: &ProviderSettings,
    output_dir: &Path,
) -> Result<()> {
    if trading_days == 0 {
        bail!("--trading-days must be > 0");
    }
    if max_horizon == 0 {
        bail!("--max-horizon must be > 0");
    }

    let label = label.unwrap_or_else(|| {
        cohort_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cohort".into())
    });
    let cohort = Cohort::from_csv_path(label, cohort_path)?;

    let provider = build_provider(provider_settings)?;
    let fetcher = SeriesFetcher::new(provider.as_ref()).with_window(window.window_for(trading_days));
    let mut pacer = FixedDelay::new(std::time::Duration::from_millis(delay_ms));

    let run = run_cohort(cohort, &fetcher, trading_days, max_horizon, &mut pacer);
    print_cohort(&run);

    let written = save_cohort(&run, output_dir)?;
    for path in written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn run_study_cmd(
    config_path: &Path,
    delay_ms: Option<u64>,
    provider: Option<ProviderArg>,
    output_dir: &Path,
) -> Result<()> {
    let mut config = StudyConfig::load(config_path)
        .with_context(|| format!("loading study config {}", config_path.display()))?;
    if let Some(ms) = delay_ms {
        config.harvest.min_delay_ms = ms;
    }
    if let Some(kind) = provider {
        config.provider.kind = kind.into();
        config.validate()?;
    }

    let upstream = build_provider(&config.provider)?;
    let mut pacer = FixedDelay::new(config.harvest.min_delay());
    let report = run_study(&config, upstream.as_ref(), &mut pacer);

    for outcome in &report.outcomes {
        match outcome {
            CohortOutcome::Completed(run) => print_cohort(run),
            CohortOutcome::Failed { label, error } => {
                println!("=== {label} ===");
                println!("  FAILED: {error}");
            }
        }
    }

    let written = save_study(&report, output_dir)?;
    println!("Saved {} files to {}", written.len(), output_dir.display());

    if report.failed_count() == report.outcomes.len() && !report.outcomes.is_empty() {
        bail!("every cohort failed");
    }
    Ok(())
}

fn run_inspect(
    symbol: &str,
    ipo_date: &str,
    trading_days: usize,
    window: WindowPolicy,
    provider_settings: &ProviderSettings,
) -> Result<()> {
    let Some(anchor) = parse_anchor_date(ipo_date) else {
        bail!("unparseable --ipo-date '{ipo_date}'");
    };
    let symbol = ipolab_core::normalize_symbol(symbol);

    let provider = build_provider(provider_settings)?;
    let window = window.window_for(trading_days);
    let fetcher = SeriesFetcher::new(provider.as_ref()).with_window(window);
    let (start, end) = window
        .bounds(anchor)
        .context("anchor date out of range")?;

    println!("{symbol} anchored at {anchor}");
    println!("  window: {start} .. {end} (safe capacity {} days)", window.safe_trading_days());

    if !provider.is_available() {
        println!("  no series: provider '{}' is unavailable", provider.name());
        return Ok(());
    }

    match fetcher.try_fetch(&symbol, anchor, trading_days) {
        Ok(series) => {
            let base = series.price_at(0).unwrap_or(f64::NAN);
            println!("  {:>3}  {:<10}  {:>12}  {:>9}", "day", "date", "price", "return");
            for (day, point) in series.iter().enumerate() {
                println!(
                    "  {:>3}  {:<10}  {:>12.4}  {:>8.2}%",
                    day,
                    point.date,
                    point.price,
                    (point.price / base - 1.0) * 100.0
                );
            }
        }
        Err(failure) => {
            println!("  no series: {} ({failure})", failure.kind());
        }
    }
    Ok(())
}

fn print_cohort(run: &CohortRun) {
    let (rows, cols) = run.matrix.shape();
    println!("=== {} ===", run.label);
    println!(
        "  Successfully downloaded {}/{} ({:.1}%)",
        run.harvest.succeeded,
        run.harvest.attempted,
        run.harvest.success_rate() * 100.0
    );
    if !run.rejected.is_empty() {
        println!("  Rejected rows:  {}", run.rejected.len());
    }
    println!(
        "  Matrix:         {rows} x {cols} ({} populated, {} missing)",
        run.matrix.populated_cells(),
        run.matrix.missing_cells()
    );
    println!("  Dataset hash:   {}", run.harvest.dataset_hash());
    print_stats(&run.stats);
}

fn print_stats(stats: &[HorizonStats]) {
    let pct = |v: Option<f64>| match v {
        Some(v) => format!("{:>8.2}%", v * 100.0),
        None => format!("{:>9}", "-"),
    };
    println!(
        "  {:>4}  {:>5}  {:>9}  {:>9}  {:>9}  {:>9}",
        "day", "n", "mean", "median", "std", "hit"
    );
    for s in stats {
        println!(
            "  {:>4}  {:>5}  {}  {}  {}  {}",
            s.day,
            s.count,
            pct(s.mean),
            pct(s.median),
            pct(s.std_dev),
            pct(s.hit_rate)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn harvest_defaults() {
        let cli = Cli::try_parse_from(["ipolab", "harvest", "--cohort", "ipos.csv"]).unwrap();
        match cli.command {
            Commands::Harvest {
                trading_days,
                max_horizon,
                delay_ms,
                provider,
                ..
            } => {
                assert_eq!(trading_days, 10);
                assert_eq!(max_horizon, 9);
                assert_eq!(delay_ms, 100);
                let settings = provider.settings();
                assert_eq!(settings.kind, ProviderKind::Yahoo);
                assert!(settings.include_adjusted_close);
            }
            _ => panic!("expected harvest"),
        }
    }

    #[test]
    fn inspect_accepts_csv_provider() {
        let cli = Cli::try_parse_from([
            "ipolab",
            "-v",
            "inspect",
            "--symbol",
            "rddt",
            "--ipo-date",
            "2024-03-21",
            "--provider",
            "csv",
            "--data-dir",
            "prices",
            "--no-adjusted",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Inspect { provider, .. } => {
                let settings = provider.settings();
                assert_eq!(settings.kind, ProviderKind::Csv);
                assert_eq!(settings.dir, Some(PathBuf::from("prices")));
                assert!(!settings.include_adjusted_close);
            }
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn anchor_dates_parse_like_cohort_files() {
        assert_eq!(
            parse_anchor_date("03/21/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 21)
        );
    }

    #[test]
    fn rust_log_takes_precedence_over_verbosity() {
        assert_eq!(log_filter(false, Some("debug")).to_string(), "debug");
        assert_eq!(log_filter(true, None).to_string(), "debug");
        assert_eq!(log_filter(false, None).to_string(), "info");
        assert_eq!(log_filter(true, Some("  ")).to_string(), "debug");
    }
}
