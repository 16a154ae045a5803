//! Study configuration (TOML).
//!
//! ```toml
//! [harvest]
//! trading_days = 10
//! min_delay_ms = 100
//! window = "fixed"      # or "scaled"
//!
//! [matrix]
//! max_horizon = 9
//!
//! [provider]
//! kind = "yahoo"        # or "csv" / "synthetic"
//! timeout_secs = 30
//! include_adjusted_close = true
//! # dir = "prices/"     # required for kind = "csv"
//!
//! [[cohorts]]
//! label = "2021"
//! path = "cohorts/ipos_2021.csv"
//! ```

use ipolab_core::data::{
    CircuitBreaker, CsvDirProvider, DataError, PriceProvider, SyntheticProvider, YahooConfig,
    YahooProvider,
};
use ipolab_core::RetrievalWindow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to build provider: {0}")]
    Provider(#[from] DataError),
}

/// How the fetcher sizes its calendar window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Always `anchor - 5 .. anchor + 85` calendar days.
    #[default]
    Fixed,
    /// Widen the upper pad so the window covers `trading_days`.
    Scaled,
}

impl WindowPolicy {
    pub fn window_for(self, trading_days: usize) -> RetrievalWindow {
        match self {
            WindowPolicy::Fixed => RetrievalWindow::default(),
            WindowPolicy::Scaled => RetrievalWindow::for_trading_days(trading_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub trading_days: usize,
    pub min_delay_ms: u64,
    pub window: WindowPolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            trading_days: 10,
            min_delay_ms: 100,
            window: WindowPolicy::Fixed,
        }
    }
}

impl HarvestSettings {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn retrieval_window(&self) -> RetrievalWindow {
        self.window.window_for(self.trading_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixSettings {
    pub max_horizon: usize,
}

impl Default for MatrixSettings {
    fn default() -> Self {
        Self { max_horizon: 9 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub timeout_secs: u64,
    pub include_adjusted_close: bool,
    pub dir: Option<PathBuf>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Yahoo,
            timeout_secs: 30,
            include_adjusted_close: true,
            dir: None,
        }
    }
}

impl ProviderSettings {
    /// Construct the configured upstream.
    pub fn build(&self) -> Result<Box<dyn PriceProvider>, ConfigError> {
        match self.kind {
            ProviderKind::Yahoo => {
                let config = YahooConfig {
                    timeout: Duration::from_secs(self.timeout_secs),
                    include_adjusted_close: self.include_adjusted_close,
                    ..YahooConfig::default()
                };
                let breaker = Arc::new(CircuitBreaker::default_provider());
                Ok(Box::new(YahooProvider::new(config, breaker)?))
            }
            ProviderKind::Csv => {
                let dir = self.dir.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("provider.dir is required for kind = \"csv\"".into())
                })?;
                Ok(Box::new(CsvDirProvider::new(dir)))
            }
            ProviderKind::Synthetic => {
                let provider = SyntheticProvider::new();
                if self.include_adjusted_close {
                    Ok(Box::new(provider))
                } else {
                    Ok(Box::new(provider.without_adjusted_close()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSource {
    pub label: String,
    pub path: PathBuf,
}

/// A full study: harvest settings, matrix settings, provider, and cohort files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default)]
    pub harvest: HarvestSettings,
    #[serde(default)]
    pub matrix: MatrixSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub cohorts: Vec<CohortSource>,
}

impl StudyConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: StudyConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file. Relative cohort and provider paths
    /// resolve against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for cohort in &mut self.cohorts {
            if cohort.path.is_relative() {
                cohort.path = base.join(&cohort.path);
            }
        }
        if let Some(dir) = self.provider.dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.harvest.trading_days == 0 {
            return Err(ConfigError::Invalid("harvest.trading_days must be > 0".into()));
        }
        if self.matrix.max_horizon == 0 {
            return Err(ConfigError::Invalid("matrix.max_horizon must be > 0".into()));
        }
        if self.provider.kind == ProviderKind::Yahoo && self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be > 0".into()));
        }
        if self.provider.kind == ProviderKind::Csv && self.provider.dir.is_none() {
            return Err(ConfigError::Invalid(
                "provider.dir is required for kind = \"csv\"".into(),
            ));
        }
        if let Some(dup) = first_duplicate_label(&self.cohorts) {
            return Err(ConfigError::Invalid(format!("duplicate cohort label '{dup}'")));
        }

        if self.matrix.max_horizon >= self.harvest.trading_days {
            tracing::warn!(
                max_horizon = self.matrix.max_horizon,
                trading_days = self.harvest.trading_days,
                "max_horizon reaches past the harvested series; trailing columns will be empty"
            );
        }
        let safe = self.harvest.retrieval_window().safe_trading_days();
        if self.harvest.trading_days > safe {
            tracing::warn!(
                trading_days = self.harvest.trading_days,
                safe,
                "trading_days exceeds the fixed window's capacity; consider window = \"scaled\""
            );
        }
        Ok(())
    }
}

fn first_duplicate_label(cohorts: &[CohortSource]) -> Option<&str> {
    cohorts.iter().enumerate().find_map(|(i, c)| {
        cohorts[..i]
            .iter()
            .any(|prev| prev.label == c.label)
            .then_some(c.label.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[harvest]
trading_days = 60
min_delay_ms = 250
window = "scaled"

[matrix]
max_horizon = 59

[provider]
kind = "csv"
dir = "prices"

[[cohorts]]
label = "2021"
path = "ipos_2021.csv"

[[cohorts]]
label = "2022"
path = "/abs/ipos_2022.csv"
"#;

    #[test]
    fn parses_full_config() {
        let config = StudyConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.harvest.trading_days, 60);
        assert_eq!(config.harvest.min_delay(), Duration::from_millis(250));
        assert_eq!(config.harvest.window, WindowPolicy::Scaled);
        assert_eq!(config.matrix.max_horizon, 59);
        assert_eq!(config.provider.kind, ProviderKind::Csv);
        assert_eq!(config.cohorts.len(), 2);
        assert!(config.harvest.retrieval_window().safe_trading_days() >= 60);
    }

    #[test]
    fn defaults_match_the_reference_study() {
        let config = StudyConfig::from_toml_str("").unwrap();
        assert_eq!(config.harvest.trading_days, 10);
        assert_eq!(config.harvest.min_delay_ms, 100);
        assert_eq!(config.matrix.max_horizon, 9);
        assert_eq!(config.provider.kind, ProviderKind::Yahoo);
        assert_eq!(config.provider.timeout_secs, 30);
        assert!(config.provider.include_adjusted_close);
        assert_eq!(config.harvest.retrieval_window(), RetrievalWindow::default());
    }

    #[test]
    fn rejects_zero_values() {
        let err = StudyConfig::from_toml_str("[harvest]\ntrading_days = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = StudyConfig::from_toml_str("[matrix]\nmax_horizon = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn csv_provider_requires_dir() {
        let err = StudyConfig::from_toml_str("[provider]\nkind = \"csv\"\n").unwrap_err();
        assert!(err.to_string().contains("provider.dir"));
    }

    #[test]
    fn rejects_duplicate_cohort_labels() {
        let toml = r#"
[[cohorts]]
label = "x"
path = "a.csv"

[[cohorts]]
label = "x"
path = "b.csv"
"#;
        let err = StudyConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate cohort label 'x'"));
    }

    #[test]
    fn unknown_provider_kind_is_a_parse_error() {
        let err = StudyConfig::from_toml_str("[provider]\nkind = \"bloomberg\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = StudyConfig::load(&path).unwrap();
        assert_eq!(config.cohorts[0].path, dir.path().join("ipos_2021.csv"));
        assert_eq!(config.cohorts[1].path, PathBuf::from("/abs/ipos_2022.csv"));
        assert_eq!(config.provider.dir, Some(dir.path().join("prices")));
    }

    #[test]
    fn builds_each_provider_kind() {
        let synthetic = ProviderSettings {
            kind: ProviderKind::Synthetic,
            ..ProviderSettings::default()
        };
        assert_eq!(synthetic.build().unwrap().name(), "synthetic");

        let csv = ProviderSettings {
            kind: ProviderKind::Csv,
            dir: Some(PathBuf::from("/tmp")),
            ..ProviderSettings::default()
        };
        assert!(csv.build().is_ok());
    }
}
