//! Pipeline configuration.
//!
//! One [`PipelineConfig`] describes a run: where files live, which
//! climate-finance breakdown to keep, whether cross-cutting overlaps are
//! removed, how chart labels are rounded and which countries make up the
//! small-multiple roster. Everything has a default, so an empty JSON object
//! is a valid config.
//!
//! Loading order (see [`PipelineConfig::from_env`]):
//! 1. defaults
//! 2. the JSON file named by `CLIMATE_SUBSIDIES_CONFIG`, if set
//! 3. `CLIMATE_SUBSIDIES_RAW_DATA` / `CLIMATE_SUBSIDIES_OUTPUT` directory overrides

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{SourceGranularity, DEFAULT_SMALL_MULTIPLE_COUNTRIES};

pub const CONFIG_ENV: &str = "CLIMATE_SUBSIDIES_CONFIG";
pub const RAW_DATA_ENV: &str = "CLIMATE_SUBSIDIES_RAW_DATA";
pub const OUTPUT_ENV: &str = "CLIMATE_SUBSIDIES_OUTPUT";

/// Output file names.
pub mod files {
    pub const SUBSIDIES: &str = "fossil_fuel_subsidies.csv";
    pub const CLIMATE_FINANCE: &str = "climate_finance_commitments.csv";
    pub const DONORS_AND_YEARS: &str = "provider_perspective_available_donors_and_years.csv";
    pub const CHART_1_DATA: &str = "chart_1_data.csv";
    pub const CHART_2_DATA: &str = "chart_2_data.csv";
    pub const CHART_1_BASE: &str = "chart_1_base.csv";
    pub const CHART_2_BASE: &str = "chart_2_base.csv";
}

/// Full configuration for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub climate_finance: ClimateFinanceOptions,
    pub subsidies: SubsidyOptions,
    pub charts: ChartOptions,
    /// ISO3 codes shown in the small-multiple chart
    pub small_multiple_countries: Vec<String>,
    pub entities: EntityOptions,
    pub labels: Labels,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            climate_finance: ClimateFinanceOptions::default(),
            subsidies: SubsidyOptions::default(),
            charts: ChartOptions::default(),
            small_multiple_countries: DEFAULT_SMALL_MULTIPLE_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            entities: EntityOptions::default(),
            labels: Labels::default(),
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the raw extracts
    pub raw_data: PathBuf,
    /// Directory receiving every output table
    pub output: PathBuf,
    /// Raw subsidies extract, relative to `raw_data`
    pub subsidies_file: String,
    /// Raw climate-finance extract (CSV, JSON records or parquet), relative to `raw_data`
    pub climate_finance_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("raw_data"),
            output: PathBuf::from("output"),
            subsidies_file: "fossil_fuel_subsidies.csv".to_string(),
            climate_finance_file: "climate_finance_provider_perspective_data.csv".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn raw_subsidies(&self) -> PathBuf {
        self.raw_data.join(&self.subsidies_file)
    }

    pub fn raw_climate_finance(&self) -> PathBuf {
        self.raw_data.join(&self.climate_finance_file)
    }

    /// Path of a named output table
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output.join(name)
    }
}

/// Climate-finance formatting options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateFinanceOptions {
    /// Earlier years lack provider-level detail and are dropped
    pub start_year: i64,
    pub source_granularity: SourceGranularity,
    /// Subtract Cross-cutting from Adaptation and Mitigation before summing
    pub dedup_cross_cutting: bool,
}

impl Default for ClimateFinanceOptions {
    fn default() -> Self {
        Self {
            start_year: 2010,
            source_granularity: SourceGranularity::default(),
            dedup_cross_cutting: false,
        }
    }
}

/// Subsidies formatting options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsidyOptions {
    /// Keep Mechanism / Beneficiary / Fuel type breakdowns when the extract has them
    pub keep_categories: bool,
}

/// Chart formatting options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    /// Decimals of the chart 1 "$N billion" column labels
    pub decimals: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self { decimals: 0 }
    }
}

/// Entity resolution options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityOptions {
    /// Placeholder for names that do not resolve; `None` leaves the cell missing
    pub not_found: Option<String>,
    /// Name (or code) -> ISO3 overrides, applied after automatic resolution
    pub additional_mapping: BTreeMap<String, String>,
    /// ISO3 -> income group overrides
    pub income_overrides: BTreeMap<String, String>,
}

/// Constant labels written into the tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    /// Income group selected by the high-income aggregate
    pub high_income: String,
    /// Currency annotation of the analysis tables
    pub currency: String,
    /// Units annotation of the canonical tables
    pub units: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            high_income: "High income".to_string(),
            currency: "US$ current".to_string(),
            units: "USD current".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a config from JSON text.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the environment (call `dotenvy::dotenv()` first to pick up `.env`).
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };

        if let Ok(dir) = env::var(RAW_DATA_ENV) {
            config.paths.raw_data = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var(OUTPUT_ENV) {
            config.paths.output = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make a run meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(bad) = self
            .small_multiple_countries
            .iter()
            .find(|c| c.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "small_multiple_countries contains an empty entry ('{}')",
                bad
            )));
        }
        if self.charts.decimals > 6 {
            return Err(ConfigError::Invalid(format!(
                "charts.decimals must be at most 6, got {}",
                self.charts.decimals
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
