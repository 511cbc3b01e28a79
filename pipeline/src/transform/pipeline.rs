//! Stage runners.
//!
//! Each stage reads its inputs from disk, runs the pure transforms and
//! overwrites its outputs. Stages only communicate through files, so any of
//! them can be re-run alone once its upstream files exist.
//!
//! | stage        | reads                                  | writes |
//! |--------------|----------------------------------------|--------|
//! | `format-raw` | raw subsidies, raw climate finance     | canonical tables, donors report |
//! | `analysis`   | canonical tables                       | `chart_1_data.csv`, `chart_2_data.csv` |
//! | `charts`     | analysis tables                        | `chart_1_base.csv`, `chart_2_base.csv` |
//!
//! # Example
//!
//! ```rust,ignore
//! use climate_subsidies::config::PipelineConfig;
//! use climate_subsidies::transform::pipeline::run_all;
//!
//! let reports = run_all(&PipelineConfig::default())?;
//! for report in &reports {
//!     println!("{}: {} file(s)", report.stage, report.outputs.len());
//! }
//! ```

use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::Serialize;

use super::analysis::{chart_1_data, chart_2_data};
use super::charts::{create_chart_1, create_chart_2};
use super::cross_cutting::{available_donors_and_years, clean_provider_perspective, PROVIDER};
use super::format_raw::{format_cf_data, format_ffs_data, select_recent_years};
use crate::config::{files, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning, LogLevel, RUN_LOG};
use crate::models::columns;
use crate::parser::{read_table, write_csv};
use crate::resolve::{CountryCatalog, EntityResolver};
use crate::table::has_column;
use crate::validation::validate_canonical;

/// A file written by a stage
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput {
    pub path: PathBuf,
    pub rows: usize,
}

/// Summary of one stage run
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Stage name as used on the command line
    pub stage: &'static str,
    pub outputs: Vec<StageOutput>,
    /// Warnings logged while the stage ran
    pub warnings: usize,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            outputs: Vec::new(),
            warnings: 0,
        }
    }
}

/// Fail with [`PipelineError::MissingInput`] unless `path` exists.
fn require(path: &Path) -> PipelineResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput(path.to_path_buf()))
    }
}

fn read_input(path: &Path) -> PipelineResult<DataFrame> {
    require(path)?;
    let df = read_table(path)?;
    log_success(format!("Read {} rows from {}", df.height(), path.display()));
    Ok(df)
}

fn write_output(df: &DataFrame, path: PathBuf, report: &mut StageReport) -> PipelineResult<()> {
    write_csv(df, &path)?;
    log_success(format!("Wrote {} rows to {}", df.height(), path.display()));
    report.outputs.push(StageOutput {
        path,
        rows: df.height(),
    });
    Ok(())
}

/// Log canonical-table violations as warnings.
fn check_canonical(df: &DataFrame, entity_column: &str) {
    let mut key = vec![entity_column, columns::YEAR];
    key.extend(columns::CATEGORIES.iter().copied().filter(|c| has_column(df, c)));

    if let Err(errors) = validate_canonical(df, &key) {
        log_warning(format!("{} canonical check(s) failed", errors.len()));
        for e in errors.iter().take(5) {
            log_info_indent(e.clone(), 1);
        }
    }
}

fn finish(mut report: StageReport, warnings_before: usize) -> StageReport {
    report.warnings = RUN_LOG.count(LogLevel::Warning).saturating_sub(warnings_before);
    report
}

/// Raw Formatter stage: raw extracts to the canonical tables.
pub fn run_format_raw(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let warnings_before = RUN_LOG.count(LogLevel::Warning);
    let mut report = StageReport::new("format-raw");
    let paths = &config.paths;

    log_info("Formatting raw data...");
    let raw_ffs = read_input(&paths.raw_subsidies())?;
    let raw_cf = read_input(&paths.raw_climate_finance())?;

    let catalog = CountryCatalog::embedded()?;
    let mut resolver =
        EntityResolver::new(catalog).with_income_overrides(config.entities.income_overrides.clone());

    let ffs = format_ffs_data(&raw_ffs, config, &mut resolver)?;
    check_canonical(&ffs, columns::COUNTRY_NAME);
    write_output(&ffs, paths.output_file(files::SUBSIDIES), &mut report)?;

    let cf = format_cf_data(&raw_cf, config, &mut resolver)?;
    check_canonical(&cf, columns::PROVIDER_NAME);
    write_output(&cf, paths.output_file(files::CLIMATE_FINANCE), &mut report)?;

    let recent = select_recent_years(&raw_cf, config.climate_finance.start_year)?;
    let recent = if config.climate_finance.dedup_cross_cutting {
        clean_provider_perspective(&recent)?
    } else {
        recent
    };
    let donors = available_donors_and_years(&recent, PROVIDER)?;
    write_output(&donors, paths.output_file(files::DONORS_AND_YEARS), &mut report)?;

    log_info(format!("{} entity lookup(s)", resolver.lookups()));
    log_success("Data formatting complete.");
    Ok(finish(report, warnings_before))
}

/// Analysis stage: canonical tables to the two analysis tables.
pub fn run_analysis(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let warnings_before = RUN_LOG.count(LogLevel::Warning);
    let mut report = StageReport::new("analysis");
    let paths = &config.paths;

    log_info("Running analysis...");
    let climate = read_input(&paths.output_file(files::CLIMATE_FINANCE))?;
    let subsidies = read_input(&paths.output_file(files::SUBSIDIES))?;

    let chart1 = chart_1_data(&climate, &subsidies, &config.labels)?;
    log_success("Chart 1 data processed");
    write_output(&chart1, paths.output_file(files::CHART_1_DATA), &mut report)?;

    let catalog = CountryCatalog::embedded()?;
    let mut resolver = EntityResolver::new(catalog);
    let chart2 = chart_2_data(
        &climate,
        &subsidies,
        &config.small_multiple_countries,
        &config.labels,
        &mut resolver,
    )?;
    log_success("Chart 2 data processed");
    write_output(&chart2, paths.output_file(files::CHART_2_DATA), &mut report)?;

    Ok(finish(report, warnings_before))
}

/// Chart stage: analysis tables to the chart-ready tables.
pub fn run_charts(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let warnings_before = RUN_LOG.count(LogLevel::Warning);
    let mut report = StageReport::new("charts");
    let paths = &config.paths;

    log_info("Formatting charts...");
    let chart1 = read_input(&paths.output_file(files::CHART_1_DATA))?;
    let chart2 = read_input(&paths.output_file(files::CHART_2_DATA))?;

    let base1 = create_chart_1(&chart1, config.charts.decimals)?;
    write_output(&base1, paths.output_file(files::CHART_1_BASE), &mut report)?;

    let base2 = create_chart_2(&chart2)?;
    write_output(&base2, paths.output_file(files::CHART_2_BASE), &mut report)?;

    Ok(finish(report, warnings_before))
}

/// Every stage, in dependency order.
pub fn run_all(config: &PipelineConfig) -> PipelineResult<Vec<StageReport>> {
    Ok(vec![
        run_format_raw(config)?,
        run_analysis(config)?,
        run_charts(config)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_raw_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.raw_data = dir.path().join("raw");
        config.paths.output = dir.path().join("out");

        let err = run_format_raw(&config).unwrap_err();
        match err {
            PipelineError::MissingInput(path) => {
                assert!(path.ends_with("fossil_fuel_subsidies.csv"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!config.paths.output.exists());
    }

    #[test]
    fn test_charts_need_analysis_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.output = dir.path().to_path_buf();

        let err = run_charts(&config).unwrap_err();
        assert!(err.to_string().contains("chart_1_data.csv"));
    }
}
