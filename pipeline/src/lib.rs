//! # Climate finance vs fossil fuel subsidies
//!
//! Builds chart-ready tables comparing climate finance commitments with
//! fossil fuel subsidies, from two raw extracts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Raw CSV/JSON│────▶│ format-raw  │────▶│  analysis   │────▶│   charts    │
//! │  /Parquet   │     │ (canonical) │     │ (outer join)│     │ (pivoted)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Every stage reads its inputs from disk and overwrites its outputs, so a
//! stage can be re-run alone once the upstream files exist.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use climate_subsidies::{run_all, PipelineConfig};
//!
//! let config = PipelineConfig::from_env()?;
//! for report in run_all(&config)? {
//!     println!("{}: {} file(s)", report.stage, report.outputs.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Run log
//! - [`config`] - Run configuration
//! - [`models`] - Domain vocabulary and column names
//! - [`table`] - Frame helpers over polars
//! - [`parser`] - Reading and writing files
//! - [`resolve`] - Entity Resolver and country catalog
//! - [`validation`] - Canonical table checks
//! - [`transform`] - Aggregates, formatting, analysis, charts and stage runners

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Configuration
pub mod config;

// Tables and files
pub mod parser;
pub mod table;

// Entities
pub mod resolve;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, PipelineError, PipelineResult, ResolveError, ResolveResult,
    TableError, TableResult,
};

// =============================================================================
// Re-exports - Configuration and models
// =============================================================================

pub use config::PipelineConfig;
pub use models::{Indicator, SourceGranularity};

// =============================================================================
// Re-exports - Tables and parsing
// =============================================================================

pub use parser::{read_table, write_csv, CsvError, ParseResult};
pub use polars::prelude::DataFrame;
pub use table::{column_names, int_values, number_values, text_values, AggFunc};

// =============================================================================
// Re-exports - Entity resolution
// =============================================================================

pub use resolve::{g20_donor_codes, CodeScheme, CodeService, CountryCatalog, EntityResolver};

// =============================================================================
// Re-exports - Transformations
// =============================================================================

pub use transform::{
    add_aggregates, annotate_number, chart_1_data, chart_2_data, create_chart_1, create_chart_2,
    format_cf_data, format_ffs_data, format_to_billion, high_income_agg, run_all, run_analysis,
    run_charts, run_format_raw, StageReport,
};
