//! Error types for the climate finance / fossil fuel subsidies pipeline.
//!
//! The hierarchy mirrors the stages of a run:
//!
//! - [`TableError`] - in-memory table operations (missing columns, bad pivots)
//! - [`ResolveError`] - entity resolution and the embedded country catalog
//! - [`ConfigError`] - loading and validating [`crate::config::PipelineConfig`]
//! - [`PipelineError`] - top-level stage orchestration (file I/O included)
//!
//! Reading errors with line context live in [`crate::parser::CsvError`].
//! Every lower-level error converts into [`PipelineError`] via `From`,
//! so `?` works across module boundaries.

use std::path::PathBuf;

use polars::error::PolarsError;
use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised by the [`crate::table`] helpers.
#[derive(Debug, Error)]
pub enum TableError {
    /// A referenced column does not exist.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Two rows landed on the same pivot cell.
    #[error("Duplicate pivot entry for index [{index}] and column '{column}'")]
    DuplicatePivotEntry { index: String, column: String },

    /// The dataframe engine rejected an operation (bad cast, shape mismatch, ...).
    #[error("{0}")]
    Polars(#[from] PolarsError),
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors from the entity resolver and its reference catalog.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A catalog name pattern does not compile.
    #[error("Invalid name pattern for {iso3}: {message}")]
    InvalidPattern { iso3: String, message: String },

    /// The embedded catalog could not be read.
    #[error("Country catalog error: {0}")]
    Catalog(String),

    /// A value that must resolve did not.
    #[error("Could not resolve '{value}' to {target}")]
    Unresolved { value: String, target: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading the pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`crate::config::PipelineConfig`].
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Config parsed but holds unusable values.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level stage errors.
///
/// Returned by the stage runners in [`crate::transform::pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading a source file failed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Table operation failed.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Entity resolution failed.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// An upstream artifact has not been produced yet.
    #[error("Missing input file: {} (run the upstream stage first)", .0.display())]
    MissingInput(PathBuf),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<PolarsError> for PipelineError {
    fn from(e: PolarsError) -> Self {
        PipelineError::Table(TableError::Polars(e))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for entity resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let table_err = TableError::MissingColumn("iso3_code".into());
        let pipeline_err: PipelineError = table_err.into();
        assert!(pipeline_err.to_string().contains("iso3_code"));

        let csv_err = CsvError::new(3, "Unterminated quote");
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("Line 3"));
    }

    #[test]
    fn test_missing_input_names_path() {
        let err = PipelineError::MissingInput(PathBuf::from("output/chart_1_data.csv"));
        let msg = err.to_string();
        assert!(msg.contains("chart_1_data.csv"));
        assert!(msg.contains("upstream"));
    }

    #[test]
    fn test_pivot_error_format() {
        let err = TableError::DuplicatePivotEntry {
            index: "2020, fossil fuel subsidies".into(),
            column: "$5 billion".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2020"));
        assert!(msg.contains("$5 billion"));
    }

    #[test]
    fn test_polars_error_lands_in_table_variant() {
        let err: PipelineError = PolarsError::ColumnNotFound("year".into()).into();
        assert!(matches!(err, PipelineError::Table(TableError::Polars(_))));
        assert!(err.to_string().contains("year"));
    }
}
