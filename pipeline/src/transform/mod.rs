//! Table transformations.
//!
//! - [`aggregate`] - "all" rollup rows over category columns
//! - [`cross_cutting`] - provider-perspective cleaning and the donors report
//! - [`format_raw`] - raw extracts to canonical tables
//! - [`analysis`] - canonical tables to the analysis tables
//! - [`charts`] - analysis tables to chart-ready tables
//! - [`pipeline`] - stage runners doing the file I/O

pub mod aggregate;
pub mod analysis;
pub mod charts;
pub mod cross_cutting;
pub mod format_raw;
pub mod pipeline;

pub use aggregate::{add_aggregates, add_aggregates_with, totals_only, AggregateOptions};
pub use analysis::{chart_1_data, chart_2_data, high_income_agg};
pub use charts::{
    add_max, annotate_number, create_chart_1, create_chart_2, format_number_as_text,
    format_to_billion,
};
pub use cross_cutting::{available_donors_and_years, clean_provider_perspective};
pub use format_raw::{format_cf_data, format_ffs_data};
pub use pipeline::{run_all, run_analysis, run_charts, run_format_raw, StageOutput, StageReport};
