//! Raw Formatter: raw extracts to canonical tables.
//!
//! Both paths end with the same columns after the value: `iso3_code`,
//! `units`, `income_level`.

use polars::prelude::*;

use super::aggregate::add_aggregates;
use super::cross_cutting::{clean_provider_perspective, INDICATOR, PROVIDER};
use crate::config::PipelineConfig;
use crate::error::TableResult;
use crate::logs::{log_info, log_info_indent, log_warning};
use crate::models::columns;
use crate::resolve::{CodeScheme, EntityResolver};
use crate::table::ops::{drop_if_present, filter, group_sum, rename, sort_by, with_constant};
use crate::table::{has_column, number_values, text_values, with_number_column, with_text_column};

/// Raw subsidies header -> canonical column.
const SUBSIDY_RENAMES: [(&str, &str); 6] = [
    ("Country", columns::COUNTRY_NAME),
    ("Year", columns::YEAR),
    ("USD, nominal", columns::VALUE),
    ("Mechanism", columns::MECHANISM),
    ("Beneficiary", columns::BENEFICIARY),
    ("Fuel type", columns::FUEL_TYPE),
];

const SUBSIDY_CATEGORIES: [&str; 3] = [columns::MECHANISM, columns::BENEFICIARY, columns::FUEL_TYPE];

/// Parse a raw amount; whitespace inside numeric text ("1 234 567") is ignored.
pub fn parse_amount(value: &str) -> Option<f64> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    compact.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Amounts of a raw value column. Text cells go through [`parse_amount`].
fn parse_amounts(df: &DataFrame, column: &str) -> TableResult<Vec<Option<f64>>> {
    if df.column(column)?.dtype() == &DataType::String {
        Ok(text_values(df, column)?
            .iter()
            .map(|v| v.as_deref().and_then(parse_amount))
            .collect())
    } else {
        number_values(df, column)
    }
}

/// Format the raw fossil fuel subsidies extract.
///
/// Rows whose amount does not parse are dropped with a warning. Duplicate
/// (country, year[, categories]) rows are summed; with
/// `subsidies.keep_categories` the category breakdown is kept and expanded
/// with "all" aggregates. A missing category is a group of its own.
pub fn format_ffs_data(
    raw: &DataFrame,
    config: &PipelineConfig,
    resolver: &mut EntityResolver<'_>,
) -> TableResult<DataFrame> {
    log_info(format!("Formatting fossil fuel subsidies ({} raw rows)", raw.height()));

    let renamed = drop_if_present(&rename(raw, &SUBSIDY_RENAMES)?, &["Source"])?;

    let amounts = parse_amounts(&renamed, columns::VALUE)?;
    let parsed = with_number_column(&renamed, columns::VALUE, amounts)?;
    let valid = filter(&parsed, col(columns::VALUE).is_not_null())?;
    let dropped = parsed.height() - valid.height();
    if dropped > 0 {
        log_warning(format!("Dropped {} row(s) with an unparseable value", dropped));
    }

    let valid = with_constant(&valid, columns::YEAR, col(columns::YEAR).cast(DataType::Int64))?;

    let categories: Vec<&str> = if config.subsidies.keep_categories {
        SUBSIDY_CATEGORIES
            .iter()
            .copied()
            .filter(|c| has_column(&valid, c))
            .collect()
    } else {
        Vec::new()
    };

    let mut keys = vec![columns::COUNTRY_NAME, columns::YEAR];
    keys.extend(categories.iter().copied());
    let mut summed = group_sum(&valid, &keys, columns::VALUE)?;
    if !categories.is_empty() {
        log_info_indent(format!("Adding aggregates over {}", categories.join(", ")), 1);
        summed = add_aggregates(&summed, &categories, &[columns::COUNTRY_NAME, columns::YEAR])?;
    }

    attach_entity_columns(&summed, columns::COUNTRY_NAME, config, resolver)
}

/// Format the raw climate finance (provider perspective) extract.
///
/// Keeps years from `climate_finance.start_year`, optionally removes the
/// cross-cutting overlap, and sums by (year, provider_name) plus the
/// category columns of the configured granularity.
pub fn format_cf_data(
    raw: &DataFrame,
    config: &PipelineConfig,
    resolver: &mut EntityResolver<'_>,
) -> TableResult<DataFrame> {
    let options = &config.climate_finance;
    log_info(format!(
        "Formatting climate finance ({} raw rows, from {})",
        raw.height(),
        options.start_year
    ));

    let recent = select_recent_years(raw, options.start_year)?;
    log_info_indent(format!("{} row(s) from {} on", recent.height(), options.start_year), 1);

    let recent = if options.dedup_cross_cutting {
        log_info_indent("Removing cross-cutting overlaps", 1);
        clean_provider_perspective(&recent)?
    } else {
        recent
    };

    let renamed = rename(
        &recent,
        &[(INDICATOR, columns::MARKER), (PROVIDER, columns::PROVIDER_NAME)],
    )?;

    let categories = options.source_granularity.category_columns();
    let mut keys = vec![columns::YEAR, columns::PROVIDER_NAME];
    keys.extend(categories.iter().copied());

    let mut summed = group_sum(&renamed, &keys, columns::VALUE)?;
    if !categories.is_empty() {
        summed = add_aggregates(&summed, categories, &[columns::YEAR, columns::PROVIDER_NAME])?;
    }

    let formatted = attach_entity_columns(&summed, columns::PROVIDER_NAME, config, resolver)?;
    sort_by(&formatted, &[columns::PROVIDER_NAME, columns::YEAR])
}

/// Rows with a year at or after `start_year`; rows without a year are dropped.
pub fn select_recent_years(df: &DataFrame, start_year: i64) -> TableResult<DataFrame> {
    filter(df, col(columns::YEAR).cast(DataType::Int64).gt_eq(lit(start_year)))
}

/// Add `iso3_code`, `units` and `income_level` from an entity name column.
fn attach_entity_columns(
    df: &DataFrame,
    name_column: &str,
    config: &PipelineConfig,
    resolver: &mut EntityResolver<'_>,
) -> TableResult<DataFrame> {
    let entities = &config.entities;
    let mapping = (!entities.additional_mapping.is_empty()).then_some(&entities.additional_mapping);

    let names = text_values(df, name_column)?;
    let iso3 = resolver.convert_entities(
        names.iter().map(Option::as_deref),
        CodeScheme::Regex,
        CodeScheme::Iso3,
        entities.not_found.as_deref(),
        mapping,
    );

    let with_codes = with_text_column(df, columns::ISO3_CODE, iso3)?;
    let with_units = with_constant(&with_codes, columns::UNITS, lit(config.labels.units.as_str()))?;

    resolver.add_income_level_column(&with_units, columns::ISO3_CODE, CodeScheme::Iso3)
}
