//! Chart Formatter: analysis tables to chart-ready wide tables.
//!
//! The number formatters are display conventions shared with the chart
//! templates; their output must not drift. Rounding is half away from zero.

use std::collections::HashMap;

use polars::prelude::*;

use crate::error::TableResult;
use crate::logs::log_warning;
use crate::models::{columns, Indicator};
use crate::table::ops::{concat_rows, drop_if_present, rename, select, with_constant};
use crate::table::reshape::{melt, pivot};
use crate::table::{int_values, number_values, text_values, with_number_column, with_text_column};

pub const MAX_VALUE: &str = "max_value";
pub const VALUE_ANNOTATE: &str = "value_annotate";
pub const VARIABLE: &str = "variable";
pub const INDICATOR: &str = "indicator";

/// Round to `decimals` places, halves away from zero, without `-0`.
fn round_half_away(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, round_half_away(value, decimals))
}

/// `"$N billion"` with `decimals` places; whole billions drop the decimals
/// when `decimals > 0`.
///
/// `format_to_billion(2.5e9, 0) == "$3 billion"`,
/// `format_to_billion(2.5e9, 1) == "$2.5 billion"`,
/// `format_to_billion(1e9, 1) == "$1 billion"`.
pub fn format_to_billion(value: f64, decimals: usize) -> String {
    let billions = value / 1e9;
    if decimals > 0 && billions.fract() == 0.0 {
        return format!("${} billion", fixed(billions, 0));
    }
    format!("${} billion", fixed(billions, decimals))
}

/// Magnitude-dependent label for a single value.
///
/// From 0.01 billion up: billions with 1 decimal (2 below one billion).
/// Below that: millions with 1 decimal under ten million, else none.
/// Missing values have no label.
pub fn annotate_number(value: Option<f64>) -> Option<String> {
    let value = value.filter(|v| v.is_finite())?;
    let billions = value / 1e9;

    if billions >= 0.01 {
        if billions < 1.0 {
            Some(format!("${} billion", fixed(billions, 2)))
        } else {
            Some(format!("${} billion", fixed(billions, 1)))
        }
    } else {
        let millions = value / 1e6;
        if millions < 10.0 {
            Some(format!("${} million", fixed(millions, 1)))
        } else {
            Some(format!("${} million", fixed(millions, 0)))
        }
    }
}

/// Whole number with comma thousands separators: `1234567.8 -> "1,234,568"`.
pub fn format_number_as_text(value: f64) -> String {
    let rounded = round_half_away(value, 0);
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Add `max_value`: each entity's `value_column` at its latest year.
///
/// The latest year is taken among the entity's rows that have a value, so
/// an entity whose newest row lacks the metric is labelled from an earlier
/// year. When an entity has several rows in that year the first one wins
/// and a warning is logged. Entities with no value anywhere get no label.
pub fn add_max(df: &DataFrame, entity_column: &str, value_column: &str) -> TableResult<DataFrame> {
    let entities = text_values(df, entity_column)?;
    let years = int_values(df, columns::YEAR)?;
    let values = number_values(df, value_column)?;

    // entity -> (latest year, value, rows in that year)
    let mut latest: HashMap<&str, (i64, f64, usize)> = HashMap::new();
    for ((entity, year), value) in entities.iter().zip(&years).zip(&values) {
        let (Some(entity), Some(year), Some(value)) = (entity, year, value) else {
            continue;
        };
        latest
            .entry(entity.as_str())
            .and_modify(|slot| {
                if *year > slot.0 {
                    *slot = (*year, *value, 1);
                } else if *year == slot.0 {
                    slot.2 += 1;
                }
            })
            .or_insert((*year, *value, 1));
    }

    let mut duplicated: Vec<String> = latest
        .iter()
        .filter(|(_, (_, _, n))| *n > 1)
        .map(|(entity, (year, _, _))| format!("{entity} ({year})"))
        .collect();
    if !duplicated.is_empty() {
        duplicated.sort();
        log_warning(format!(
            "Several latest-year rows for {}; using the first",
            duplicated.join(", ")
        ));
    }

    let max_values = entities
        .iter()
        .map(|e| e.as_deref().and_then(|e| latest.get(e)).map(|(_, v, _)| *v))
        .collect();
    with_number_column(df, MAX_VALUE, max_values)
}

/// `column * -1` where `negated` holds, the column unchanged elsewhere.
fn negate_where(df: &DataFrame, column: &str, negated: Expr) -> TableResult<DataFrame> {
    let value = col(column);
    let signed = when(negated)
        .then(value.clone() * lit(-1.0))
        .otherwise(value);
    with_constant(df, column, signed)
}

/// Chart 1: one row per (year, variable), one column per latest-value label.
///
/// Subsidies are negated so they draw below the axis.
pub fn create_chart_1(chart1: &DataFrame, decimals: usize) -> TableResult<DataFrame> {
    let labels: Vec<(&str, &str)> = Indicator::ALL
        .iter()
        .map(|i| (i.column(), i.label()))
        .collect();

    let wide = rename(&drop_if_present(chart1, &[columns::CURRENCY])?, &labels)?;
    let long = melt(&wide, &[columns::YEAR], VARIABLE, columns::VALUE)?;

    let with_max = add_max(&long, VARIABLE, columns::VALUE)?;
    let max_labels = number_values(&with_max, MAX_VALUE)?
        .into_iter()
        .map(|v| v.map(|n| format_to_billion(n, decimals)))
        .collect();
    let labelled = with_text_column(&with_max, MAX_VALUE, max_labels)?;

    let negated = Indicator::ALL
        .iter()
        .filter(|i| i.is_negated())
        .map(|i| col(VARIABLE).eq(lit(i.label())))
        .reduce(|a, b| a.or(b))
        .unwrap_or(lit(false));
    let signed = negate_where(&labelled, columns::VALUE, negated)?;

    pivot(&signed, &[columns::YEAR, VARIABLE], MAX_VALUE, columns::VALUE)
}

/// One indicator block of chart 2.
fn chart_2_block(chart2: &DataFrame, indicator: Indicator) -> TableResult<DataFrame> {
    let metric = indicator.column();
    let selected = select(chart2, &[columns::YEAR, columns::COUNTRY_NAME, metric])?;
    let with_max = add_max(&selected, columns::COUNTRY_NAME, metric)?;

    let annotate = |name: &str| -> TableResult<Vec<Option<String>>> {
        Ok(number_values(&with_max, name)?
            .into_iter()
            .map(annotate_number)
            .collect())
    };
    let max_labels = annotate(MAX_VALUE)?;
    let value_labels = annotate(metric)?;
    let annotated = with_text_column(&with_max, MAX_VALUE, max_labels)?;
    let annotated = with_text_column(&annotated, VALUE_ANNOTATE, value_labels)?;

    let signed = negate_where(&annotated, metric, lit(indicator.is_negated()))?;

    let wide = pivot(&signed, &[columns::COUNTRY_NAME, columns::YEAR, VALUE_ANNOTATE], MAX_VALUE, metric)?;
    with_constant(&wide, INDICATOR, lit(indicator.label()))
}

/// Chart 2: per-country blocks for subsidies then climate finance.
///
/// Each block is keyed by (country_name, year, value_annotate), has one
/// column per latest-value label and an `indicator` column.
pub fn create_chart_2(chart2: &DataFrame) -> TableResult<DataFrame> {
    let ffs = chart_2_block(chart2, Indicator::FossilFuelSubsidies)?;
    let cf = chart_2_block(chart2, Indicator::ClimateFinanceCommitments)?;
    concat_rows(&[ffs, cf])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column_names;

    #[test]
    fn test_format_to_billion() {
        assert_eq!(format_to_billion(2_500_000_000.0, 0), "$3 billion");
        assert_eq!(format_to_billion(2_500_000_000.0, 1), "$2.5 billion");
        assert_eq!(format_to_billion(1_000_000_000.0, 0), "$1 billion");
        assert_eq!(format_to_billion(1_000_000_000.0, 2), "$1 billion");
        assert_eq!(format_to_billion(1_234_000_000.0, 2), "$1.23 billion");
        assert_eq!(format_to_billion(-3_500_000_000.0, 0), "$-4 billion");
    }

    #[test]
    fn test_annotate_number() {
        assert_eq!(annotate_number(Some(2.34e9)).as_deref(), Some("$2.3 billion"));
        assert_eq!(annotate_number(Some(1e9)).as_deref(), Some("$1.0 billion"));
        assert_eq!(annotate_number(Some(0.5e9)).as_deref(), Some("$0.50 billion"));
        assert_eq!(annotate_number(Some(0.01e9)).as_deref(), Some("$0.01 billion"));
        assert_eq!(annotate_number(Some(9.5e6)).as_deref(), Some("$9.5 million"));
        assert_eq!(annotate_number(Some(25.5e6)).as_deref(), Some("$26 million"));
        assert_eq!(annotate_number(None), None);
        assert_eq!(annotate_number(Some(f64::NAN)), None);
    }

    #[test]
    fn test_format_number_as_text() {
        assert_eq!(format_number_as_text(1_234_567.8), "1,234,568");
        assert_eq!(format_number_as_text(999.4), "999");
        assert_eq!(format_number_as_text(1000.0), "1,000");
        assert_eq!(format_number_as_text(-2_500.5), "-2,501");
        assert_eq!(format_number_as_text(0.2), "0");
    }

    #[test]
    fn test_negative_annotations() {
        assert_eq!(annotate_number(Some(-2.5e9)).as_deref(), Some("$-2500.0 million"));
    }

    #[test]
    fn test_add_max_uses_latest_present_year() {
        let df = df!(
            "country_name" => ["France", "France", "France", "Italy", "Italy"],
            "year" => [2019i64, 2021, 2022, 2020, 2020],
            "value" => [Some(1.0), Some(3.0), None, Some(7.0), Some(8.0)],
        )
        .unwrap();

        let out = add_max(&df, "country_name", "value").unwrap();
        assert_eq!(column_names(&out).last().map(String::as_str), Some("max_value"));
        let max = number_values(&out, "max_value").unwrap();
        assert_eq!(max[0], Some(3.0));
        // 2022 has no value, so France is labelled from 2021
        assert_eq!(max[2], Some(3.0));
        // duplicate latest-year rows: first one wins
        assert_eq!(max[4], Some(7.0));
    }

    #[test]
    fn test_add_max_entity_without_values() {
        let df = df!(
            "country_name" => ["Chile"],
            "year" => [2020i64],
            "value" => [None::<f64>],
        )
        .unwrap();
        let out = add_max(&df, "country_name", "value").unwrap();
        assert_eq!(number_values(&out, "max_value").unwrap(), vec![None]);
    }

    fn chart_1_input() -> DataFrame {
        df!(
            "year" => [2020i64, 2021],
            "climate_finance_commitments" => [2.0e9, 2.5e9],
            "fossil_fuel_subsidies" => [5.0e9, 6.0e9],
            "currency" => ["US$ current"; 2],
        )
        .unwrap()
    }

    #[test]
    fn test_create_chart_1() {
        let out = create_chart_1(&chart_1_input(), 0).unwrap();

        assert_eq!(column_names(&out), vec!["year", "variable", "$3 billion", "$6 billion"]);
        assert_eq!(out.height(), 4);
        assert_eq!(
            text_values(&out, "variable").unwrap()[..2],
            [
                Some("climate finance commitments".to_string()),
                Some("fossil fuel subsidies".to_string())
            ]
        );
        assert_eq!(
            number_values(&out, "$3 billion").unwrap(),
            vec![Some(2.0e9), None, Some(2.5e9), None]
        );
        assert_eq!(
            number_values(&out, "$6 billion").unwrap(),
            vec![None, Some(-5.0e9), None, Some(-6.0e9)]
        );
    }

    fn chart_2_input() -> DataFrame {
        df!(
            "year" => [2020i64, 2021],
            "iso3_code" => ["FRA", "FRA"],
            "climate_finance_commitments" => [1.5e9, 2.0e9],
            "fossil_fuel_subsidies" => [4.0e6, 5.0e6],
            "currency" => ["US$ current"; 2],
            "country_name" => ["France", "France"],
        )
        .unwrap()
    }

    #[test]
    fn test_create_chart_2() {
        let out = create_chart_2(&chart_2_input()).unwrap();
        assert_eq!(
            column_names(&out),
            vec!["country_name", "year", "value_annotate", "$5.0 million", "indicator", "$2.0 billion"]
        );
        assert_eq!(out.height(), 4);

        let indicator = text_values(&out, "indicator").unwrap();
        let annotate = text_values(&out, "value_annotate").unwrap();
        assert_eq!(indicator[0].as_deref(), Some("fossil fuel subsidies"));
        assert_eq!(annotate[0].as_deref(), Some("$4.0 million"));
        assert_eq!(number_values(&out, "$5.0 million").unwrap()[0], Some(-4.0e6));

        assert_eq!(indicator[3].as_deref(), Some("climate finance commitments"));
        assert_eq!(annotate[3].as_deref(), Some("$2.0 billion"));
        assert_eq!(number_values(&out, "$2.0 billion").unwrap()[3], Some(2.0e9));
        assert_eq!(number_values(&out, "$5.0 million").unwrap()[3], None);
    }

    #[test]
    fn test_create_chart_2_one_sided_row() {
        let chart2 = df!(
            "year" => [2020i64, 2021],
            "iso3_code" => ["FRA", "FRA"],
            "climate_finance_commitments" => [Some(1.5e9), Some(2.0e9)],
            "fossil_fuel_subsidies" => [None, Some(5.0e6)],
            "currency" => ["US$ current"; 2],
            "country_name" => ["France", "France"],
        )
        .unwrap();

        let out = create_chart_2(&chart2).unwrap();
        assert_eq!(out.height(), 4);

        let years = int_values(&out, "year").unwrap();
        let annotate = text_values(&out, "value_annotate").unwrap();
        let ffs = number_values(&out, "$5.0 million").unwrap();
        // the subsidies row without a value keeps its place with no annotation
        assert_eq!(years[0], Some(2020));
        assert_eq!(annotate[0], None);
        assert_eq!(ffs[0], None);
        assert_eq!(ffs[1], Some(-5.0e6));
        assert_eq!(annotate[2].as_deref(), Some("$1.5 billion"));
    }
}
