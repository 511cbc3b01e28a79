//! Provider-perspective climate finance cleaning.
//!
//! Flows marked Cross-cutting count towards both Adaptation and Mitigation.
//! [`clean_provider_perspective`] subtracts them from both so the three
//! indicators can be summed without double counting.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use polars::prelude::*;

use crate::error::TableResult;
use crate::models::columns;
use crate::table::ops::{filter, group_sum, sort_by};
use crate::table::reshape::{melt, pivot};
use crate::table::{column_names, has_column, int_values, text_values, with_text_column};

pub const PROVIDER: &str = "provider";
pub const OECD_PROVIDER_CODE: &str = "oecd_provider_code";
pub const INDICATOR: &str = "indicator";
pub const FLOW_TYPE: &str = "flow_type";

pub const ADAPTATION: &str = "Adaptation";
pub const MITIGATION: &str = "Mitigation";
pub const CROSS_CUTTING: &str = "Cross-cutting";

const SUMMARY_KEYS: [&str; 6] = [
    columns::YEAR,
    PROVIDER,
    OECD_PROVIDER_CODE,
    columns::METHODOLOGY,
    INDICATOR,
    FLOW_TYPE,
];

const WIDE_INDEX: [&str; 5] = [
    columns::YEAR,
    PROVIDER,
    OECD_PROVIDER_CODE,
    columns::METHODOLOGY,
    FLOW_TYPE,
];

/// Remove the Cross-cutting overlap from Adaptation and Mitigation.
///
/// Steps: title-case methodology, sum by (year, provider, provider code,
/// methodology, indicator, flow type) keeping missing keys, pivot indicators
/// wide with gaps as 0, subtract Cross-cutting, melt back, drop zero rows,
/// sort by (provider, year, methodology, indicator).
pub fn clean_provider_perspective(df: &DataFrame) -> TableResult<DataFrame> {
    let methodology: Vec<Option<String>> = text_values(df, columns::METHODOLOGY)?
        .into_iter()
        .map(|m| m.map(|m| title_case(m.trim())))
        .collect();
    let cleaned = with_text_column(df, columns::METHODOLOGY, methodology)?;

    let summed = group_sum(&cleaned, &SUMMARY_KEYS, columns::VALUE)?;

    let wide = fill_indicators(&pivot(&summed, &WIDE_INDEX, INDICATOR, columns::VALUE)?)?;
    let wide = remove_cross_cutting_overlaps(&wide)?;

    let long = melt(&wide, &WIDE_INDEX, INDICATOR, columns::VALUE)?;
    let value = col(columns::VALUE);
    let nonzero = filter(&long, value.clone().neq(lit(0.0)).or(value.is_null()))?;

    sort_by(&nonzero, &[PROVIDER, columns::YEAR, columns::METHODOLOGY, INDICATOR])
}

/// Fill missing indicator cells with 0 and add the three core indicators
/// when the data has none of them.
fn fill_indicators(wide: &DataFrame) -> TableResult<DataFrame> {
    let mut filled: Vec<Expr> = column_names(wide)
        .iter()
        .filter(|c| !WIDE_INDEX.contains(&c.as_str()))
        .map(|c| col(c.as_str()).fill_null(lit(0.0)))
        .collect();
    for core in [ADAPTATION, MITIGATION, CROSS_CUTTING] {
        if !has_column(wide, core) {
            filled.push(lit(0.0).alias(core));
        }
    }
    Ok(wide.clone().lazy().with_columns(filled).collect()?)
}

/// `Adaptation -= Cross-cutting`, `Mitigation -= Cross-cutting`, row by row.
/// Missing cells count as 0.
pub fn remove_cross_cutting_overlaps(wide: &DataFrame) -> TableResult<DataFrame> {
    let cell = |name: &str| col(name).cast(DataType::Float64).fill_null(lit(0.0));
    let adjusted = [ADAPTATION, MITIGATION]
        .map(|name| (cell(name) - cell(CROSS_CUTTING)).alias(name));
    Ok(wide.clone().lazy().with_columns(adjusted).collect()?)
}

/// One row per provider with the comma-joined years it reports.
///
/// Output columns are `provider` and `years`; providers are sorted and so
/// are their years.
pub fn available_donors_and_years(df: &DataFrame, provider_column: &str) -> TableResult<DataFrame> {
    let years = int_values(df, columns::YEAR)?;
    let providers = text_values(df, provider_column)?;

    let mut by_provider: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
    for (provider, year) in providers.into_iter().zip(years) {
        let (Some(provider), Some(year)) = (provider, year) else {
            continue;
        };
        by_provider.entry(provider).or_default().insert(year);
    }

    let (names, joined): (Vec<String>, Vec<String>) = by_provider
        .into_iter()
        .map(|(provider, years)| (provider, years.iter().join(", ")))
        .unzip();

    Ok(df!(PROVIDER => names, "years" => joined)?)
}

/// Upper-case the first letter of each word, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::number_values;

    fn raw() -> DataFrame {
        df!(
            "year" => [2020i64, 2020, 2020, 2020, 2021],
            "provider" => ["France", "France", "France", "France", "Austria"],
            "oecd_provider_code" => [4i64, 4, 4, 4, 1],
            "methodology" => ["rio markers ", "Rio Markers", "Rio Markers", "Rio Markers", "RIO MARKERS"],
            "indicator" => ["Adaptation", "Adaptation", "Mitigation", "Cross-cutting", "Mitigation"],
            "flow_type" => ["commitment"; 5],
            "value" => [10.0, 5.0, 8.0, 3.0, 2.0],
        )
        .unwrap()
    }

    fn value(df: &DataFrame, provider: &str, year: i64, indicator: &str) -> Option<f64> {
        let providers = text_values(df, "provider").unwrap();
        let years = int_values(df, "year").unwrap();
        let indicators = text_values(df, "indicator").unwrap();
        let values = number_values(df, "value").unwrap();
        (0..df.height())
            .find(|&i| {
                providers[i].as_deref() == Some(provider)
                    && years[i] == Some(year)
                    && indicators[i].as_deref() == Some(indicator)
            })
            .and_then(|i| values[i])
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("rio markers"), "Rio Markers");
        assert_eq!(title_case("IMPUTED multilateral"), "Imputed Multilateral");
        assert_eq!(title_case("cross-cutting"), "Cross-Cutting");
    }

    #[test]
    fn test_cross_cutting_subtracted() {
        let out = clean_provider_perspective(&raw()).unwrap();

        // Adaptation 15 - 3, Mitigation 8 - 3, Cross-cutting unchanged
        assert_eq!(value(&out, "France", 2020, "Adaptation"), Some(12.0));
        assert_eq!(value(&out, "France", 2020, "Mitigation"), Some(5.0));
        assert_eq!(value(&out, "France", 2020, "Cross-cutting"), Some(3.0));
    }

    #[test]
    fn test_zero_rows_dropped_and_sorted() {
        let out = clean_provider_perspective(&raw()).unwrap();

        // Austria only has Mitigation; the zero-filled Adaptation/Cross-cutting rows go away
        assert_eq!(value(&out, "Austria", 2021, "Adaptation"), None);
        assert_eq!(value(&out, "Austria", 2021, "Mitigation"), Some(2.0));
        assert_eq!(out.height(), 4);
        assert_eq!(text_values(&out, "provider").unwrap()[0].as_deref(), Some("Austria"));
        assert_eq!(text_values(&out, "indicator").unwrap()[1].as_deref(), Some("Adaptation"));
        assert_eq!(text_values(&out, "methodology").unwrap()[1].as_deref(), Some("Rio Markers"));
    }

    #[test]
    fn test_missing_flow_type_kept() {
        let df = df!(
            "year" => [2020i64],
            "provider" => ["Japan"],
            "oecd_provider_code" => [701i64],
            "methodology" => ["Rio Markers"],
            "indicator" => ["Mitigation"],
            "flow_type" => [None::<&str>],
            "value" => [9.0],
        )
        .unwrap();
        let out = clean_provider_perspective(&df).unwrap();
        assert_eq!(value(&out, "Japan", 2020, "Mitigation"), Some(9.0));
    }

    #[test]
    fn test_available_donors_and_years() {
        let df = df!(
            "year" => [2020i64, 2021, 2018, 2020],
            "provider" => ["France", "Austria", "France", "France"],
        )
        .unwrap();

        let report = available_donors_and_years(&df, "provider").unwrap();
        assert_eq!(column_names(&report), vec!["provider", "years"]);
        assert_eq!(report.height(), 2);
        assert_eq!(text_values(&report, "provider").unwrap()[0].as_deref(), Some("Austria"));
        assert_eq!(text_values(&report, "years").unwrap()[1].as_deref(), Some("2018, 2020"));
    }
}
