//! Analysis Layer: join the two canonical tables.
//!
//! Both outputs use outer joins, so a year (or year and country) present in
//! only one dataset keeps its row with the other metric missing.

use polars::prelude::*;

use crate::config::Labels;
use crate::error::TableResult;
use crate::models::{columns, Indicator};
use crate::resolve::{CodeScheme, EntityResolver};
use crate::table::ops::{filter, group_sum, rename, select, sort_by, with_constant};
use crate::table::reshape::merge_outer;
use crate::table::{text_values, with_text_column};

use super::aggregate::totals_only;

/// Sum `value` by year over the entities of one income group.
///
/// Only grand-total rows are read when the table carries category columns.
/// Output columns are `year` and `value`, sorted by year.
pub fn high_income_agg(df: &DataFrame, income_level: &str) -> TableResult<DataFrame> {
    let totals = totals_only(df, &columns::CATEGORIES)?;
    let group = filter(
        &totals,
        col(columns::INCOME_LEVEL).cast(DataType::String).eq(lit(income_level)),
    )?;
    group_sum(&group, &[columns::YEAR], columns::VALUE)
}

/// Chart 1 data: high-income climate finance against high-income subsidies.
///
/// Columns: `year`, `climate_finance_commitments`, `fossil_fuel_subsidies`,
/// `currency`.
pub fn chart_1_data(climate: &DataFrame, subsidies: &DataFrame, labels: &Labels) -> TableResult<DataFrame> {
    let cf = rename(
        &high_income_agg(climate, &labels.high_income)?,
        &[(columns::VALUE, Indicator::ClimateFinanceCommitments.column())],
    )?;
    let ffs = rename(
        &high_income_agg(subsidies, &labels.high_income)?,
        &[(columns::VALUE, Indicator::FossilFuelSubsidies.column())],
    )?;

    let merged = merge_outer(&cf, &ffs, &[columns::YEAR])?;
    with_constant(&merged, columns::CURRENCY, lit(labels.currency.as_str()))
}

/// Rows of a canonical table for the roster countries, as
/// (`year`, `iso3_code`, `<metric>`).
fn roster_rows(df: &DataFrame, roster: &[String], metric: &str) -> TableResult<DataFrame> {
    let code = col(columns::ISO3_CODE).cast(DataType::String);
    let in_roster = roster
        .iter()
        .map(|r| code.clone().eq(lit(r.as_str())))
        .reduce(|a, b| a.or(b))
        .unwrap_or(lit(false));

    let rows = filter(&totals_only(df, &columns::CATEGORIES)?, in_roster)?;
    let rows = select(&rows, &[columns::YEAR, columns::ISO3_CODE, columns::VALUE])?;
    rename(&rows, &[(columns::VALUE, metric)])
}

/// Chart 2 data: both metrics per roster country and year.
///
/// Columns: `year`, `iso3_code`, `climate_finance_commitments`,
/// `fossil_fuel_subsidies`, `currency`, `country_name`; sorted by
/// (iso3_code, year).
pub fn chart_2_data(
    climate: &DataFrame,
    subsidies: &DataFrame,
    roster: &[String],
    labels: &Labels,
    resolver: &mut EntityResolver<'_>,
) -> TableResult<DataFrame> {
    let cf = roster_rows(climate, roster, Indicator::ClimateFinanceCommitments.column())?;
    let ffs = roster_rows(subsidies, roster, Indicator::FossilFuelSubsidies.column())?;

    let merged = sort_by(
        &merge_outer(&cf, &ffs, &[columns::YEAR, columns::ISO3_CODE])?,
        &[columns::ISO3_CODE, columns::YEAR],
    )?;
    let merged = with_constant(&merged, columns::CURRENCY, lit(labels.currency.as_str()))?;

    let codes = text_values(&merged, columns::ISO3_CODE)?;
    let names = resolver.convert_entities(
        codes.iter().map(Option::as_deref),
        CodeScheme::Iso3,
        CodeScheme::NameShort,
        None,
        None,
    );
    with_text_column(&merged, columns::COUNTRY_NAME, names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::models::SourceGranularity;
    use crate::parser::{parse_csv_str, to_csv_string};
    use crate::resolve::CountryCatalog;
    use crate::table::{column_names, int_values, number_values};
    use crate::transform::format_raw::format_cf_data;

    fn subsidies() -> DataFrame {
        df!(
            "country_name" => ["United States", "United States", "France", "India"],
            "year" => [2020i64, 2020, 2015, 2020],
            "value" => [1.0e9, 2.0e9, 10.0, 5.0e9],
            "iso3_code" => ["USA", "USA", "FRA", "IND"],
            "units" => ["USD current"; 4],
            "income_level" => ["High income", "High income", "High income", "Lower middle income"],
        )
        .unwrap()
    }

    fn climate() -> DataFrame {
        df!(
            "year" => [2020i64, 2020, 2021],
            "provider_name" => ["United States", "United States", "Germany"],
            "marker" => ["Adaptation", "all", "all"],
            "value" => [4.0, 4.0, 6.0],
            "iso3_code" => ["USA", "USA", "DEU"],
            "units" => ["USD current"; 3],
            "income_level" => ["High income"; 3],
        )
        .unwrap()
    }

    fn roster() -> Vec<String> {
        vec!["USA".to_string(), "FRA".to_string(), "DEU".to_string()]
    }

    fn texts(df: &DataFrame, column: &str) -> Vec<Option<String>> {
        text_values(df, column).unwrap()
    }

    #[test]
    fn test_high_income_agg_sums_by_year() {
        let out = high_income_agg(&subsidies(), "High income").unwrap();
        assert_eq!(column_names(&out), vec!["year", "value"]);
        assert_eq!(int_values(&out, "year").unwrap(), vec![Some(2015), Some(2020)]);
        assert_eq!(number_values(&out, "value").unwrap(), vec![Some(10.0), Some(3.0e9)]);
    }

    #[test]
    fn test_high_income_agg_reads_totals_only() {
        let out = high_income_agg(&climate(), "High income").unwrap();
        assert_eq!(number_values(&out, "value").unwrap(), vec![Some(4.0), Some(6.0)]);
    }

    #[test]
    fn test_high_income_agg_after_csv_round_trip() {
        let raw = df!(
            "year" => [2020i64, 2020, 2020, 2019],
            "provider" => ["France", "France", "Austria", "France"],
            "oecd_provider_code" => [4i64, 4, 1, 4],
            "methodology" => ["Rio Markers", "Rio Markers", "Imputed Multilateral", "Rio Markers"],
            "indicator" => ["Adaptation", "Cross-cutting", "Mitigation", "Mitigation"],
            "flow_type" => ["c"; 4],
            "value" => [10.0, 4.0, 3.0, 6.0],
        )
        .unwrap();
        let mut config = PipelineConfig::default();
        config.climate_finance.source_granularity = SourceGranularity::ProviderMethodology;
        let mut resolver = EntityResolver::new(CountryCatalog::embedded().unwrap());

        let formatted = format_cf_data(&raw, &config, &mut resolver).unwrap();
        let text = to_csv_string(&formatted).unwrap();
        let back = parse_csv_str(&text, ',').unwrap();

        let out = high_income_agg(&back, "High income").unwrap();
        assert_eq!(int_values(&out, "year").unwrap(), vec![Some(2019), Some(2020)]);
        assert_eq!(number_values(&out, "value").unwrap(), vec![Some(6.0), Some(17.0)]);
    }

    #[test]
    fn test_chart_1_outer_join() {
        let out = chart_1_data(&climate(), &subsidies(), &Labels::default()).unwrap();
        assert_eq!(
            column_names(&out),
            vec!["year", "climate_finance_commitments", "fossil_fuel_subsidies", "currency"]
        );
        assert_eq!(
            int_values(&out, "year").unwrap(),
            vec![Some(2015), Some(2020), Some(2021)]
        );
        // 2015: subsidies only, 2021: climate finance only
        assert_eq!(
            number_values(&out, "climate_finance_commitments").unwrap(),
            vec![None, Some(4.0), Some(6.0)]
        );
        assert_eq!(
            number_values(&out, "fossil_fuel_subsidies").unwrap(),
            vec![Some(10.0), Some(3.0e9), None]
        );
        assert_eq!(texts(&out, "currency")[2].as_deref(), Some("US$ current"));
    }

    #[test]
    fn test_chart_2_keeps_one_sided_rows() {
        let catalog = CountryCatalog::embedded().unwrap();
        let mut resolver = EntityResolver::new(catalog);
        let out = chart_2_data(&climate(), &subsidies(), &roster(), &Labels::default(), &mut resolver)
            .unwrap();

        assert_eq!(
            column_names(&out),
            vec![
                "year",
                "iso3_code",
                "climate_finance_commitments",
                "fossil_fuel_subsidies",
                "currency",
                "country_name"
            ]
        );
        // DEU 2021, FRA 2015, USA 2020 x2 subsidies rows
        assert_eq!(out.height(), 4);
        assert_eq!(texts(&out, "iso3_code")[0].as_deref(), Some("DEU"));
        assert_eq!(texts(&out, "country_name")[0].as_deref(), Some("Germany"));

        let cf = number_values(&out, "climate_finance_commitments").unwrap();
        let ffs = number_values(&out, "fossil_fuel_subsidies").unwrap();
        assert_eq!(ffs[0], None);
        assert_eq!(int_values(&out, "year").unwrap()[1], Some(2015));
        assert_eq!(ffs[1], Some(10.0));
        assert_eq!(cf[1], None);

        assert_eq!(texts(&out, "country_name")[2].as_deref(), Some("United States"));
        assert_eq!(cf[2], Some(4.0));
    }

    #[test]
    fn test_empty_roster() {
        let catalog = CountryCatalog::embedded().unwrap();
        let mut resolver = EntityResolver::new(catalog);
        let out = chart_2_data(&climate(), &subsidies(), &[], &Labels::default(), &mut resolver).unwrap();
        assert_eq!(out.height(), 0);
    }
}
