//! Tabular helpers over polars [`DataFrame`]s.
//!
//! Every stage of the pipeline is a function from frames to frames; nothing
//! here touches the filesystem. Missing values are nulls.
//!
//! - [`ops`] - renaming, constants, filtering, sorting, grouping, concatenation
//! - [`reshape`] - melt, pivot and outer merge
//!
//! Row-level reads go through [`text_values`], [`number_values`] and
//! [`int_values`]. They cast the column first, so a year stored as text in
//! one extract and as an integer in another reads the same.

pub mod ops;
pub mod reshape;

use polars::prelude::*;

use crate::error::{TableError, TableResult};

pub use ops::AggFunc;

/// Column names, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

/// True when the column exists.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Fail with [`TableError::MissingColumn`] on the first absent name.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> TableResult<()> {
    match names.iter().find(|n| !has_column(df, n)) {
        Some(missing) => Err(TableError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

fn cast_column(df: &DataFrame, name: &str, dtype: &DataType) -> TableResult<Series> {
    require_columns(df, &[name])?;
    let column = df.column(name)?.cast(dtype)?;
    Ok(column.as_materialized_series().clone())
}

/// Cells of a column as text. Numbers are rendered the way polars casts them.
pub fn text_values(df: &DataFrame, name: &str) -> TableResult<Vec<Option<String>>> {
    let series = cast_column(df, name, &DataType::String)?;
    Ok(series.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Cells of a column as floats. Text that does not parse and non-finite
/// values read as missing.
pub fn number_values(df: &DataFrame, name: &str) -> TableResult<Vec<Option<f64>>> {
    let series = cast_column(df, name, &DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Cells of a column as integers.
pub fn int_values(df: &DataFrame, name: &str) -> TableResult<Vec<Option<i64>>> {
    let series = cast_column(df, name, &DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

/// One text key per row over `columns`.
pub fn row_keys(df: &DataFrame, columns: &[&str]) -> TableResult<Vec<Vec<Option<String>>>> {
    let cells = columns
        .iter()
        .map(|c| text_values(df, c))
        .collect::<TableResult<Vec<_>>>()?;
    Ok((0..df.height())
        .map(|row| cells.iter().map(|c| c[row].clone()).collect())
        .collect())
}

/// Add or replace a text column.
pub fn with_text_column(
    df: &DataFrame,
    name: &str,
    values: Vec<Option<String>>,
) -> TableResult<DataFrame> {
    let mut out = df.clone();
    out.with_column(Series::new(name.into(), values))?;
    Ok(out)
}

/// Add or replace a float column.
pub fn with_number_column(
    df: &DataFrame,
    name: &str,
    values: Vec<Option<f64>>,
) -> TableResult<DataFrame> {
    let mut out = df.clone();
    out.with_column(Series::new(name.into(), values))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "iso3_code" => ["USA", "FRA"],
            "year" => ["2020", "2021"],
            "value" => [Some(1.0e9), None],
        )
        .unwrap()
    }

    #[test]
    fn test_typed_reads_cast_first() {
        let df = sample();
        assert_eq!(int_values(&df, "year").unwrap(), vec![Some(2020), Some(2021)]);
        assert_eq!(number_values(&df, "value").unwrap(), vec![Some(1.0e9), None]);
        assert_eq!(
            text_values(&df, "iso3_code").unwrap(),
            vec![Some("USA".to_string()), Some("FRA".to_string())]
        );
    }

    #[test]
    fn test_missing_column_error() {
        let err = require_columns(&sample(), &["year", "income_level"]).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn(ref c) if c == "income_level"));
        assert!(text_values(&sample(), "nope").is_err());
    }

    #[test]
    fn test_row_keys() {
        let keys = row_keys(&sample(), &["iso3_code", "value"]).unwrap();
        assert_eq!(keys[1], vec![Some("FRA".to_string()), None]);
    }

    #[test]
    fn test_with_column_replaces() {
        let out = with_text_column(
            &sample(),
            "iso3_code",
            vec![Some("GBR".to_string()), None],
        )
        .unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(text_values(&out, "iso3_code").unwrap()[1], None);
    }
}
