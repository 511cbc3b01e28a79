//! Column and row operations.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{has_column, require_columns};
use crate::error::TableResult;

/// Reduction applied to a value column when grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    /// Sum of present values; an all-missing group sums to 0.
    #[default]
    Sum,
    /// Mean of present values; an all-missing group is missing.
    Mean,
    /// Smallest present value.
    Min,
    /// Largest present value.
    Max,
    /// Number of present values.
    Count,
}

impl AggFunc {
    /// Aggregation over `column`, always as a float.
    pub fn expr(self, column: &str) -> Expr {
        let c = col(column);
        let reduced = match self {
            AggFunc::Sum => c.sum(),
            AggFunc::Mean => c.mean(),
            AggFunc::Min => c.min(),
            AggFunc::Max => c.max(),
            AggFunc::Count => c.count(),
        };
        reduced.cast(DataType::Float64)
    }
}

/// Ascending, missing last, ties kept in input order.
pub fn key_order() -> SortMultipleOptions {
    SortMultipleOptions::default()
        .with_nulls_last(true)
        .with_maintain_order(true)
}

/// Column expressions for `names`.
pub fn exprs(names: &[&str]) -> Vec<Expr> {
    names.iter().map(|n| col(*n)).collect()
}

/// Sort by `columns` with [`key_order`].
pub fn sort_by(df: &DataFrame, columns: &[&str]) -> TableResult<DataFrame> {
    require_columns(df, columns)?;
    Ok(df
        .clone()
        .lazy()
        .sort_by_exprs(exprs(columns), key_order())
        .collect()?)
}

/// Rename columns. Pairs naming absent columns are ignored.
pub fn rename(df: &DataFrame, pairs: &[(&str, &str)]) -> TableResult<DataFrame> {
    let mut out = df.clone();
    for (from, to) in pairs {
        if has_column(&out, from) {
            out.rename(from, (*to).into())?;
        }
    }
    Ok(out)
}

/// Remove whichever of the named columns exist.
pub fn drop_if_present(df: &DataFrame, names: &[&str]) -> TableResult<DataFrame> {
    let mut out = df.clone();
    for name in names {
        if has_column(&out, name) {
            out = out.drop(name)?;
        }
    }
    Ok(out)
}

/// Keep only the named columns, in the given order.
pub fn select(df: &DataFrame, columns: &[&str]) -> TableResult<DataFrame> {
    require_columns(df, columns)?;
    Ok(df.clone().lazy().select(exprs(columns)).collect()?)
}

/// Add or replace a column holding `value` on every row.
pub fn with_constant(df: &DataFrame, name: &str, value: Expr) -> TableResult<DataFrame> {
    Ok(df.clone().lazy().with_column(value.alias(name)).collect()?)
}

/// Rows where `predicate` is true; a null predicate drops the row.
pub fn filter(df: &DataFrame, predicate: Expr) -> TableResult<DataFrame> {
    Ok(df.clone().lazy().filter(predicate).collect()?)
}

/// Group by `keys` and reduce `value` with `func`.
///
/// The result holds the key columns followed by the value column, one row
/// per distinct key combination, sorted by the keys. Missing keys form
/// their own group. With no keys the whole frame is one group.
pub fn group_aggregate(
    df: &DataFrame,
    keys: &[&str],
    value: &str,
    func: AggFunc,
) -> TableResult<DataFrame> {
    require_columns(df, keys)?;
    require_columns(df, &[value])?;

    let lf = df.clone().lazy();
    let grouped = if keys.is_empty() {
        lf.select([func.expr(value).alias(value)])
    } else {
        lf.group_by(exprs(keys))
            .agg([func.expr(value).alias(value)])
            .sort_by_exprs(exprs(keys), key_order())
    };
    Ok(grouped.collect()?)
}

/// Sum `value` by `keys`.
pub fn group_sum(df: &DataFrame, keys: &[&str], value: &str) -> TableResult<DataFrame> {
    group_aggregate(df, keys, value, AggFunc::Sum)
}

/// Stack frames vertically.
///
/// Columns are the union of all inputs in order of first appearance;
/// cells a frame does not have are missing.
pub fn concat_rows(frames: &[DataFrame]) -> TableResult<DataFrame> {
    let lazy: Vec<LazyFrame> = frames.iter().map(|f| f.clone().lazy()).collect();
    Ok(concat_lf_diagonal(lazy, UnionArgs::default())?.collect()?)
}
