//! Aggregate rows ("all" rollups) over categorical columns.
//!
//! [`add_aggregates`] precomputes every subtotal once so that downstream
//! stages can pick totals by filtering on the sentinel instead of
//! re-aggregating.

use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TableResult;
use crate::models::{columns, ALL};
use crate::table::ops::{concat_rows, filter, group_aggregate};
use crate::table::{column_names, has_column, require_columns, AggFunc};

/// How aggregate rows are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Column reduced in every group
    pub value_column: String,
    /// Sentinel written into rolled-up category columns
    pub agg_value: String,
    pub func: AggFunc,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            value_column: columns::VALUE.to_string(),
            agg_value: ALL.to_string(),
            func: AggFunc::Sum,
        }
    }
}

/// Add aggregate rows with the default options (sum of `value`, sentinel "all").
pub fn add_aggregates(
    df: &DataFrame,
    agg_cols: &[&str],
    id_cols: &[&str],
) -> TableResult<DataFrame> {
    add_aggregates_with(df, agg_cols, id_cols, &AggregateOptions::default())
}

/// Add aggregate rows for every combination of `agg_cols`.
///
/// Output is the original rows, then one block per non-empty subset of
/// `agg_cols` (by increasing size, subsets of equal size in column order),
/// then the grand total per `id_cols` combination. Each block groups by the
/// subset plus `id_cols` and sets the other `agg_cols` to the sentinel.
/// A missing group key is a group of its own, so every block sums to the
/// same total. Columns that are neither grouped nor reduced are missing on
/// aggregate rows.
///
/// `agg_cols` are read as text and the value column as floats.
pub fn add_aggregates_with(
    df: &DataFrame,
    agg_cols: &[&str],
    id_cols: &[&str],
    options: &AggregateOptions,
) -> TableResult<DataFrame> {
    let value = options.value_column.as_str();
    // fail early on unknown columns, even when a block would be empty
    require_columns(df, agg_cols)?;
    require_columns(df, id_cols)?;
    require_columns(df, &[value])?;

    let mut casts: Vec<Expr> = agg_cols
        .iter()
        .map(|c| col(*c).cast(DataType::String))
        .collect();
    casts.push(col(value).cast(DataType::Float64));
    let base = df.clone().lazy().with_columns(casts).collect()?;
    let order = column_names(&base);

    let block = |group: Vec<&str>| -> TableResult<DataFrame> {
        let grouped = group_aggregate(&base, &group, value, options.func)?;
        let mut selection = Vec::with_capacity(order.len());
        for name in &order {
            let name = name.as_str();
            let expr = if name == value || group.contains(&name) {
                col(name)
            } else if agg_cols.contains(&name) {
                lit(options.agg_value.as_str()).alias(name)
            } else {
                let dtype = base.column(name)?.dtype().clone();
                lit(NULL).cast(dtype).alias(name)
            };
            selection.push(expr);
        }
        Ok(grouped.lazy().select(selection).collect()?)
    };

    let mut blocks = vec![base.clone()];
    for size in 1..=agg_cols.len() {
        for subset in agg_cols.iter().copied().combinations(size) {
            blocks.push(block(subset.into_iter().chain(id_cols.iter().copied()).collect())?);
        }
    }
    blocks.push(block(id_cols.to_vec())?);

    concat_rows(&blocks)
}

/// Keep only grand-total rows: the sentinel in every category column present.
pub fn totals_only(df: &DataFrame, category_cols: &[&str]) -> TableResult<DataFrame> {
    let predicate = category_cols
        .iter()
        .filter(|c| has_column(df, c))
        .map(|c| col(*c).cast(DataType::String).eq(lit(ALL)))
        .reduce(|a, b| a.and(b));

    match predicate {
        Some(p) => filter(df, p),
        None => Ok(df.clone()),
    }
}
