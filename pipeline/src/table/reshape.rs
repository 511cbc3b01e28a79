//! Wide/long reshaping and joins.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::*;

use super::ops::{exprs, key_order};
use super::{column_names, require_columns, row_keys, text_values};
use crate::error::{TableError, TableResult};

/// Unpivot every non-id column into `(var_name, value_name)` pairs.
///
/// Value columns are read as floats. Output rows are grouped by source
/// column: all rows for the first value column, then the second, and so on.
pub fn melt(
    df: &DataFrame,
    id_vars: &[&str],
    var_name: &str,
    value_name: &str,
) -> TableResult<DataFrame> {
    require_columns(df, id_vars)?;
    let value_vars: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| !id_vars.contains(&c.as_str()))
        .collect();

    let block = |variable: Expr, value: Expr| {
        let mut selection = exprs(id_vars);
        selection.push(variable.alias(var_name));
        selection.push(value.cast(DataType::Float64).alias(value_name));
        df.clone().lazy().select(selection)
    };

    if value_vars.is_empty() {
        let empty = block(lit(NULL).cast(DataType::String), lit(NULL)).limit(0);
        return Ok(empty.collect()?);
    }

    let blocks: Vec<LazyFrame> = value_vars
        .iter()
        .map(|v| block(lit(v.as_str()), col(v.as_str())))
        .collect();
    Ok(concat(blocks, UnionArgs::default())?.collect()?)
}

/// Pivot long to wide.
///
/// One output row per distinct `index` combination (sorted, missing last),
/// one output column per distinct label in `on` (sorted as text). Rows whose
/// label is missing still produce their index row but fill no cell. Two rows
/// on the same (index, label) cell are an error.
pub fn pivot(df: &DataFrame, index: &[&str], on: &str, values: &str) -> TableResult<DataFrame> {
    require_columns(df, index)?;
    require_columns(df, &[on, values])?;

    let labels = text_values(df, on)?;
    let keys = row_keys(df, index)?;

    let mut seen = HashSet::new();
    for (key, label) in keys.iter().zip(&labels) {
        let Some(label) = label else {
            continue;
        };
        if !seen.insert((key, label)) {
            return Err(TableError::DuplicatePivotEntry {
                index: key
                    .iter()
                    .map(|k| k.clone().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(", "),
                column: label.clone(),
            });
        }
    }

    let distinct: BTreeSet<&String> = labels.iter().flatten().collect();
    let label_col = col(on).cast(DataType::String);
    let cells: Vec<Expr> = distinct
        .iter()
        .map(|l| {
            col(values)
                .filter(label_col.clone().eq(lit(l.as_str())))
                .first()
                .alias(l.as_str())
        })
        .collect();

    Ok(df
        .clone()
        .lazy()
        .group_by(exprs(index))
        .agg(cells)
        .sort_by_exprs(exprs(index), key_order())
        .collect()?)
}

/// Full outer join on `on`.
///
/// Output columns are the join keys, then the left frame's other columns,
/// then the right frame's. Keys present on one side only keep their row
/// with the other side's cells missing. Rows are sorted by the join keys.
pub fn merge_outer(left: &DataFrame, right: &DataFrame, on: &[&str]) -> TableResult<DataFrame> {
    require_columns(left, on)?;
    require_columns(right, on)?;

    let args = JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns);
    Ok(left
        .clone()
        .lazy()
        .join(right.clone().lazy(), exprs(on), exprs(on), args)
        .sort_by_exprs(exprs(on), key_order())
        .collect()?)
}
