//! Canonical table checks.
//!
//! A canonical table holds one row per (entity, year, category combination)
//! and a numeric `value`. These checks run after formatting and report every
//! violation rather than stopping at the first one.
//!
//! # Example
//!
//! ```rust,ignore
//! use climate_subsidies::validation::validate_canonical;
//!
//! if let Err(errors) = validate_canonical(&df, &["country_name", "year"]) {
//!     for e in errors {
//!         eprintln!("{e}");
//!     }
//! }
//! ```

use std::collections::HashMap;

use polars::prelude::{DataFrame, DataType};

use crate::models::columns;
use crate::table::{has_column, row_keys, text_values};

/// Check that every key column exists.
pub fn validate_columns(df: &DataFrame, required: &[&str]) -> Result<(), Vec<String>> {
    let errors: Vec<String> = required
        .iter()
        .filter(|c| !has_column(df, c))
        .map(|c| format!("Missing column '{}'", c))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that no two rows share the same key.
///
/// Missing key cells take part in the key, so two rows that only differ by
/// a missing entity still collide.
pub fn validate_unique_key(df: &DataFrame, key: &[&str]) -> Result<(), Vec<String>> {
    let keys = row_keys(df, key).map_err(|e| vec![e.to_string()])?;

    let mut first_seen: HashMap<&[Option<String>], usize> = HashMap::new();
    let mut errors = Vec::new();

    for (row_num, k) in keys.iter().enumerate() {
        if let Some(first) = first_seen.get(k.as_slice()) {
            let shown: Vec<&str> = k
                .iter()
                .map(|c| c.as_deref().unwrap_or("<missing>"))
                .collect();
            errors.push(format!(
                "Row {}: duplicate key [{}] (first seen on row {})",
                row_num + 1,
                shown.join(", "),
                first + 1
            ));
        } else {
            first_seen.insert(k.as_slice(), row_num);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that `value` is numeric or missing on every row.
///
/// A text column is reported row by row, naming each cell that is present.
pub fn validate_numeric_values(df: &DataFrame) -> Result<(), Vec<String>> {
    let Ok(column) = df.column(columns::VALUE) else {
        return Err(vec![format!("Missing column '{}'", columns::VALUE)]);
    };
    if column.dtype() != &DataType::String {
        return Ok(());
    }

    let cells = text_values(df, columns::VALUE).map_err(|e| vec![e.to_string()])?;
    let errors: Vec<String> = cells
        .iter()
        .enumerate()
        .filter_map(|(row, v)| {
            v.as_ref()
                .map(|v| format!("Row {}: non-numeric value \"{}\"", row + 1, v))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// All canonical checks for a table keyed by `key`.
pub fn validate_canonical(df: &DataFrame, key: &[&str]) -> Result<(), Vec<String>> {
    validate_columns(df, key)?;

    let mut errors = Vec::new();
    if let Err(e) = validate_unique_key(df, key) {
        errors.extend(e);
    }
    if let Err(e) = validate_numeric_values(df) {
        errors.extend(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
