//! Entity Resolver.
//!
//! Maps free-text country and provider names, or codes in one scheme, to
//! codes in another scheme and to income groups. Lookups go through the
//! [`CodeService`] trait; the crate ships [`CountryCatalog`] as the default
//! service.
//!
//! [`EntityResolver`] memoizes every lookup by `(raw value, from, to)` for the
//! lifetime of the resolver, so a value repeated on thousands of rows costs
//! one service call. Build one resolver per run.

pub mod catalog;

use std::collections::{BTreeMap, HashMap};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub use catalog::{CountryCatalog, CountryEntry};

use crate::error::{ResolveError, ResolveResult, TableResult};
use crate::logs::log_warning;
use crate::models::{columns, EU_INSTITUTIONS_DAC_CODE, G20_MEMBERS};
use crate::table::{text_values, with_text_column};

/// A code system an entity can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeScheme {
    /// Free-text name matched against the catalog's name patterns
    Regex,
    Iso3,
    Iso2,
    /// Short English name, e.g. "United Kingdom"
    NameShort,
    /// OECD DAC donor/recipient code
    DacCode,
}

/// Black-box code conversion and income classification.
pub trait CodeService {
    /// Convert `value` from one scheme to another; `None` when it does not resolve.
    fn convert(&self, value: &str, from: CodeScheme, to: CodeScheme) -> Option<String>;

    /// Income group of an ISO3 code, e.g. "High income".
    fn income_level(&self, iso3: &str) -> Option<String>;
}

/// Memoizing front end to a [`CodeService`].
pub struct EntityResolver<'a> {
    service: &'a dyn CodeService,
    codes: HashMap<(String, CodeScheme, CodeScheme), Option<String>>,
    incomes: HashMap<String, Option<String>>,
    income_overrides: BTreeMap<String, String>,
    lookups: usize,
}

impl<'a> EntityResolver<'a> {
    pub fn new(service: &'a dyn CodeService) -> Self {
        Self {
            service,
            codes: HashMap::new(),
            incomes: HashMap::new(),
            income_overrides: BTreeMap::new(),
            lookups: 0,
        }
    }

    /// ISO3 -> income group entries that win over the service.
    pub fn with_income_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.income_overrides = overrides;
        self
    }

    /// Number of calls made to the underlying service so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    /// Resolve a single value, consulting the cache first.
    pub fn resolve(&mut self, value: &str, from: CodeScheme, to: CodeScheme) -> Option<String> {
        let key = (value.to_string(), from, to);
        if let Some(hit) = self.codes.get(&key) {
            return hit.clone();
        }
        self.lookups += 1;
        let resolved = self.service.convert(value, from, to);
        self.codes.insert(key, resolved.clone());
        resolved
    }

    /// Convert a column of entity cells.
    ///
    /// Each distinct value is resolved once. Values that do not resolve (and
    /// missing cells) become `not_found`, or a missing cell when `not_found`
    /// is `None`. Keys of `additional_mapping` replace whatever automatic
    /// resolution produced for them.
    pub fn convert_entities<'v>(
        &mut self,
        values: impl IntoIterator<Item = Option<&'v str>>,
        from: CodeScheme,
        to: CodeScheme,
        not_found: Option<&str>,
        additional_mapping: Option<&BTreeMap<String, String>>,
    ) -> Vec<Option<String>> {
        let not_found = not_found.map(str::to_string);
        let mut mapper: HashMap<&'v str, Option<String>> = HashMap::new();
        let mut unresolved: Vec<String> = Vec::new();

        let out = values
            .into_iter()
            .map(|v| {
                let Some(raw) = v.filter(|r| !r.trim().is_empty()) else {
                    return not_found.clone();
                };
                if let Some(mapped) = mapper.get(raw) {
                    return mapped.clone();
                }

                let mapped = match additional_mapping.and_then(|m| m.get(raw)) {
                    Some(over) => Some(over.clone()),
                    None => match self.resolve(raw, from, to) {
                        Some(code) => Some(code),
                        None => {
                            unresolved.push(raw.to_string());
                            not_found.clone()
                        }
                    },
                };
                mapper.insert(raw, mapped.clone());
                mapped
            })
            .collect();

        if !unresolved.is_empty() {
            log_warning(format!(
                "{} value(s) not found as {:?}: {}",
                unresolved.len(),
                to,
                unresolved.join(", ")
            ));
        }
        out
    }

    /// Income group of an ISO3 code, overrides first.
    pub fn income_level(&mut self, iso3: &str) -> Option<String> {
        if let Some(over) = self.income_overrides.get(iso3) {
            return Some(over.clone());
        }
        if let Some(hit) = self.incomes.get(iso3) {
            return hit.clone();
        }
        self.lookups += 1;
        let level = self.service.income_level(iso3);
        self.incomes.insert(iso3.to_string(), level.clone());
        level
    }

    /// Append an `income_level` column computed from `id_column`.
    ///
    /// Ids in a scheme other than ISO3 are converted first. Unknown ids get a
    /// missing income level.
    pub fn add_income_level_column(
        &mut self,
        df: &DataFrame,
        id_column: &str,
        id_type: CodeScheme,
    ) -> TableResult<DataFrame> {
        let ids = text_values(df, id_column)?;
        let iso3 = match id_type {
            CodeScheme::Iso3 => ids,
            other => self.convert_entities(
                ids.iter().map(Option::as_deref),
                other,
                CodeScheme::Iso3,
                None,
                None,
            ),
        };

        let levels = iso3
            .iter()
            .map(|code| code.as_deref().and_then(|c| self.income_level(c)))
            .collect();

        with_text_column(df, columns::INCOME_LEVEL, levels)
    }
}

/// DAC codes of the G20 members, with the EU institutions mapped to 918.
pub fn g20_donor_codes(resolver: &mut EntityResolver<'_>) -> ResolveResult<Vec<i64>> {
    let overrides = BTreeMap::from([("EUI".to_string(), EU_INSTITUTIONS_DAC_CODE.to_string())]);

    let codes = resolver.convert_entities(
        G20_MEMBERS.iter().map(|n| Some(*n)),
        CodeScheme::Regex,
        CodeScheme::DacCode,
        None,
        Some(&overrides),
    );

    G20_MEMBERS
        .iter()
        .zip(codes)
        .map(|(name, code)| {
            code.as_deref()
                .map(|c| c.trim().strip_suffix(".0").unwrap_or(c.trim()))
                .and_then(|c| c.parse::<i64>().ok())
                .ok_or_else(|| ResolveError::Unresolved {
                    value: name.to_string(),
                    target: "DAC code".to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use std::cell::Cell;

    /// Knows two countries and counts every call.
    struct CountingService {
        calls: Cell<usize>,
    }

    impl CountingService {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl CodeService for CountingService {
        fn convert(&self, value: &str, _from: CodeScheme, to: CodeScheme) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            match (value, to) {
                ("United States", CodeScheme::Iso3) => Some("USA".into()),
                ("France", CodeScheme::Iso3) => Some("FRA".into()),
                _ => None,
            }
        }

        fn income_level(&self, iso3: &str) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            match iso3 {
                "USA" | "FRA" => Some("High income".into()),
                _ => None,
            }
        }
    }

    fn owned(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_each_distinct_value_resolved_once() {
        let service = CountingService::new();
        let mut resolver = EntityResolver::new(&service);
        let column = ["United States", "France", "United States", "United States", "France"];

        let out = resolver.convert_entities(
            column.iter().map(|v| Some(*v)),
            CodeScheme::Regex,
            CodeScheme::Iso3,
            None,
            None,
        );

        assert_eq!(out, owned(&["USA", "FRA", "USA", "USA", "FRA"]));
        assert_eq!(service.calls.get(), 2);
        assert_eq!(resolver.lookups(), 2);

        // second column, same values: served from the cache
        resolver.convert_entities(
            column.iter().map(|v| Some(*v)),
            CodeScheme::Regex,
            CodeScheme::Iso3,
            None,
            None,
        );
        assert_eq!(service.calls.get(), 2);
    }

    #[test]
    fn test_not_found_placeholder_and_missing_cells() {
        let service = CountingService::new();
        let mut resolver = EntityResolver::new(&service);
        let column = [Some("Atlantis"), None, Some("France")];

        let out = resolver.convert_entities(column, CodeScheme::Regex, CodeScheme::Iso3, None, None);
        assert_eq!(out, vec![None, None, Some("FRA".to_string())]);

        let out = resolver.convert_entities(
            column,
            CodeScheme::Regex,
            CodeScheme::Iso3,
            Some("not found"),
            None,
        );
        assert_eq!(out, owned(&["not found", "not found", "FRA"]));
    }

    #[test]
    fn test_additional_mapping_wins() {
        let service = CountingService::new();
        let mut resolver = EntityResolver::new(&service);
        let mapping = BTreeMap::from([
            ("France".to_string(), "XXX".to_string()),
            ("EU Institutions".to_string(), "EUI".to_string()),
        ]);
        let column = [Some("France"), Some("EU Institutions"), Some("United States")];

        let out = resolver.convert_entities(
            column,
            CodeScheme::Regex,
            CodeScheme::Iso3,
            None,
            Some(&mapping),
        );
        assert_eq!(out, owned(&["XXX", "EUI", "USA"]));
    }

    #[test]
    fn test_add_income_level_column() {
        let service = CountingService::new();
        let mut resolver = EntityResolver::new(&service)
            .with_income_overrides(BTreeMap::from([("FRA".to_string(), "Override".to_string())]));
        let df = df!(
            "iso3_code" => [Some("USA"), Some("FRA"), None, Some("USA")],
            "value" => [1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        let out = resolver
            .add_income_level_column(&df, "iso3_code", CodeScheme::Iso3)
            .unwrap();

        assert_eq!(
            crate::table::column_names(&out),
            vec!["iso3_code", "value", "income_level"]
        );
        assert_eq!(
            text_values(&out, "income_level").unwrap(),
            vec![
                Some("High income".to_string()),
                Some("Override".to_string()),
                None,
                Some("High income".to_string()),
            ]
        );
        // one service call for USA; FRA comes from the overrides
        assert_eq!(service.calls.get(), 1);
    }

    #[test]
    fn test_income_level_from_names() {
        let service = CountingService::new();
        let mut resolver = EntityResolver::new(&service);
        let df = df!("provider_name" => ["France"]).unwrap();

        let out = resolver
            .add_income_level_column(&df, "provider_name", CodeScheme::Regex)
            .unwrap();
        assert_eq!(
            text_values(&out, "income_level").unwrap(),
            owned(&["High income"])
        );
        assert_eq!(out.width(), 2);
    }

    #[test]
    fn test_income_level_with_catalog_names() {
        let catalog = CountryCatalog::embedded().unwrap();
        let mut resolver = EntityResolver::new(catalog);
        let df = df!(
            "country_name" => ["Democratic People's Republic of Korea", "Korea, Rep.", "Hong Kong SAR, China"],
        )
        .unwrap();

        let out = resolver
            .add_income_level_column(&df, "country_name", CodeScheme::Regex)
            .unwrap();
        assert_eq!(
            text_values(&out, "income_level").unwrap(),
            owned(&["Low income", "High income", "High income"])
        );
    }

    #[test]
    fn test_g20_donor_codes() {
        let catalog = CountryCatalog::embedded().unwrap();
        let mut resolver = EntityResolver::new(catalog);

        let codes = g20_donor_codes(&mut resolver).unwrap();
        assert_eq!(codes.len(), 20);
        assert_eq!(codes[0], 425);
        assert_eq!(codes[18], 302);
        assert_eq!(codes[19], 918);
    }
}
