//! Embedded country reference table.
//!
//! `data/countries.csv` is compiled into the binary. It lists every ISO 3166
//! country and territory (plus Kosovo) with its codes, a case-insensitive
//! name pattern used to recognise free-text names, an optional exclusion
//! pattern and its income group.
//!
//! A name belongs to an entry when the pattern matches and the exclusion
//! does not. Entries are still tried in file order and the first match
//! wins, so more specific entries sit before the general ones they overlap
//! with.

use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use super::{CodeScheme, CodeService};
use crate::error::{ResolveError, ResolveResult};

const EMBEDDED_CATALOG: &str = include_str!("../../data/countries.csv");

static CATALOG: OnceCell<CountryCatalog> = OnceCell::new();

/// One row of the reference table as stored on disk.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    iso3: String,
    iso2: String,
    name_short: String,
    regex: String,
    exclude: Option<String>,
    dac_code: Option<String>,
    income_level: Option<String>,
}

/// A country with its codes and income group.
#[derive(Debug, Clone)]
pub struct CountryEntry {
    pub iso3: String,
    pub iso2: String,
    pub name_short: String,
    pub dac_code: Option<String>,
    pub income_level: Option<String>,
    pattern: Regex,
    exclude: Option<Regex>,
}

impl CountryEntry {
    /// True when `name` matches this country's name pattern.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.pattern.is_match(name) && !self.exclude.as_ref().is_some_and(|e| e.is_match(name))
    }

    fn code(&self, scheme: CodeScheme) -> Option<&str> {
        match scheme {
            CodeScheme::Iso3 => Some(self.iso3.as_str()),
            CodeScheme::Iso2 => Some(self.iso2.as_str()),
            CodeScheme::NameShort | CodeScheme::Regex => Some(self.name_short.as_str()),
            CodeScheme::DacCode => self.dac_code.as_deref(),
        }
    }
}

/// The full reference table.
#[derive(Debug, Clone)]
pub struct CountryCatalog {
    entries: Vec<CountryEntry>,
}

impl CountryCatalog {
    /// The catalog compiled into the binary, parsed once per process.
    pub fn embedded() -> ResolveResult<&'static CountryCatalog> {
        CATALOG.get_or_try_init(|| Self::from_csv(EMBEDDED_CATALOG))
    }

    /// Parse a catalog from CSV text with the columns
    /// `iso3,iso2,name_short,regex,exclude,dac_code,income_level`.
    pub fn from_csv(content: &str) -> ResolveResult<Self> {
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut entries = Vec::new();

        for row in reader.deserialize::<CatalogRow>() {
            let row = row.map_err(|e| ResolveError::Catalog(e.to_string()))?;
            let pattern = name_pattern(&row.iso3, &row.regex)?;
            let exclude = match row.exclude.as_deref().filter(|e| !e.is_empty()) {
                Some(e) => Some(name_pattern(&row.iso3, e)?),
                None => None,
            };
            entries.push(CountryEntry {
                iso3: row.iso3,
                iso2: row.iso2,
                name_short: row.name_short,
                dac_code: row.dac_code.filter(|c| !c.is_empty()),
                income_level: row.income_level.filter(|c| !c.is_empty()),
                pattern,
                exclude,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CountryEntry] {
        &self.entries
    }

    /// Find a country by a value expressed in `scheme`.
    pub fn find(&self, value: &str, scheme: CodeScheme) -> Option<&CountryEntry> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match scheme {
            CodeScheme::Regex => self.entries.iter().find(|e| e.matches_name(value)),
            CodeScheme::Iso3 => self.entries.iter().find(|e| e.iso3.eq_ignore_ascii_case(value)),
            CodeScheme::Iso2 => self.entries.iter().find(|e| e.iso2.eq_ignore_ascii_case(value)),
            CodeScheme::NameShort => self
                .entries
                .iter()
                .find(|e| e.name_short.eq_ignore_ascii_case(value)),
            CodeScheme::DacCode => {
                let wanted = normalize_code(value);
                self.entries
                    .iter()
                    .find(|e| e.dac_code.as_deref().map(normalize_code) == Some(wanted.clone()))
            }
        }
    }
}

fn name_pattern(iso3: &str, source: &str) -> ResolveResult<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| ResolveError::InvalidPattern {
            iso3: iso3.to_string(),
            message: e.to_string(),
        })
}

/// `"302.0"` and `"302"` name the same DAC code.
fn normalize_code(code: &str) -> String {
    let code = code.trim();
    code.strip_suffix(".0").unwrap_or(code).to_string()
}

impl CodeService for CountryCatalog {
    fn convert(&self, value: &str, from: CodeScheme, to: CodeScheme) -> Option<String> {
        self.find(value, from)
            .and_then(|e| e.code(to))
            .map(str::to_string)
    }

    fn income_level(&self, iso3: &str) -> Option<String> {
        self.find(iso3, CodeScheme::Iso3)
            .and_then(|e| e.income_level.clone())
    }
}
