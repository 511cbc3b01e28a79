//! Domain vocabulary shared by every stage.
//!
//! - [`Indicator`] - the two compared metrics
//! - [`SourceGranularity`] - which climate-finance breakdowns survive formatting
//! - [`columns`] - canonical column names
//! - [`DEFAULT_SMALL_MULTIPLE_COUNTRIES`], [`G20_MEMBERS`] - default rosters

use serde::{Deserialize, Serialize};

/// Canonical column names.
pub mod columns {
    pub const YEAR: &str = "year";
    pub const VALUE: &str = "value";
    pub const COUNTRY_NAME: &str = "country_name";
    pub const PROVIDER_NAME: &str = "provider_name";
    pub const ISO3_CODE: &str = "iso3_code";
    pub const INCOME_LEVEL: &str = "income_level";
    pub const UNITS: &str = "units";
    pub const CURRENCY: &str = "currency";
    pub const MARKER: &str = "marker";
    pub const METHODOLOGY: &str = "methodology";
    pub const MECHANISM: &str = "mechanism";
    pub const BENEFICIARY: &str = "beneficiary";
    pub const FUEL_TYPE: &str = "fuel_type";
    pub const CLIMATE_FINANCE: &str = "climate_finance_commitments";
    pub const FOSSIL_FUEL_SUBSIDIES: &str = "fossil_fuel_subsidies";

    /// Category columns that may carry "all" aggregate rows.
    pub const CATEGORIES: [&str; 5] = [MECHANISM, BENEFICIARY, FUEL_TYPE, METHODOLOGY, MARKER];
}

/// Sentinel written into category columns of aggregate rows.
pub const ALL: &str = "all";

/// The two metrics compared in every chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    ClimateFinanceCommitments,
    FossilFuelSubsidies,
}

impl Indicator {
    /// Both indicators, in chart order.
    pub const ALL: [Indicator; 2] = [Indicator::ClimateFinanceCommitments, Indicator::FossilFuelSubsidies];

    /// Column name in the analysis tables.
    pub fn column(&self) -> &'static str {
        match self {
            Indicator::ClimateFinanceCommitments => columns::CLIMATE_FINANCE,
            Indicator::FossilFuelSubsidies => columns::FOSSIL_FUEL_SUBSIDIES,
        }
    }

    /// Human-readable label used in the chart tables.
    pub fn label(&self) -> &'static str {
        match self {
            Indicator::ClimateFinanceCommitments => "climate finance commitments",
            Indicator::FossilFuelSubsidies => "fossil fuel subsidies",
        }
    }

    /// Subsidies are drawn as downward bars, so their values are negated.
    pub fn is_negated(&self) -> bool {
        matches!(self, Indicator::FossilFuelSubsidies)
    }
}

/// How much breakdown the canonical climate-finance table keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceGranularity {
    /// One row per (year, provider).
    #[default]
    ProviderOnly,
    /// One row per (year, provider, marker).
    ProviderMarker,
    /// One row per (year, provider, methodology, marker).
    ProviderMethodology,
}

impl SourceGranularity {
    /// Category columns kept beside (year, provider_name).
    pub fn category_columns(&self) -> &'static [&'static str] {
        match self {
            SourceGranularity::ProviderOnly => &[],
            SourceGranularity::ProviderMarker => &[columns::MARKER],
            SourceGranularity::ProviderMethodology => &[columns::METHODOLOGY, columns::MARKER],
        }
    }
}

/// Countries shown in the small-multiple chart unless configured otherwise.
pub const DEFAULT_SMALL_MULTIPLE_COUNTRIES: [&str; 9] =
    ["USA", "FRA", "DEU", "GBR", "ITA", "CAN", "JPN", "SAU", "ARE"];

/// G20 members as named in donor lists; `EUI` is the EU institutions.
pub const G20_MEMBERS: [&str; 20] = [
    "Argentina",
    "Australia",
    "Brazil",
    "Canada",
    "China",
    "France",
    "Germany",
    "India",
    "Indonesia",
    "Italy",
    "Japan",
    "Mexico",
    "Russia",
    "Saudi Arabia",
    "South Africa",
    "South Korea",
    "Turkey",
    "United Kingdom",
    "United States",
    "EUI",
];

/// DAC code of the EU institutions.
pub const EU_INSTITUTIONS_DAC_CODE: &str = "918";
