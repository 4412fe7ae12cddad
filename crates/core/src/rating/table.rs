//! The rating table: base rates, multipliers, discount schedules, age loading
//! and tax.
//!
//! A table is built once at start-up, either from the built-in standard
//! schedule or from a TOML file, and is only ever read afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Toml},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Age loading rule: a percentage surcharge per year beyond a threshold age,
/// saturating at a maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeLoading {
    pub threshold_years: u32,
    pub rate_per_excess_year: Decimal,
    pub max_percent: Decimal,
}

impl AgeLoading {
    /// Loading percentage for a property of the given age.
    pub fn percent_for(&self, property_age: u32) -> Decimal {
        if property_age <= self.threshold_years {
            return Decimal::ZERO;
        }
        let excess = Decimal::from(property_age - self.threshold_years);
        (excess * self.rate_per_excess_year).min(self.max_percent)
    }
}

/// Immutable premium rating table.
///
/// Rates are per thousand of sum insured; multipliers are plain factors;
/// discounts, age loading and tax are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    base_rates: BTreeMap<String, Decimal>,
    construction_multipliers: BTreeMap<String, Decimal>,
    occupancy_multipliers: BTreeMap<String, Decimal>,
    #[serde(default)]
    location_multipliers: BTreeMap<String, Decimal>,
    #[serde(default)]
    safety_discounts: BTreeMap<String, Decimal>,
    #[serde(default)]
    security_discounts: BTreeMap<String, Decimal>,
    age_loading: AgeLoading,
    tax_rate: Decimal,
}

fn schedule(entries: &[(&str, Decimal)]) -> BTreeMap<String, Decimal> {
    entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

impl Default for RateTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RateTable {
    /// The standard fire tariff schedule.
    pub fn standard() -> Self {
        Self {
            base_rates: schedule(&[
                ("residential", dec!(0.50)),
                ("commercial", dec!(0.75)),
                ("industrial", dec!(1.00)),
            ]),
            construction_multipliers: schedule(&[
                ("pucca", dec!(0.8)),
                ("semi-pucca", dec!(1.0)),
                ("kutcha", dec!(1.5)),
            ]),
            occupancy_multipliers: schedule(&[
                ("own-residence", dec!(0.9)),
                ("rented-residence", dec!(1.0)),
                ("office", dec!(1.1)),
                ("shop", dec!(1.2)),
                ("warehouse", dec!(1.0)),
                ("manufacturing", dec!(1.4)),
                ("educational", dec!(0.95)),
                ("healthcare", dec!(1.1)),
            ]),
            location_multipliers: schedule(&[
                ("mumbai", dec!(1.2)),
                ("delhi", dec!(1.1)),
                ("kolkata", dec!(1.1)),
                ("chennai", dec!(1.1)),
                ("maharashtra", dec!(1.05)),
                ("gujarat", dec!(1.0)),
                ("karnataka", dec!(1.0)),
                ("tamil-nadu", dec!(1.0)),
                ("west-bengal", dec!(1.05)),
                ("uttar-pradesh", dec!(0.95)),
                ("rajasthan", dec!(0.9)),
                ("madhya-pradesh", dec!(0.9)),
                ("bihar", dec!(0.85)),
                ("odisha", dec!(0.85)),
                ("andhra-pradesh", dec!(0.9)),
                ("telangana", dec!(0.9)),
                ("kerala", dec!(1.0)),
                ("punjab", dec!(0.95)),
                ("haryana", dec!(0.95)),
                ("jharkhand", dec!(0.85)),
                ("chhattisgarh", dec!(0.85)),
                ("uttarakhand", dec!(0.9)),
                ("himachal-pradesh", dec!(0.9)),
                ("goa", dec!(1.0)),
                ("assam", dec!(0.85)),
                ("arunachal-pradesh", dec!(0.8)),
                ("manipur", dec!(0.8)),
                ("meghalaya", dec!(0.8)),
                ("mizoram", dec!(0.8)),
                ("nagaland", dec!(0.8)),
                ("sikkim", dec!(0.8)),
                ("tripura", dec!(0.8)),
            ]),
            safety_discounts: schedule(&[
                ("fire-extinguisher", dec!(2)),
                ("smoke-detector", dec!(3)),
                ("sprinkler-system", dec!(5)),
                ("fire-alarm", dec!(4)),
            ]),
            security_discounts: schedule(&[("security-guard", dec!(3)), ("cctv", dec!(2)), ("burglar-alarm", dec!(2))]),
            age_loading: AgeLoading { threshold_years: 10, rate_per_excess_year: dec!(0.5), max_percent: dec!(25) },
            tax_rate: dec!(18),
        }
    }

    /// Load a rate table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` if the file cannot be read or parsed,
    /// and `ConfigError::Invalid` if any rate is negative.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let table: Self = Figment::from(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        table.validate()?;

        tracing::info!(
            path = %path.as_ref().display(),
            property_types = table.base_rates.len(),
            locations = table.location_multipliers.len(),
            "loaded rate table"
        );

        Ok(table)
    }

    /// Reject tables that could produce negative amounts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let schedules = [
            ("baseRates", &self.base_rates),
            ("constructionMultipliers", &self.construction_multipliers),
            ("occupancyMultipliers", &self.occupancy_multipliers),
            ("locationMultipliers", &self.location_multipliers),
            ("safetyDiscounts", &self.safety_discounts),
            ("securityDiscounts", &self.security_discounts),
        ];
        for (field, entries) in schedules {
            if let Some((key, _)) = entries.iter().find(|(_, v)| v.is_sign_negative()) {
                return Err(ConfigError::Invalid { field: format!("{field}.{key}"), reason: "must not be negative".into() });
            }
        }

        if self.base_rates.is_empty() {
            return Err(ConfigError::Invalid { field: "baseRates".into(), reason: "must not be empty".into() });
        }
        if self.age_loading.rate_per_excess_year.is_sign_negative() || self.age_loading.max_percent.is_sign_negative() {
            return Err(ConfigError::Invalid { field: "ageLoading".into(), reason: "must not be negative".into() });
        }
        if self.tax_rate.is_sign_negative() {
            return Err(ConfigError::Invalid { field: "taxRate".into(), reason: "must not be negative".into() });
        }

        Ok(())
    }

    pub fn base_rate(&self, property_type: &str) -> Option<Decimal> {
        self.base_rates.get(property_type).copied()
    }

    pub fn construction_multiplier(&self, construction_type: &str) -> Option<Decimal> {
        self.construction_multipliers.get(construction_type).copied()
    }

    pub fn occupancy_multiplier(&self, occupancy_type: &str) -> Option<Decimal> {
        self.occupancy_multipliers.get(occupancy_type).copied()
    }

    /// Location factor; unrecognised locations rate as 1.0.
    pub fn location_multiplier(&self, location: &str) -> Decimal {
        self.location_multipliers.get(location).copied().unwrap_or(Decimal::ONE)
    }

    pub fn safety_discount(&self, feature: &str) -> Option<Decimal> {
        self.safety_discounts.get(feature).copied()
    }

    pub fn security_discount(&self, feature: &str) -> Option<Decimal> {
        self.security_discounts.get(feature).copied()
    }

    pub fn age_loading(&self) -> &AgeLoading {
        &self.age_loading
    }

    /// GST percentage.
    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }
}
