//! Quote input and its form-level validation rules.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Smallest accepted sum insured.
pub const MIN_SUM_INSURED: u64 = 1_000;

/// Largest accepted sum insured.
pub const MAX_SUM_INSURED: u64 = 100_000_000;

/// Occupancy types offered for each property type.
const OCCUPANCY_BY_PROPERTY: &[(&str, &[&str])] = &[
    ("residential", &["own-residence", "rented-residence"]),
    ("commercial", &["office", "shop", "warehouse", "educational", "healthcare"]),
    ("industrial", &["manufacturing", "warehouse"]),
];

/// Occupancy types allowed for a property type, or `None` for an unknown
/// property type.
pub fn allowed_occupancies(property_type: &str) -> Option<&'static [&'static str]> {
    OCCUPANCY_BY_PROPERTY
        .iter()
        .find(|(p, _)| *p == property_type)
        .map(|(_, occupancies)| *occupancies)
}

/// Property attributes a premium is rated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInput {
    /// residential, commercial or industrial.
    pub property_type: String,

    /// Declared property value, in whole rupees.
    pub sum_insured: u64,

    /// City or state code, e.g. "delhi" or "tamil-nadu".
    pub location: String,

    /// pucca, semi-pucca or kutcha.
    pub construction_type: String,

    /// Age of the building in years.
    #[serde(default)]
    pub property_age: u32,

    /// Occupancy code; must suit the property type.
    pub occupancy_type: String,

    /// Fire safety installations, e.g. "sprinkler-system".
    #[serde(default, alias = "fireSafety")]
    pub fire_safety_features: BTreeSet<String>,

    /// Security installations, e.g. "cctv".
    #[serde(default, alias = "security")]
    pub security_features: BTreeSet<String>,
}

impl QuoteInput {
    /// Check the input the way the quote form does before rating.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` naming the first offending field if:
    /// - a required text field is blank
    /// - `sum_insured` is outside 1,000..=100,000,000
    /// - `occupancy_type` is not offered for `property_type`
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("propertyType", &self.property_type),
            ("location", &self.location),
            ("constructionType", &self.construction_type),
            ("occupancyType", &self.occupancy_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::validation(field, "is required"));
            }
        }

        if self.sum_insured < MIN_SUM_INSURED || self.sum_insured > MAX_SUM_INSURED {
            return Err(Error::validation(
                "sumInsured",
                format!("must be between {MIN_SUM_INSURED} and {MAX_SUM_INSURED}"),
            ));
        }

        let allowed = allowed_occupancies(&self.property_type)
            .ok_or_else(|| Error::validation("propertyType", format!("unknown property type '{}'", self.property_type)))?;
        if !allowed.contains(&self.occupancy_type.as_str()) {
            return Err(Error::validation(
                "occupancyType",
                format!("'{}' is not offered for {} property", self.occupancy_type, self.property_type),
            ));
        }

        Ok(())
    }
}
