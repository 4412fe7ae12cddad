//! Premium rating pipeline.
//!
//! The steps run in a fixed order because multiplicative factors and the
//! additive age loading interact:
//!
//! 1. base premium from the per-thousand rate
//! 2. construction, occupancy and location factors
//! 3. age loading
//! 4. safety and security discounts, capped after summing
//! 5. net premium
//! 6. GST and total

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{PremiumBreakdown, QuoteInput, RateTable};
use crate::Error;

/// Hard ceiling on the combined safety and security discount, in percent.
pub const MAX_TOTAL_DISCOUNT_PERCENT: Decimal = dec!(20);

const HUNDRED: Decimal = dec!(100);

fn required(value: Option<Decimal>, dimension: &'static str, key: &str) -> Result<Decimal, Error> {
    value.ok_or_else(|| Error::UnknownRateKey { dimension, key: key.to_string() })
}

/// Sum the discounts of recognised features; unknown codes count as zero.
fn sum_discounts(features: &BTreeSet<String>, lookup: impl Fn(&str) -> Option<Decimal>) -> Decimal {
    features.iter().filter_map(|f| lookup(f)).sum()
}

/// Rate a quote.
///
/// Deterministic: the same table and input always give the same breakdown.
/// Bounds on the input are not checked here; see [`QuoteInput::validate`].
///
/// # Errors
///
/// Returns `Error::UnknownRateKey` if the property, construction or occupancy
/// type is not in the table. Unknown locations rate at 1.0 instead.
pub fn compute(table: &RateTable, input: &QuoteInput) -> Result<PremiumBreakdown, Error> {
    let base_rate = required(table.base_rate(&input.property_type), "propertyType", &input.property_type)?;
    let construction_multiplier = required(
        table.construction_multiplier(&input.construction_type),
        "constructionType",
        &input.construction_type,
    )?;
    let occupancy_multiplier =
        required(table.occupancy_multiplier(&input.occupancy_type), "occupancyType", &input.occupancy_type)?;
    let location_multiplier = table.location_multiplier(&input.location);

    let base_premium = Decimal::from(input.sum_insured) / dec!(1000) * base_rate;
    let pre_age_premium = base_premium * construction_multiplier * occupancy_multiplier * location_multiplier;

    let age_loading_percent = table.age_loading().percent_for(input.property_age);
    let adjusted_premium = pre_age_premium * (Decimal::ONE + age_loading_percent / HUNDRED);

    let safety_discount_percent = sum_discounts(&input.fire_safety_features, |f| table.safety_discount(f));
    let security_discount_percent = sum_discounts(&input.security_features, |f| table.security_discount(f));
    let total_discount_percent = (safety_discount_percent + security_discount_percent).min(MAX_TOTAL_DISCOUNT_PERCENT);

    let discount_amount = adjusted_premium * total_discount_percent / HUNDRED;
    let net_premium = adjusted_premium - discount_amount;

    let tax_amount = net_premium * table.tax_rate() / HUNDRED;
    let total_premium = net_premium + tax_amount;

    Ok(PremiumBreakdown {
        base_premium,
        construction_multiplier,
        occupancy_multiplier,
        location_multiplier,
        age_loading_percent,
        adjusted_premium,
        safety_discount_percent,
        security_discount_percent,
        total_discount_percent,
        discount_amount,
        net_premium,
        tax_amount,
        total_premium,
    })
}
