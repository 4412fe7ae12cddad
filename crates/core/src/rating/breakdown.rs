//! Itemized premium breakdown.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How a line item's value should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Money,
    Factor,
    Percent,
}

/// One named entry of a breakdown, in rating order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub name: &'static str,
    pub value: Decimal,
    pub kind: LineKind,
}

/// Result of rating a quote, field order matching the rating pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumBreakdown {
    pub base_premium: Decimal,
    pub construction_multiplier: Decimal,
    pub occupancy_multiplier: Decimal,
    pub location_multiplier: Decimal,
    pub age_loading_percent: Decimal,
    pub adjusted_premium: Decimal,
    pub safety_discount_percent: Decimal,
    pub security_discount_percent: Decimal,
    pub total_discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub net_premium: Decimal,
    pub tax_amount: Decimal,
    pub total_premium: Decimal,
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl PremiumBreakdown {
    /// All line items in rating order.
    pub fn line_items(&self) -> Vec<LineItem> {
        use LineKind::*;
        [
            ("basePremium", self.base_premium, Money),
            ("constructionMultiplier", self.construction_multiplier, Factor),
            ("occupancyMultiplier", self.occupancy_multiplier, Factor),
            ("locationMultiplier", self.location_multiplier, Factor),
            ("ageLoadingPercent", self.age_loading_percent, Percent),
            ("adjustedPremium", self.adjusted_premium, Money),
            ("safetyDiscountPercent", self.safety_discount_percent, Percent),
            ("securityDiscountPercent", self.security_discount_percent, Percent),
            ("totalDiscountPercent", self.total_discount_percent, Percent),
            ("discountAmount", self.discount_amount, Money),
            ("netPremium", self.net_premium, Money),
            ("taxAmount", self.tax_amount, Money),
            ("totalPremium", self.total_premium, Money),
        ]
        .into_iter()
        .map(|(name, value, kind)| LineItem { name, value, kind })
        .collect()
    }

    /// Copy with every monetary amount rounded half-up to paise for display.
    ///
    /// Factors and percentages are left untouched.
    pub fn rounded(&self) -> Self {
        Self {
            base_premium: money(self.base_premium),
            adjusted_premium: money(self.adjusted_premium),
            discount_amount: money(self.discount_amount),
            net_premium: money(self.net_premium),
            tax_amount: money(self.tax_amount),
            total_premium: money(self.total_premium),
            ..self.clone()
        }
    }
}
