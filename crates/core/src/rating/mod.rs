//! Fire premium rating.
//!
//! This module provides:
//!
//! - The immutable [`RateTable`] with the standard tariff schedule
//! - [`QuoteInput`] and its form-level validation
//! - The [`compute`] pipeline producing an itemized [`PremiumBreakdown`]

pub mod breakdown;
pub mod engine;
pub mod input;
pub mod table;

pub use breakdown::{LineItem, LineKind, PremiumBreakdown};
pub use engine::{MAX_TOTAL_DISCOUNT_PERCENT, compute};
pub use input::{MAX_SUM_INSURED, MIN_SUM_INSURED, QuoteInput, allowed_occupancies};
pub use table::{AgeLoading, RateTable};
