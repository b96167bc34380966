use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::types::{Money, Rate};
use crate::UnderwritingResult;

/// Ceiling on any single projected line amount. Leaves headroom for the
/// sums, ratios and sale pricing built on top of it.
pub const MAX_PROJECTED_AMOUNT: Decimal = dec!(100_000_000_000_000_000_000);

/// How a line item moves from its year-0 baseline over the projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum GrowthPolicy {
    /// Held at the baseline every year
    #[default]
    Flat,
    /// Compounds at the scenario's annual rent growth
    RentGrowth,
    /// Compounds at the scenario's annual expense growth
    ExpenseGrowth,
    /// Compounds at its own fixed annual rate
    Fixed(Rate),
}

impl GrowthPolicy {
    /// Resolve the policy to a concrete annual rate.
    pub fn rate_for(&self, rent_growth: Rate, expense_growth: Rate) -> Rate {
        match self {
            GrowthPolicy::Flat => Decimal::ZERO,
            GrowthPolicy::RentGrowth => rent_growth,
            GrowthPolicy::ExpenseGrowth => expense_growth,
            GrowthPolicy::Fixed(rate) => *rate,
        }
    }
}

/// Compounding factor `(1 + rate)^(year - 1)`; year 1 is the baseline year.
///
/// `None` when the factor overflows `Decimal`.
pub fn growth_factor(rate: Rate, year: u32) -> Option<Decimal> {
    if year <= 1 || rate.is_zero() {
        return Some(Decimal::ONE);
    }
    (Decimal::ONE + rate).checked_powi(i64::from(year - 1))
}

/// `baseline × (1+g)^(year-1)` for the line `name`.
///
/// Errors once the amount passes `MAX_PROJECTED_AMOUNT`.
pub fn grow(name: &str, baseline: Money, growth_rate: Rate, year: u32) -> UnderwritingResult<Money> {
    growth_factor(growth_rate, year)
        .and_then(|factor| baseline.checked_mul(factor))
        .filter(|amount| amount.abs() <= MAX_PROJECTED_AMOUNT)
        .ok_or_else(|| UnderwritingError::InvalidInput {
            field: name.to_string(),
            reason: format!(
                "Growth of {growth_rate} projects past the representable range by year {year}"
            ),
        })
}

/// Project a year-0 baseline over `years` years: `baseline × (1+g)^(i-1)`.
///
/// Zero and negative growth (contraction) are valid inputs.
pub fn project(baseline: Money, growth_rate: Rate, years: u32) -> UnderwritingResult<Vec<Money>> {
    (1..=years)
        .map(|year| grow("baseline", baseline, growth_rate, year))
        .collect()
}
