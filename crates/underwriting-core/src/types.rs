use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Dollar amounts. Never f64.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples such as a 1.85x equity multiple or a gross rent multiplier
pub type Multiple = Decimal;

/// A named amount in a per-year breakdown (expense line, loan payoff, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAmount {
    pub name: String,
    pub amount: Money,
}

impl LineAmount {
    pub fn new(name: impl Into<String>, amount: Money) -> Self {
        LineAmount {
            name: name.into(),
            amount,
        }
    }
}

/// Sensitivity sweep over min..=max by step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityVariable {
    pub name: String,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Envelope returned by every public operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Wrap a result with its methodology, assumptions, warnings and timing
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

/// `numerator / denominator`, or `None` when the denominator is zero.
///
/// Every derived ratio in the engine goes through this so a degenerate
/// input surfaces as "not applicable" rather than 0 or a panic.
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

/// Like [`ratio`] but also `None` for a negative denominator.
pub fn positive_ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator <= Decimal::ZERO {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratio_zero_denominator_is_none() {
        assert_eq!(ratio(dec!(10), Decimal::ZERO), None);
        assert_eq!(ratio(dec!(10), dec!(4)), Some(dec!(2.5)));
    }

    #[test]
    fn test_positive_ratio_rejects_negative_denominator() {
        assert_eq!(positive_ratio(dec!(10), dec!(-5)), None);
        assert_eq!(positive_ratio(dec!(-10), dec!(5)), Some(dec!(-2)));
    }
}
