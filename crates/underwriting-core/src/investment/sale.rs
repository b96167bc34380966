use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::financing::instruments::FinancingInstrument;
use crate::operations::noi::NoiYear;
use crate::scenario::{GrowthAssumptions, Scenario};
use crate::types::*;
use crate::UnderwritingResult;

pub const FIRST_EXIT_YEAR: u32 = 5;
pub const LAST_EXIT_YEAR: u32 = 10;

/// Largest reversion priced; keeps the equity cash flows summable.
pub const MAX_SALE_PRICE: Decimal = dec!(100_000_000_000_000_000_000_000);

/// Reversion at the end of `exit_year`, priced on the following year's NOI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleYear {
    pub exit_year: u32,
    pub forward_noi: Money,
    pub exit_cap_rate: Rate,
    /// `None` when the exit cap rate is not positive
    pub gross_sale_price: Option<Money>,
    pub selling_costs: Option<Money>,
    pub loan_payoffs: Vec<LineAmount>,
    pub total_loan_payoff: Money,
    /// May be negative when the debt exceeds the net price
    pub net_sale_proceeds: Option<Money>,
    pub price_per_unit: Option<Money>,
}

/// `forward_noi / exit_cap_rate`; a non-positive cap rate is an input error,
/// as is a price too large to represent.
pub fn gross_sale_price(forward_noi: Money, exit_cap_rate: Rate) -> UnderwritingResult<Money> {
    if exit_cap_rate <= Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "exit_cap_rate".into(),
            reason: "Exit cap rate must be positive".into(),
        });
    }
    forward_noi
        .checked_div(exit_cap_rate)
        .filter(|price| price.abs() <= MAX_SALE_PRICE)
        .ok_or_else(|| UnderwritingError::InvalidInput {
            field: "exit_cap_rate".into(),
            reason: format!("Cap rate {exit_cap_rate} prices the sale out of range"),
        })
}

/// Linear interpolation between the 5-year and 10-year exit caps, flat
/// outside that window. A missing (zero) end falls back to the other.
pub fn exit_cap_rate_for_year(growth: &GrowthAssumptions, exit_year: u32) -> Rate {
    let cap5 = growth.exit_cap_rate_5yr;
    let cap10 = growth.exit_cap_rate_10yr;
    match (cap5.is_zero(), cap10.is_zero()) {
        (false, true) => return cap5,
        (true, false) => return cap10,
        _ => {}
    }
    if exit_year <= FIRST_EXIT_YEAR {
        return cap5;
    }
    if exit_year >= LAST_EXIT_YEAR {
        return cap10;
    }
    let progress = Decimal::from(exit_year - FIRST_EXIT_YEAR) / dec!(5);
    cap5 + (cap10 - cap5) * progress
}

/// Sale analysis for one exit year; `None` when the NOI projection does not
/// reach the forward year.
pub fn sale_for_year(
    scenario: &Scenario,
    instruments: &[FinancingInstrument],
    noi: &[NoiYear],
    exit_year: u32,
    warnings: &mut Vec<String>,
) -> Option<SaleYear> {
    let forward_noi = noi.iter().find(|n| n.year == exit_year + 1)?.noi;
    let exit_cap_rate = exit_cap_rate_for_year(&scenario.growth, exit_year);

    let gross = match gross_sale_price(forward_noi, exit_cap_rate) {
        Ok(price) => Some(price),
        Err(e) => {
            warnings.push(format!("Year {exit_year} sale not priced: {e}"));
            None
        }
    };
    let selling_costs = gross.map(|p| p * scenario.sale.selling_costs_percent);

    let loan_payoffs: Vec<LineAmount> = instruments
        .iter()
        .map(|i| LineAmount::new(i.kind().label(), i.balance_after_year(exit_year)))
        .collect();
    let total_loan_payoff: Money = loan_payoffs.iter().map(|l| l.amount).sum();

    let net_sale_proceeds = match (gross, selling_costs) {
        (Some(p), Some(c)) => Some(p - c - total_loan_payoff),
        _ => None,
    };
    if matches!(net_sale_proceeds, Some(n) if n < Decimal::ZERO) {
        warnings.push(format!(
            "Year {exit_year} sale proceeds do not cover the loan payoff"
        ));
    }

    Some(SaleYear {
        exit_year,
        forward_noi,
        exit_cap_rate,
        gross_sale_price: gross,
        selling_costs,
        loan_payoffs,
        total_loan_payoff,
        net_sale_proceeds,
        price_per_unit: gross.and_then(|p| ratio(p, Decimal::from(scenario.unit_count()))),
    })
}

/// Sale analysis for each exit year from 5 through 10 inside the horizon.
pub fn analyze_sales(
    scenario: &Scenario,
    noi: &[NoiYear],
    projection_years: u32,
    warnings: &mut Vec<String>,
) -> Vec<SaleYear> {
    let instruments = scenario.financing.instruments();
    (FIRST_EXIT_YEAR..=LAST_EXIT_YEAR.min(projection_years))
        .filter_map(|year| sale_for_year(scenario, &instruments, noi, year, warnings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financing::instruments::LoanTerms;
    use rust_decimal_macros::dec;

    fn noi_years(base: Money, years: u32) -> Vec<NoiYear> {
        (1..=years)
            .map(|year| NoiYear {
                year,
                effective_gross_income: base,
                total_expenses: Decimal::ZERO,
                noi: base + Decimal::from(year) * dec!(10_000),
                expense_ratio: None,
                noi_per_unit: None,
                noi_growth: None,
            })
            .collect()
    }

    #[test]
    fn test_gross_price_and_selling_costs() {
        let price = gross_sale_price(dec!(400_000), dec!(0.06)).unwrap();
        assert!((price - dec!(6_666_666.67)).abs() < dec!(0.01));
        let net_of_costs = price - price * dec!(0.02);
        assert!((net_of_costs - dec!(6_533_333.33)).abs() < dec!(0.01));
    }

    #[test]
    fn test_non_positive_cap_rate_is_error() {
        assert!(gross_sale_price(dec!(400_000), Decimal::ZERO).is_err());
        assert!(gross_sale_price(dec!(400_000), dec!(-0.01)).is_err());
    }

    #[test]
    fn test_vanishing_cap_rate_is_error() {
        let tiny = Decimal::new(1, 27);
        assert!(gross_sale_price(dec!(400_000), tiny).is_err());
    }

    #[test]
    fn test_cap_rate_interpolation() {
        let g = GrowthAssumptions {
            exit_cap_rate_5yr: dec!(0.06),
            exit_cap_rate_10yr: dec!(0.07),
            ..Default::default()
        };
        assert_eq!(exit_cap_rate_for_year(&g, 3), dec!(0.06));
        assert_eq!(exit_cap_rate_for_year(&g, 5), dec!(0.06));
        assert_eq!(exit_cap_rate_for_year(&g, 7), dec!(0.064));
        assert_eq!(exit_cap_rate_for_year(&g, 10), dec!(0.07));

        let only_five = GrowthAssumptions {
            exit_cap_rate_5yr: dec!(0.055),
            ..Default::default()
        };
        assert_eq!(exit_cap_rate_for_year(&only_five, 10), dec!(0.055));
    }

    #[test]
    fn test_sales_cover_years_five_through_ten() {
        let mut s = Scenario::default();
        s.property.units = 10;
        s.growth.exit_cap_rate_5yr = dec!(0.06);
        s.growth.exit_cap_rate_10yr = dec!(0.065);
        s.sale.selling_costs_percent = dec!(0.02);
        s.financing.seller_financing = Some(LoanTerms {
            principal: dec!(1_000_000),
            annual_rate: dec!(0.05),
            interest_only: true,
            ..Default::default()
        });
        let mut warnings = Vec::new();
        let sales = analyze_sales(&s, &noi_years(dec!(300_000), 11), 10, &mut warnings);

        assert_eq!(sales.len(), 6);
        assert_eq!(sales[0].exit_year, 5);
        assert_eq!(sales[0].forward_noi, dec!(360_000));
        assert_eq!(sales[0].gross_sale_price, Some(dec!(6_000_000)));
        assert_eq!(sales[0].total_loan_payoff, dec!(1_000_000));
        assert_eq!(sales[0].net_sale_proceeds, Some(dec!(4_880_000)));
        assert_eq!(sales[0].price_per_unit, Some(dec!(600_000)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_short_horizon_has_no_standard_exits() {
        let mut warnings = Vec::new();
        let sales = analyze_sales(&Scenario::default(), &noi_years(dec!(1), 5), 4, &mut warnings);
        assert!(sales.is_empty());
    }

    #[test]
    fn test_zero_cap_rate_surfaces_as_none_with_warning() {
        let s = Scenario::default();
        let mut warnings = Vec::new();
        let sale = sale_for_year(&s, &[], &noi_years(dec!(100_000), 6), 5, &mut warnings).unwrap();
        assert_eq!(sale.gross_sale_price, None);
        assert_eq!(sale.net_sale_proceeds, None);
        assert_eq!(warnings.len(), 1);
    }
}
