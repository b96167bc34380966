use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::revenue::RevenueYear;
use crate::growth::grow;
use crate::scenario::{ReservePlacement, Scenario};
use crate::types::{LineAmount, Money};
use crate::UnderwritingResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseYear {
    pub year: u32,
    /// Named lines after growth
    pub lines: Vec<LineAmount>,
    pub operating_expenses: Money,
    pub management_fee: Money,
    /// Zero when reserves sit below NOI
    pub replacement_reserves: Money,
    pub total_expenses: Money,
}

/// Annual reserve requirement: per-unit amount × units, held flat.
pub fn annual_reserves(scenario: &Scenario) -> Money {
    scenario.sale.capex_reserve_per_unit_per_year * Decimal::from(scenario.unit_count())
}

/// Project operating expenses against the matching revenue years.
///
/// The management fee is indexed to each year's net rental income.
pub fn project_expenses(
    scenario: &Scenario,
    revenue: &[RevenueYear],
) -> UnderwritingResult<Vec<ExpenseYear>> {
    let g = &scenario.growth;
    let reserves = match scenario.sale.reserve_placement {
        ReservePlacement::AboveNoi => annual_reserves(scenario),
        ReservePlacement::BelowNoi => Decimal::ZERO,
    };

    revenue
        .iter()
        .map(|rev| -> UnderwritingResult<ExpenseYear> {
            let lines = scenario
                .expenses
                .iter()
                .map(|line| -> UnderwritingResult<LineAmount> {
                    let rate = line
                        .growth_policy()
                        .rate_for(g.annual_rent_growth, g.annual_expense_growth);
                    let amount = grow(&line.name, line.annual_amount, rate, rev.year)?;
                    Ok(LineAmount::new(&line.name, amount))
                })
                .collect::<UnderwritingResult<Vec<_>>>()?;
            let operating_expenses: Money = lines.iter().map(|l| l.amount).sum();
            let management_fee = g.management_fee_percent * rev.net_rental_income;

            Ok(ExpenseYear {
                year: rev.year,
                lines,
                operating_expenses,
                management_fee,
                replacement_reserves: reserves,
                total_expenses: operating_expenses + management_fee + reserves,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::GrowthPolicy;
    use crate::operations::revenue::project_revenue;
    use crate::scenario::{ExpenseCategory, ExpenseLine, Unit};
    use rust_decimal_macros::dec;

    fn scenario() -> Scenario {
        let mut s = Scenario::default();
        s.property.units = 10;
        s.rent_roll = (0..10)
            .map(|i| Unit {
                id: i.to_string(),
                market_rent: dec!(1000),
                in_place_rent: dec!(1000),
                ..Default::default()
            })
            .collect();
        s.growth.annual_expense_growth = dec!(0.02);
        s.growth.management_fee_percent = dec!(0.04);
        s.sale.capex_reserve_per_unit_per_year = dec!(250);
        s.expenses = vec![
            ExpenseLine {
                name: "Taxes".into(),
                category: ExpenseCategory::PropertyTaxes,
                annual_amount: dec!(20000),
                growth: None,
            },
            ExpenseLine {
                name: "Insurance".into(),
                category: ExpenseCategory::Insurance,
                annual_amount: dec!(8000),
                growth: Some(GrowthPolicy::Fixed(dec!(0.05))),
            },
        ];
        s
    }

    #[test]
    fn test_lines_fee_and_reserves() {
        let s = scenario();
        let rev = project_revenue(&s, 2).unwrap();
        let exp = project_expenses(&s, &rev).unwrap();

        assert_eq!(exp[0].operating_expenses, dec!(28000));
        assert_eq!(exp[0].management_fee, dec!(4800));
        assert_eq!(exp[0].replacement_reserves, dec!(2500));
        assert_eq!(exp[0].total_expenses, dec!(35300));

        assert_eq!(exp[1].lines[0].amount, dec!(20400));
        assert_eq!(exp[1].lines[1].amount, dec!(8400));
    }

    #[test]
    fn test_reserves_below_noi_are_excluded() {
        let mut s = scenario();
        s.sale.reserve_placement = ReservePlacement::BelowNoi;
        let rev = project_revenue(&s, 1).unwrap();
        let exp = project_expenses(&s, &rev).unwrap();
        assert_eq!(exp[0].replacement_reserves, Decimal::ZERO);
        assert_eq!(exp[0].total_expenses, dec!(32800));
    }

    #[test]
    fn test_management_fee_tracks_net_rental_income() {
        let mut s = scenario();
        s.growth.vacancy_rate = dec!(0.10);
        let rev = project_revenue(&s, 1).unwrap();
        let exp = project_expenses(&s, &rev).unwrap();
        // 4% of (120,000 − 12,000)
        assert_eq!(exp[0].management_fee, dec!(4320));
    }
}
