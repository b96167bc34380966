use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rent_roll::baseline_loss_to_lease;
use crate::growth::grow;
use crate::scenario::Scenario;
use crate::types::{LineAmount, Money};
use crate::UnderwritingResult;

/// Top of the operating statement for one projection year.
///
/// `net_rental_income` always equals
/// `gross_potential_rent − vacancy − loss_to_lease − concessions − bad_debt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueYear {
    pub year: u32,
    pub gross_potential_rent: Money,
    pub vacancy: Money,
    pub loss_to_lease: Money,
    pub concessions: Money,
    pub bad_debt: Money,
    pub net_rental_income: Money,
    pub other_income: Vec<LineAmount>,
    pub other_income_total: Money,
    pub effective_gross_income: Money,
}

/// Project rental and other income for years `1..=years`.
///
/// Errors only when a growth rate compounds a line out of range.
pub fn project_revenue(scenario: &Scenario, years: u32) -> UnderwritingResult<Vec<RevenueYear>> {
    let g = &scenario.growth;
    let rent_growth = g.annual_rent_growth;
    let expense_growth = g.annual_expense_growth;

    let gpr_base: Money = scenario
        .rent_roll
        .iter()
        .map(|u| u.market_rent * Decimal::from(12))
        .sum();
    let ltl_base = baseline_loss_to_lease(&scenario.rent_roll);
    let ltl_rate = g.loss_to_lease_policy.rate_for(rent_growth, expense_growth);
    let concessions_rate = g.concessions_policy.rate_for(rent_growth, expense_growth);

    (1..=years)
        .map(|year| -> UnderwritingResult<RevenueYear> {
            let gross_potential_rent = grow("Gross potential rent", gpr_base, rent_growth, year)?;
            let vacancy = gross_potential_rent * g.vacancy_rate;
            let loss_to_lease = grow("Loss to lease", ltl_base, ltl_rate, year)?;
            let concessions = grow("Concessions", g.concessions_annual, concessions_rate, year)?;
            let bad_debt = gross_potential_rent * g.bad_debt_rate;
            let net_rental_income =
                gross_potential_rent - vacancy - loss_to_lease - concessions - bad_debt;

            let other_income = scenario
                .other_income
                .iter()
                .map(|line| -> UnderwritingResult<LineAmount> {
                    let rate = line.growth_policy().rate_for(rent_growth, expense_growth);
                    let amount = grow(&line.name, line.annual_amount, rate, year)?;
                    Ok(LineAmount::new(&line.name, amount))
                })
                .collect::<UnderwritingResult<Vec<_>>>()?;
            let other_income_total: Money = other_income.iter().map(|l| l.amount).sum();

            Ok(RevenueYear {
                year,
                gross_potential_rent,
                vacancy,
                loss_to_lease,
                concessions,
                bad_debt,
                net_rental_income,
                other_income,
                other_income_total,
                effective_gross_income: net_rental_income + other_income_total,
            })
        })
        .collect()
}
