use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::expenses::ExpenseYear;
use super::revenue::RevenueYear;
use crate::types::{ratio, Money, Rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiYear {
    pub year: u32,
    pub effective_gross_income: Money,
    pub total_expenses: Money,
    pub noi: Money,
    pub expense_ratio: Option<Rate>,
    pub noi_per_unit: Option<Money>,
    /// Change against the prior year; none for year 1
    pub noi_growth: Option<Rate>,
}

/// `noi = net_rental_income + other_income − total_expenses`, year by year.
pub fn aggregate_noi(revenue: &[RevenueYear], expenses: &[ExpenseYear], units: u32) -> Vec<NoiYear> {
    let mut prior: Option<Money> = None;

    revenue
        .iter()
        .zip(expenses)
        .map(|(rev, exp)| {
            let noi = rev.net_rental_income + rev.other_income_total - exp.total_expenses;
            let noi_growth = prior.and_then(|p| ratio(noi - p, p));
            prior = Some(noi);

            NoiYear {
                year: rev.year,
                effective_gross_income: rev.effective_gross_income,
                total_expenses: exp.total_expenses,
                noi,
                expense_ratio: ratio(exp.total_expenses, rev.effective_gross_income),
                noi_per_unit: ratio(noi, Decimal::from(units)),
                noi_growth,
            }
        })
        .collect()
}
