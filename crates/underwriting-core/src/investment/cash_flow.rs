use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::equity::EquityInvestment;
use crate::financing::metrics::FinancingMetrics;
use crate::operations::expenses::annual_reserves;
use crate::operations::noi::NoiYear;
use crate::scenario::{ReservePlacement, Scenario};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowYear {
    pub year: u32,
    pub noi: Money,
    pub debt_service_by_instrument: Vec<LineAmount>,
    pub total_debt_service: Money,
    pub interest_paid: Money,
    pub principal_paid: Money,
    /// Only non-zero when reserves sit below NOI
    pub capex_reserves: Money,
    pub before_tax_cash_flow: Money,
    pub dscr: Option<Rate>,
    pub cash_on_cash: Option<Rate>,
    pub cumulative_cash_flow: Money,
}

/// `before_tax_cash_flow = noi − total_debt_service − capex_reserves` for
/// each NOI year. A matured loan stops drawing debt service.
pub fn project_cash_flows(
    scenario: &Scenario,
    noi: &[NoiYear],
    financing: &FinancingMetrics,
    equity: &EquityInvestment,
    warnings: &mut Vec<String>,
) -> Vec<CashFlowYear> {
    warn_on_balloons(scenario, noi.len() as u32, warnings);

    let capex_reserves = match scenario.sale.reserve_placement {
        ReservePlacement::BelowNoi => annual_reserves(scenario),
        ReservePlacement::AboveNoi => Decimal::ZERO,
    };

    let mut cumulative = Decimal::ZERO;
    noi.iter()
        .zip(&financing.schedule)
        .map(|(n, ds)| {
            let before_tax_cash_flow = n.noi - ds.total_debt_service - capex_reserves;
            cumulative += before_tax_cash_flow;

            CashFlowYear {
                year: n.year,
                noi: n.noi,
                debt_service_by_instrument: ds.by_instrument.clone(),
                total_debt_service: ds.total_debt_service,
                interest_paid: ds.interest,
                principal_paid: ds.principal,
                capex_reserves,
                before_tax_cash_flow,
                dscr: ratio(n.noi, ds.total_debt_service),
                cash_on_cash: positive_ratio(before_tax_cash_flow, equity.required_equity),
                cumulative_cash_flow: cumulative,
            }
        })
        .collect()
}

fn warn_on_balloons(scenario: &Scenario, years: u32, warnings: &mut Vec<String>) {
    let horizon_months = years.saturating_mul(12);
    for inst in scenario.financing.instruments() {
        let (Some(maturity), Some(balloon)) = (inst.maturity_months(), inst.balloon_balance())
        else {
            continue;
        };
        if maturity < horizon_months && balloon > Decimal::ZERO {
            let label = inst.kind().label();
            warn!(instrument = label, maturity, %balloon, "balloon matures inside projection");
            warnings.push(format!(
                "{label} matures in month {maturity} with an unfunded balloon of {}; \
                 debt service drops to zero and the balance is repaid at sale",
                balloon.round_dp(2)
            ));
        }
    }
}
