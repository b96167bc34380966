use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::cash_flow::CashFlowYear;
use super::sale::SaleYear;
use crate::error::UnderwritingError;
use crate::operations::noi::NoiYear;
use crate::time_value::{irr, npv, DEFAULT_IRR_GUESS};
use crate::types::*;
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Returns on one cash flow vector (index 0 = initial investment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnResult {
    pub exit_year: u32,
    pub cash_flows: Vec<Money>,
    /// `None` when the solver finds no rate; never reported as 0
    pub irr: Option<Rate>,
    pub equity_multiple: Option<Multiple>,
    pub total_distributions: Money,
    pub total_profit: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npv: Option<Money>,
}

/// Input for standalone return metrics on an arbitrary cash flow vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsInput {
    pub cash_flows: Vec<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guess: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsOutput {
    pub irr: Option<Rate>,
    pub npv: Option<Money>,
    pub equity_multiple: Option<Multiple>,
    pub total_invested: Money,
    pub total_distributions: Money,
    pub total_profit: Money,
    pub periods: u32,
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// `Σ positive flows / |initial investment|`; `None` without an outflow at t = 0.
pub fn equity_multiple(cash_flows: &[Money]) -> Option<Multiple> {
    let initial = *cash_flows.first()?;
    if initial >= Decimal::ZERO {
        return None;
    }
    let inflows: Money = cash_flows.iter().filter(|cf| **cf > Decimal::ZERO).copied().sum();
    ratio(inflows, initial.abs())
}

/// `[-equity, CF_1, …, CF_n + net_sale]` for an exit at the end of year `n`.
pub fn build_equity_cash_flows(
    initial_equity: Money,
    annual: &[Money],
    exit_year: u32,
    net_sale_proceeds: Money,
) -> Vec<Money> {
    let n = (exit_year as usize).min(annual.len());
    let mut flows = Vec::with_capacity(n + 1);
    flows.push(-initial_equity);
    flows.extend_from_slice(&annual[..n]);
    if let Some(last) = flows.last_mut() {
        if n > 0 {
            *last += net_sale_proceeds;
        }
    }
    flows
}

/// IRR with failure mapped to `None` and a warning naming the context.
pub fn irr_or_none(cash_flows: &[Money], context: &str, warnings: &mut Vec<String>) -> Option<Rate> {
    match irr(cash_flows, DEFAULT_IRR_GUESS) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warn!(context, error = %e, "IRR did not converge");
            warnings.push(format!("{context}: IRR not available ({e})"));
            None
        }
    }
}

/// Full return metrics for one cash flow vector.
pub fn summarize_returns(
    exit_year: u32,
    cash_flows: Vec<Money>,
    discount_rate: Option<Rate>,
    context: &str,
    warnings: &mut Vec<String>,
) -> ReturnResult {
    let irr = irr_or_none(&cash_flows, context, warnings);
    let npv = discount_rate.and_then(|r| npv(r, &cash_flows).ok());
    let total_distributions: Money = cash_flows
        .iter()
        .skip(1)
        .filter(|cf| **cf > Decimal::ZERO)
        .copied()
        .sum();

    ReturnResult {
        exit_year,
        irr,
        equity_multiple: equity_multiple(&cash_flows),
        total_distributions,
        total_profit: cash_flows.iter().copied().sum(),
        npv,
        cash_flows,
    }
}

/// Equity returns for a sale at `sale.exit_year`; `None` if the sale was not priced.
pub fn levered_returns(
    required_equity: Money,
    cash_flows: &[CashFlowYear],
    sale: &SaleYear,
    discount_rate: Option<Rate>,
    warnings: &mut Vec<String>,
) -> Option<ReturnResult> {
    let net_sale = sale.net_sale_proceeds?;
    let annual: Vec<Money> = cash_flows.iter().map(|c| c.before_tax_cash_flow).collect();
    let flows = build_equity_cash_flows(required_equity, &annual, sale.exit_year, net_sale);
    let context = format!("Levered {}-year exit", sale.exit_year);
    Some(summarize_returns(sale.exit_year, flows, discount_rate, &context, warnings))
}

/// Property-level returns: `[-total cost, NOI_1, …, NOI_n + price − selling costs]`.
pub fn unlevered_returns(
    total_acquisition_cost: Money,
    noi: &[NoiYear],
    sale: &SaleYear,
    discount_rate: Option<Rate>,
    warnings: &mut Vec<String>,
) -> Option<ReturnResult> {
    let net_of_costs = sale.gross_sale_price? - sale.selling_costs?;
    let annual: Vec<Money> = noi.iter().map(|n| n.noi).collect();
    let flows = build_equity_cash_flows(total_acquisition_cost, &annual, sale.exit_year, net_of_costs);
    let context = format!("Unlevered {}-year exit", sale.exit_year);
    Some(summarize_returns(sale.exit_year, flows, discount_rate, &context, warnings))
}

// ---------------------------------------------------------------------------
// Standalone entry point
// ---------------------------------------------------------------------------

/// IRR, NPV and equity multiple for an arbitrary annual cash flow vector.
pub fn calculate_returns(
    input: &ReturnsInput,
) -> UnderwritingResult<ComputationOutput<ReturnsOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.cash_flows.len() < 2 {
        return Err(UnderwritingError::InsufficientData(
            "At least two cash flows are required".into(),
        ));
    }
    if let Some(rate) = input.discount_rate {
        if rate <= Decimal::NEGATIVE_ONE {
            return Err(UnderwritingError::InvalidInput {
                field: "discount_rate".into(),
                reason: "Discount rate must be greater than -100%".into(),
            });
        }
    }

    let irr_value = match irr(&input.cash_flows, input.guess.unwrap_or(DEFAULT_IRR_GUESS)) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warnings.push(format!("IRR not available: {e}"));
            None
        }
    };
    let npv_value = match input.discount_rate {
        Some(rate) => Some(npv(rate, &input.cash_flows)?),
        None => None,
    };

    let total_invested: Money = input
        .cash_flows
        .iter()
        .filter(|cf| cf.is_sign_negative())
        .map(|cf| cf.abs())
        .sum();
    let total_distributions: Money = input
        .cash_flows
        .iter()
        .filter(|cf| **cf > Decimal::ZERO)
        .copied()
        .sum();

    let output = ReturnsOutput {
        irr: irr_value,
        npv: npv_value,
        equity_multiple: equity_multiple(&input.cash_flows),
        total_invested,
        total_distributions,
        total_profit: total_distributions - total_invested,
        periods: (input.cash_flows.len() - 1) as u32,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Newton-Raphson IRR, NPV and equity multiple on annual cash flows",
        input,
        warnings,
        elapsed,
        output,
    ))
}
