use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::scenario::Scenario;
use crate::types::*;

/// Cash the partners must bring to close, and who brings it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityInvestment {
    pub total_acquisition_cost: Money,
    pub total_debt: Money,
    /// Negative when the debt stack exceeds the cost to close
    pub required_equity: Money,
    pub lp_equity: Money,
    pub gp_equity: Money,
    pub lp_share: Rate,
    pub gp_share: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesAndUses {
    pub sources: Vec<LineAmount>,
    pub uses: Vec<LineAmount>,
    pub total_sources: Money,
    pub total_uses: Money,
    pub balanced: bool,
}

/// `required_equity = total_acquisition_cost − total_debt`, split LP/GP.
///
/// The GP takes whatever the LP share leaves, so the two always add back
/// to the required equity.
pub fn compute_equity(scenario: &Scenario, warnings: &mut Vec<String>) -> EquityInvestment {
    let total_acquisition_cost =
        scenario.acquisition_cost_before_fees() + scenario.financing.total_origination_fees();
    let total_debt = scenario.financing.total_principal();
    let required_equity = total_acquisition_cost - total_debt;

    if required_equity < Decimal::ZERO {
        warnings.push(format!(
            "Debt ({total_debt}) exceeds total acquisition cost ({total_acquisition_cost}); \
             no equity is required"
        ));
    }

    let terms = &scenario.waterfall;
    if terms.lp_equity_share + terms.gp_equity_share != Decimal::ONE {
        warnings.push(format!(
            "LP/GP equity shares sum to {}; GP share set to {}",
            terms.lp_equity_share + terms.gp_equity_share,
            Decimal::ONE - terms.lp_equity_share
        ));
    }
    let lp_share = terms.lp_equity_share;
    let gp_share = Decimal::ONE - lp_share;
    let lp_equity = required_equity * lp_share;

    EquityInvestment {
        total_acquisition_cost,
        total_debt,
        required_equity,
        lp_equity,
        gp_equity: required_equity - lp_equity,
        lp_share,
        gp_share,
    }
}

/// Sources and uses of funds at closing.
pub fn sources_and_uses(scenario: &Scenario, equity: &EquityInvestment) -> SourcesAndUses {
    let acq = &scenario.acquisition;

    let mut uses = vec![LineAmount::new("Purchase Price", scenario.property.purchase_price)];
    let optional_uses = [
        ("Closing Costs", acq.closing_costs),
        ("Acquisition Fee", acq.acquisition_fee),
        ("Renovation Budget", acq.renovation_budget),
        ("Upfront Reserves", acq.upfront_reserves),
        ("Loan Origination Fees", scenario.financing.total_origination_fees()),
    ];
    for (name, amount) in optional_uses {
        if !amount.is_zero() {
            uses.push(LineAmount::new(name, amount));
        }
    }

    let mut sources: Vec<LineAmount> = scenario
        .financing
        .instruments()
        .iter()
        .map(|i| LineAmount::new(i.kind().label(), i.principal()))
        .collect();
    let lp = equity.lp_equity.max(Decimal::ZERO);
    let gp = equity.gp_equity.max(Decimal::ZERO);
    if !lp.is_zero() {
        sources.push(LineAmount::new("LP Equity", lp));
    }
    if !gp.is_zero() {
        sources.push(LineAmount::new("GP Equity", gp));
    }

    let total_sources: Money = sources.iter().map(|l| l.amount).sum();
    let total_uses: Money = uses.iter().map(|l| l.amount).sum();

    SourcesAndUses {
        sources,
        uses,
        total_sources,
        total_uses,
        balanced: total_sources == total_uses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financing::instruments::{DscrLoanTerms, LoanTerms};
    use rust_decimal_macros::dec;

    fn scenario() -> Scenario {
        let mut s = Scenario::default();
        s.property.purchase_price = dec!(5_000_000);
        s.acquisition.closing_costs = dec!(100_000);
        s.acquisition.renovation_budget = dec!(250_000);
        s.financing.dscr_loan = Some(DscrLoanTerms {
            loan: LoanTerms {
                principal: dec!(3_750_000),
                annual_rate: dec!(0.06),
                amortization_years: 30,
                ..Default::default()
            },
            min_dscr: None,
            origination_fee_percent: dec!(0.01),
        });
        s.waterfall.lp_equity_share = dec!(0.9);
        s.waterfall.gp_equity_share = dec!(0.1);
        s
    }

    #[test]
    fn test_required_equity_and_split() {
        let mut warnings = Vec::new();
        let eq = compute_equity(&scenario(), &mut warnings);
        // 5.0M + 100k + 250k + 37.5k fee − 3.75M
        assert_eq!(eq.total_acquisition_cost, dec!(5_387_500));
        assert_eq!(eq.required_equity, dec!(1_637_500));
        assert_eq!(eq.lp_equity, dec!(1_473_750));
        assert_eq!(eq.gp_equity, dec!(163_750));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_share_mismatch_gives_gp_the_complement() {
        let mut s = scenario();
        s.waterfall.gp_equity_share = dec!(0.2);
        let mut warnings = Vec::new();
        let eq = compute_equity(&s, &mut warnings);
        assert_eq!(eq.gp_share, dec!(0.1));
        assert_eq!(eq.lp_equity + eq.gp_equity, eq.required_equity);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_sources_and_uses_balance() {
        let s = scenario();
        let mut warnings = Vec::new();
        let eq = compute_equity(&s, &mut warnings);
        let su = sources_and_uses(&s, &eq);
        assert!(su.balanced);
        assert_eq!(su.total_uses, dec!(5_387_500));
        assert!(su.uses.iter().any(|l| l.name == "Loan Origination Fees"));
        assert!(su.sources.iter().any(|l| l.name == "DSCR Loan"));
    }

    #[test]
    fn test_over_financed_deal_is_unbalanced() {
        let mut s = scenario();
        s.property.purchase_price = dec!(3_000_000);
        let mut warnings = Vec::new();
        let eq = compute_equity(&s, &mut warnings);
        assert!(eq.required_equity < Decimal::ZERO);
        assert!(!sources_and_uses(&s, &eq).balanced);
        assert!(!warnings.is_empty());
    }
}
