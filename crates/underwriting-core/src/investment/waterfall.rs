use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::cash_flow::CashFlowYear;
use super::returns::{equity_multiple, irr_or_none};
use super::sale::SaleYear;
use crate::error::UnderwritingError;
use crate::types::*;
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// How unpaid preferred return grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefAccrual {
    /// Unpaid pref earns pref
    #[default]
    Compounding,
    /// Pref accrues on unreturned capital only
    Simple,
}

/// LP/GP deal terms. The default is a single-class structure: all equity
/// from the LP, no pref, no promote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterfallTerms {
    pub preferred_return: Rate,
    pub pref_accrual: PrefAccrual,
    pub lp_equity_share: Rate,
    pub gp_equity_share: Rate,
    /// Split while capital is being returned
    pub lp_split_pre_pref: Rate,
    pub gp_split_pre_pref: Rate,
    /// Split of residual cash once capital is back
    pub lp_split_after_pref: Rate,
    pub gp_promote_after_pref: Rate,
    /// GP share of cash in the catch-up tier, if the deal has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gp_catch_up: Option<Rate>,
}

impl Default for WaterfallTerms {
    fn default() -> Self {
        WaterfallTerms {
            preferred_return: Decimal::ZERO,
            pref_accrual: PrefAccrual::Compounding,
            lp_equity_share: Decimal::ONE,
            gp_equity_share: Decimal::ZERO,
            lp_split_pre_pref: Decimal::ONE,
            gp_split_pre_pref: Decimal::ZERO,
            lp_split_after_pref: Decimal::ONE,
            gp_promote_after_pref: Decimal::ZERO,
            gp_catch_up: None,
        }
    }
}

impl WaterfallTerms {
    /// Split inconsistencies; the GP side always takes the complement.
    pub fn check(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let pre = self.lp_split_pre_pref + self.gp_split_pre_pref;
        if pre != Decimal::ONE {
            warnings.push(format!(
                "Pre-pref split sums to {pre}; GP receives the complement of the LP split"
            ));
        }
        let post = self.lp_split_after_pref + self.gp_promote_after_pref;
        if post != Decimal::ONE {
            warnings.push(format!(
                "Post-pref split sums to {post}; GP receives the complement of the LP split"
            ));
        }
        if self.preferred_return < Decimal::ZERO {
            warnings.push("Negative preferred return treated as zero".into());
        }
        if let Some(share) = self.gp_catch_up.filter(|s| *s > Decimal::ONE) {
            warnings.push(format!("GP catch-up share {share} exceeds 100%; capped at 100%"));
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One year of distributions. `lp_distribution + gp_distribution` always
/// equals `distributable_cash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallYear {
    pub year: u32,
    pub distributable_cash: Money,
    pub lp_pref_accrual: Money,
    pub lp_pref_paid: Money,
    pub lp_return_of_capital: Money,
    pub gp_return_of_capital: Money,
    pub gp_catch_up: Money,
    /// LP side of the catch-up tier (zero for a full catch-up)
    pub lp_catch_up: Money,
    pub lp_promote_split: Money,
    pub gp_promote: Money,
    pub lp_distribution: Money,
    pub gp_distribution: Money,
    pub unpaid_pref_balance: Money,
    pub lp_capital_outstanding: Money,
    pub gp_capital_outstanding: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub exit_year: u32,
    pub years: Vec<WaterfallYear>,
    pub lp_cash_flows: Vec<Money>,
    pub gp_cash_flows: Vec<Money>,
    pub lp_irr: Option<Rate>,
    pub gp_irr: Option<Rate>,
    pub lp_equity_multiple: Option<Multiple>,
    pub gp_equity_multiple: Option<Multiple>,
    pub total_lp_distributions: Money,
    pub total_gp_distributions: Money,
}

/// Standalone waterfall over a given distributable cash vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallInput {
    #[serde(default)]
    pub terms: WaterfallTerms,
    pub lp_equity: Money,
    pub gp_equity: Money,
    /// Years 1..n; the last entry should include sale proceeds
    pub distributable_cash: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Distributable cash for an exit: each year's BTCF, with net sale
/// proceeds added to the exit year. `None` when the sale was not priced.
pub fn distributable_cash(cash_flows: &[CashFlowYear], sale: &SaleYear) -> Option<Vec<Money>> {
    let net_sale = sale.net_sale_proceeds?;
    let n = (sale.exit_year as usize).min(cash_flows.len());
    if n == 0 {
        return None;
    }
    let mut cash: Vec<Money> = cash_flows[..n].iter().map(|c| c.before_tax_cash_flow).collect();
    if let Some(last) = cash.last_mut() {
        *last += net_sale;
    }
    Some(cash)
}

struct PartnerState {
    lp_capital: Money,
    gp_capital: Money,
    unpaid_pref: Money,
    cumulative_pref_paid: Money,
    cumulative_catch_up: Money,
}

/// Run the annual waterfall: pref, return of capital, optional catch-up,
/// then the promote split. Negative cash is a capital call.
pub fn distribute(
    terms: &WaterfallTerms,
    lp_equity: Money,
    gp_equity: Money,
    distributable: &[Money],
) -> Vec<WaterfallYear> {
    let pref_rate = terms.preferred_return.max(Decimal::ZERO);
    let mut state = PartnerState {
        lp_capital: lp_equity.max(Decimal::ZERO),
        gp_capital: gp_equity.max(Decimal::ZERO),
        unpaid_pref: Decimal::ZERO,
        cumulative_pref_paid: Decimal::ZERO,
        cumulative_catch_up: Decimal::ZERO,
    };

    distributable
        .iter()
        .enumerate()
        .map(|(i, &cash)| distribute_year(terms, pref_rate, &mut state, i as u32 + 1, cash))
        .collect()
}

fn distribute_year(
    terms: &WaterfallTerms,
    pref_rate: Rate,
    state: &mut PartnerState,
    year: u32,
    cash: Money,
) -> WaterfallYear {
    // 1. Accrue
    let accrual_base = match terms.pref_accrual {
        PrefAccrual::Compounding => state.lp_capital + state.unpaid_pref,
        PrefAccrual::Simple => state.lp_capital,
    };
    let lp_pref_accrual = accrual_base * pref_rate;
    state.unpaid_pref += lp_pref_accrual;

    let mut row = WaterfallYear {
        year,
        distributable_cash: cash,
        lp_pref_accrual,
        lp_pref_paid: Decimal::ZERO,
        lp_return_of_capital: Decimal::ZERO,
        gp_return_of_capital: Decimal::ZERO,
        gp_catch_up: Decimal::ZERO,
        lp_catch_up: Decimal::ZERO,
        lp_promote_split: Decimal::ZERO,
        gp_promote: Decimal::ZERO,
        lp_distribution: Decimal::ZERO,
        gp_distribution: Decimal::ZERO,
        unpaid_pref_balance: Decimal::ZERO,
        lp_capital_outstanding: Decimal::ZERO,
        gp_capital_outstanding: Decimal::ZERO,
    };

    if cash < Decimal::ZERO {
        // Capital call at the pre-pref split
        let lp_call = cash * terms.lp_split_pre_pref;
        state.lp_capital -= lp_call;
        state.gp_capital -= cash - lp_call;
        row.lp_distribution = lp_call;
    } else {
        let mut remaining = cash;

        // 2. Pref
        let pref_paid = remaining.min(state.unpaid_pref);
        state.unpaid_pref -= pref_paid;
        state.cumulative_pref_paid += pref_paid;
        remaining -= pref_paid;
        row.lp_pref_paid = pref_paid;

        // 3. Return of capital
        if remaining > Decimal::ZERO
            && state.lp_capital > Decimal::ZERO
            && terms.lp_split_pre_pref > Decimal::ZERO
        {
            let needed = state.lp_capital / terms.lp_split_pre_pref;
            let (tier_cash, lp_roc) = if remaining >= needed {
                (needed, state.lp_capital)
            } else {
                (remaining, remaining * terms.lp_split_pre_pref)
            };
            let gp_roc = tier_cash - lp_roc;
            state.lp_capital -= lp_roc;
            state.gp_capital = (state.gp_capital - gp_roc).max(Decimal::ZERO);
            remaining -= tier_cash;
            row.lp_return_of_capital = lp_roc;
            row.gp_return_of_capital = gp_roc;
        }

        // 4. Catch-up
        let catch_up_share = terms
            .gp_catch_up
            .filter(|s| *s > Decimal::ZERO)
            .map(|s| s.min(Decimal::ONE));
        if let Some(share) = catch_up_share {
            if remaining > Decimal::ZERO && terms.lp_split_after_pref > Decimal::ZERO {
                let target = terms.gp_promote_after_pref / terms.lp_split_after_pref
                    * state.cumulative_pref_paid;
                let owed = (target - state.cumulative_catch_up).max(Decimal::ZERO);
                if owed > Decimal::ZERO {
                    let needed = owed / share;
                    let (tier_cash, gp_cu) = if remaining >= needed {
                        (needed, owed)
                    } else {
                        (remaining, remaining * share)
                    };
                    state.cumulative_catch_up += gp_cu;
                    remaining -= tier_cash;
                    row.gp_catch_up = gp_cu;
                    row.lp_catch_up = tier_cash - gp_cu;
                }
            }
        }

        // 5. Promote
        row.lp_promote_split = remaining * terms.lp_split_after_pref;
        row.gp_promote = remaining - row.lp_promote_split;

        row.lp_distribution =
            row.lp_pref_paid + row.lp_return_of_capital + row.lp_catch_up + row.lp_promote_split;
    }

    row.gp_distribution = cash - row.lp_distribution;
    row.unpaid_pref_balance = state.unpaid_pref;
    row.lp_capital_outstanding = state.lp_capital;
    row.gp_capital_outstanding = state.gp_capital;
    row
}

/// Distribute and derive LP/GP cash flows, IRRs and multiples.
pub fn run_waterfall(
    terms: &WaterfallTerms,
    lp_equity: Money,
    gp_equity: Money,
    distributable: &[Money],
    warnings: &mut Vec<String>,
) -> WaterfallResult {
    let years = distribute(terms, lp_equity, gp_equity, distributable);
    let exit_year = years.len() as u32;

    let mut lp_cash_flows = vec![-lp_equity];
    lp_cash_flows.extend(years.iter().map(|y| y.lp_distribution));
    let mut gp_cash_flows = vec![-gp_equity];
    gp_cash_flows.extend(years.iter().map(|y| y.gp_distribution));

    let lp_irr = if lp_equity > Decimal::ZERO {
        irr_or_none(&lp_cash_flows, &format!("LP {exit_year}-year waterfall"), warnings)
    } else {
        None
    };
    let gp_irr = if gp_equity > Decimal::ZERO {
        irr_or_none(&gp_cash_flows, &format!("GP {exit_year}-year waterfall"), warnings)
    } else {
        None
    };

    WaterfallResult {
        exit_year,
        lp_irr,
        gp_irr,
        lp_equity_multiple: equity_multiple(&lp_cash_flows),
        gp_equity_multiple: equity_multiple(&gp_cash_flows),
        total_lp_distributions: years.iter().map(|y| y.lp_distribution).sum(),
        total_gp_distributions: years.iter().map(|y| y.gp_distribution).sum(),
        years,
        lp_cash_flows,
        gp_cash_flows,
    }
}

/// Validated entry point returning the standard envelope.
pub fn calculate_waterfall(
    input: &WaterfallInput,
) -> UnderwritingResult<ComputationOutput<WaterfallResult>> {
    let start = Instant::now();

    if input.lp_equity < Decimal::ZERO || input.gp_equity < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "lp_equity/gp_equity".into(),
            reason: "Equity contributions cannot be negative".into(),
        });
    }
    if input.lp_equity.is_zero() && input.gp_equity.is_zero() {
        return Err(UnderwritingError::FinancialImpossibility(
            "Waterfall has no invested equity to return".into(),
        ));
    }
    if input.distributable_cash.is_empty() {
        return Err(UnderwritingError::InsufficientData(
            "At least one year of distributable cash is required".into(),
        ));
    }

    let mut warnings = input.terms.check();
    let result = run_waterfall(
        &input.terms,
        input.lp_equity,
        input.gp_equity,
        &input.distributable_cash,
        &mut warnings,
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annual LP/GP waterfall: preferred return, return of capital, catch-up, promote",
        &input.terms,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn promote_terms() -> WaterfallTerms {
        WaterfallTerms {
            preferred_return: dec!(0.08),
            pref_accrual: PrefAccrual::Compounding,
            lp_equity_share: dec!(0.9),
            gp_equity_share: dec!(0.1),
            lp_split_pre_pref: dec!(0.9),
            gp_split_pre_pref: dec!(0.1),
            lp_split_after_pref: dec!(0.7),
            gp_promote_after_pref: dec!(0.3),
            gp_catch_up: None,
        }
    }

    fn assert_no_leakage(years: &[WaterfallYear]) {
        for y in years {
            assert_eq!(
                y.lp_distribution + y.gp_distribution,
                y.distributable_cash,
                "Leakage in year {}",
                y.year
            );
        }
    }

    #[test]
    fn test_pref_shortfall_goes_entirely_to_lp() {
        let terms = WaterfallTerms {
            preferred_return: dec!(0.08),
            ..promote_terms()
        };
        let years = distribute(&terms, dec!(1_000_000), Decimal::ZERO, &[dec!(50_000)]);
        let y1 = &years[0];
        assert_eq!(y1.lp_pref_accrual, dec!(80_000));
        assert_eq!(y1.lp_pref_paid, dec!(50_000));
        assert_eq!(y1.lp_distribution, dec!(50_000));
        assert_eq!(y1.gp_distribution, Decimal::ZERO);
        assert_eq!(y1.unpaid_pref_balance, dec!(30_000));
    }

    #[test]
    fn test_compounding_vs_simple_accrual() {
        let cash = [Decimal::ZERO, Decimal::ZERO];
        let compounding = distribute(&promote_terms(), dec!(1_000_000), Decimal::ZERO, &cash);
        assert_eq!(compounding[1].lp_pref_accrual, dec!(86_400));

        let simple_terms = WaterfallTerms {
            pref_accrual: PrefAccrual::Simple,
            ..promote_terms()
        };
        let simple = distribute(&simple_terms, dec!(1_000_000), Decimal::ZERO, &cash);
        assert_eq!(simple[1].lp_pref_accrual, dec!(80_000));
        assert_eq!(simple[1].unpaid_pref_balance, dec!(160_000));
    }

    #[test]
    fn test_capital_returned_then_promote() {
        // LP 900k, GP 100k; exit cash 2M in year 1
        let years = distribute(&promote_terms(), dec!(900_000), dec!(100_000), &[dec!(2_000_000)]);
        let y = &years[0];
        assert_eq!(y.lp_pref_paid, dec!(72_000));
        assert_eq!(y.lp_return_of_capital, dec!(900_000));
        assert_eq!(y.gp_return_of_capital, dec!(100_000));
        assert_eq!(y.lp_capital_outstanding, Decimal::ZERO);
        // 2M − 72k − 1M = 928k residual at 70/30
        assert_eq!(y.lp_promote_split, dec!(649_600));
        assert_eq!(y.gp_promote, dec!(278_400));
        assert_no_leakage(&years);
    }

    #[test]
    fn test_full_catch_up() {
        let terms = WaterfallTerms {
            gp_catch_up: Some(Decimal::ONE),
            lp_split_pre_pref: Decimal::ONE,
            gp_split_pre_pref: Decimal::ZERO,
            lp_split_after_pref: dec!(0.8),
            gp_promote_after_pref: dec!(0.2),
            ..promote_terms()
        };
        let years = distribute(&terms, dec!(1_000_000), Decimal::ZERO, &[dec!(1_200_000)]);
        let y = &years[0];
        // Pref 80k, capital 1M, catch-up target 0.25 × 80k = 20k, residual 100k at 80/20
        assert_eq!(y.gp_catch_up, dec!(20_000));
        assert_eq!(y.lp_catch_up, Decimal::ZERO);
        assert_eq!(y.lp_promote_split, dec!(80_000));
        assert_eq!(y.gp_distribution, dec!(40_000));
        assert_no_leakage(&years);
    }

    #[test]
    fn test_catch_up_share_above_one_is_capped() {
        let terms = WaterfallTerms {
            gp_catch_up: Some(dec!(1.5)),
            lp_split_pre_pref: Decimal::ONE,
            gp_split_pre_pref: Decimal::ZERO,
            lp_split_after_pref: dec!(0.8),
            gp_promote_after_pref: dec!(0.2),
            ..promote_terms()
        };
        assert!(terms.check().iter().any(|w| w.contains("catch-up share 1.5")));

        // Same tiers as a full catch-up; the LP never funds the GP
        let years = distribute(&terms, dec!(1_000_000), Decimal::ZERO, &[dec!(1_200_000)]);
        let y = &years[0];
        assert_eq!(y.gp_catch_up, dec!(20_000));
        assert_eq!(y.lp_catch_up, Decimal::ZERO);
        assert_eq!(y.gp_distribution, dec!(40_000));
        assert_no_leakage(&years);
    }

    #[test]
    fn test_capital_call_increases_capital() {
        let years = distribute(
            &promote_terms(),
            dec!(900_000),
            dec!(100_000),
            &[dec!(-100_000), dec!(50_000)],
        );
        assert_eq!(years[0].lp_distribution, dec!(-90_000));
        assert_eq!(years[0].gp_distribution, dec!(-10_000));
        assert_eq!(years[0].lp_capital_outstanding, dec!(990_000));
        assert_eq!(years[0].gp_capital_outstanding, dec!(110_000));
        assert_no_leakage(&years);
    }

    #[test]
    fn test_run_waterfall_irrs() {
        let mut warnings = Vec::new();
        let result = run_waterfall(
            &promote_terms(),
            dec!(900_000),
            dec!(100_000),
            &[dec!(60_000), dec!(60_000), dec!(1_400_000)],
            &mut warnings,
        );
        assert_eq!(result.exit_year, 3);
        assert_eq!(result.lp_cash_flows.len(), 4);
        let lp_irr = result.lp_irr.unwrap();
        let gp_irr = result.gp_irr.unwrap();
        assert!(gp_irr > lp_irr, "Promote should lift GP IRR above LP IRR");
        assert_eq!(
            result.total_lp_distributions + result.total_gp_distributions,
            dec!(1_520_000)
        );
    }

    #[test]
    fn test_default_terms_send_everything_to_lp() {
        let years = distribute(
            &WaterfallTerms::default(),
            dec!(1_000_000),
            Decimal::ZERO,
            &[dec!(100_000), dec!(1_500_000)],
        );
        assert!(years.iter().all(|y| y.gp_distribution.is_zero()));
        assert_no_leakage(&years);
    }

    #[test]
    fn test_calculate_waterfall_validation() {
        let input = WaterfallInput {
            terms: promote_terms(),
            lp_equity: dec!(900_000),
            gp_equity: dec!(100_000),
            distributable_cash: vec![],
        };
        assert!(calculate_waterfall(&input).is_err());

        let no_equity = WaterfallInput {
            terms: promote_terms(),
            lp_equity: Decimal::ZERO,
            gp_equity: Decimal::ZERO,
            distributable_cash: vec![dec!(10_000)],
        };
        assert!(matches!(
            calculate_waterfall(&no_equity),
            Err(UnderwritingError::FinancialImpossibility(_))
        ));
    }
}
