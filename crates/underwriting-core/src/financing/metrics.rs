use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::amortization::max_principal_for_payment;
use super::instruments::{FinancingInstrument, InstrumentKind};
use crate::operations::noi::NoiYear;
use crate::scenario::Scenario;
use crate::types::*;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Coverage test for the DSCR loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DscrCovenant {
    pub min_dscr: Rate,
    /// Year-1 DSCR of the whole stack
    pub actual_dscr: Option<Rate>,
    pub in_compliance: Option<bool>,
    /// Largest DSCR loan the year-1 NOI supports alongside the other debt
    pub max_supportable_principal: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetrics {
    pub kind: InstrumentKind,
    pub label: String,
    pub principal: Money,
    pub annual_rate: Rate,
    pub monthly_payment: Money,
    pub amortizing_payment: Money,
    pub annual_debt_service_year1: Money,
    pub maturity_month: Option<u32>,
    pub balloon_balance: Option<Money>,
    pub origination_fee: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covenant: Option<DscrCovenant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtServiceYear {
    pub year: u32,
    pub by_instrument: Vec<LineAmount>,
    pub total_debt_service: Money,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingMetrics {
    pub instruments: Vec<InstrumentMetrics>,
    pub total_debt: Money,
    pub total_monthly_payment: Money,
    pub total_annual_debt_service: Money,
    /// Principal-weighted
    pub blended_rate: Option<Rate>,
    pub debt_yield: Option<Rate>,
    pub ltv: Option<Rate>,
    pub dscr_year1: Option<Rate>,
    pub schedule: Vec<DebtServiceYear>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Per-instrument terms, blended year-1 figures, and the annual debt
/// service schedule over the NOI projection.
pub fn analyze_financing(
    scenario: &Scenario,
    noi: &[NoiYear],
    warnings: &mut Vec<String>,
) -> FinancingMetrics {
    let instruments = scenario.financing.instruments();
    for inst in &instruments {
        warnings.extend(inst.check());
    }

    let noi_year1 = noi.first().map(|n| n.noi).unwrap_or(Decimal::ZERO);
    let total_debt: Money = instruments.iter().map(|i| i.principal()).sum();
    let total_monthly_payment: Money = instruments.iter().map(|i| i.monthly_payment()).sum();
    let total_annual_debt_service: Money =
        instruments.iter().map(|i| i.debt_service_for_year(1)).sum();
    let weighted_rate: Decimal = instruments
        .iter()
        .map(|i| i.principal() * i.annual_rate())
        .sum();
    let dscr_year1 = ratio(noi_year1, total_annual_debt_service);

    let instrument_metrics = instruments
        .iter()
        .map(|inst| {
            let covenant = match inst {
                FinancingInstrument::DscrLoan(terms) => terms
                    .min_dscr
                    .filter(|m| *m > Decimal::ZERO)
                    .map(|min_dscr| {
                        dscr_covenant(inst, &instruments, min_dscr, noi_year1, dscr_year1, warnings)
                    }),
                _ => None,
            };
            InstrumentMetrics {
                kind: inst.kind(),
                label: inst.kind().label().to_string(),
                principal: inst.principal(),
                annual_rate: inst.annual_rate(),
                monthly_payment: inst.monthly_payment(),
                amortizing_payment: inst.amortizing_payment(),
                annual_debt_service_year1: inst.debt_service_for_year(1),
                maturity_month: inst.maturity_months(),
                balloon_balance: inst.balloon_balance(),
                origination_fee: inst.origination_fee(),
                covenant,
            }
        })
        .collect();

    let schedule = noi
        .iter()
        .map(|n| debt_service_year(&instruments, n.year))
        .collect();

    FinancingMetrics {
        instruments: instrument_metrics,
        total_debt,
        total_monthly_payment,
        total_annual_debt_service,
        blended_rate: ratio(weighted_rate, total_debt),
        debt_yield: ratio(noi_year1, total_debt),
        ltv: positive_ratio(total_debt, scenario.property.purchase_price),
        dscr_year1,
        schedule,
    }
}

/// Debt service, interest and principal of every instrument in `year`.
pub fn debt_service_year(instruments: &[FinancingInstrument], year: u32) -> DebtServiceYear {
    let by_instrument: Vec<LineAmount> = instruments
        .iter()
        .map(|i| LineAmount::new(i.kind().label(), i.debt_service_for_year(year)))
        .collect();
    let principal: Money = instruments.iter().map(|i| i.principal_for_year(year)).sum();
    let total_debt_service: Money = by_instrument.iter().map(|l| l.amount).sum();

    DebtServiceYear {
        year,
        total_debt_service,
        interest: total_debt_service - principal,
        principal,
        ending_balance: instruments.iter().map(|i| i.balance_after_year(year)).sum(),
        by_instrument,
    }
}

fn dscr_covenant(
    loan: &FinancingInstrument,
    stack: &[FinancingInstrument],
    min_dscr: Rate,
    noi_year1: Money,
    actual_dscr: Option<Rate>,
    warnings: &mut Vec<String>,
) -> DscrCovenant {
    let in_compliance = actual_dscr.map(|d| d >= min_dscr);
    if in_compliance == Some(false) {
        warnings.push(format!(
            "DSCR Loan: year-1 DSCR {:.2} is below the {:.2} covenant",
            actual_dscr.unwrap_or_default(),
            min_dscr
        ));
    }

    let other_debt_service: Money = stack
        .iter()
        .filter(|i| i.kind() != InstrumentKind::DscrLoan)
        .map(|i| i.debt_service_for_year(1))
        .sum();
    let max_monthly = (noi_year1 / min_dscr - other_debt_service) / dec!(12);

    let max_supportable_principal = match loan {
        FinancingInstrument::DscrLoan(terms) => {
            let t = &terms.loan;
            if max_monthly <= Decimal::ZERO {
                Some(Decimal::ZERO)
            } else if t.interest_only || t.amortization_years == 0 || t.interest_only_years > 0 {
                // Sized on the interest-only payment
                ratio(max_monthly * dec!(12), t.annual_rate)
            } else {
                Some(max_principal_for_payment(
                    max_monthly,
                    t.annual_rate,
                    t.amortization_years.saturating_mul(12),
                ))
            }
        }
        _ => None,
    };

    DscrCovenant {
        min_dscr,
        actual_dscr,
        in_compliance,
        max_supportable_principal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financing::instruments::{DscrLoanTerms, LoanTerms};
    use rust_decimal_macros::dec;

    fn noi_years(noi: Money, years: u32) -> Vec<NoiYear> {
        (1..=years)
            .map(|year| NoiYear {
                year,
                effective_gross_income: noi,
                total_expenses: Decimal::ZERO,
                noi,
                expense_ratio: None,
                noi_per_unit: None,
                noi_growth: None,
            })
            .collect()
    }

    fn dscr_scenario() -> Scenario {
        let mut s = Scenario::default();
        s.property.purchase_price = dec!(5_000_000);
        s.financing.dscr_loan = Some(DscrLoanTerms {
            loan: LoanTerms {
                principal: dec!(3_750_000),
                annual_rate: dec!(0.06),
                amortization_years: 30,
                ..Default::default()
            },
            min_dscr: Some(dec!(1.25)),
            origination_fee_percent: dec!(0.01),
        });
        s
    }

    #[test]
    fn test_blended_year_one_metrics() {
        let mut warnings = Vec::new();
        let m = analyze_financing(&dscr_scenario(), &noi_years(dec!(350_000), 5), &mut warnings);

        assert_eq!(m.total_debt, dec!(3_750_000));
        assert_eq!(m.ltv, Some(dec!(0.75)));
        assert_eq!(m.blended_rate, Some(dec!(0.06)));
        assert!((m.total_annual_debt_service - dec!(269_798)).abs() < dec!(1));
        let dscr = m.dscr_year1.unwrap();
        assert!((dscr - dec!(1.30)).abs() < dec!(0.01), "DSCR {dscr}");
        assert_eq!(m.schedule.len(), 5);

        let covenant = m.instruments[0].covenant.as_ref().unwrap();
        assert_eq!(covenant.in_compliance, Some(true));
        assert!(covenant.max_supportable_principal.unwrap() > dec!(3_750_000));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_covenant_breach_warns() {
        let mut warnings = Vec::new();
        let m = analyze_financing(&dscr_scenario(), &noi_years(dec!(300_000), 1), &mut warnings);
        let covenant = m.instruments[0].covenant.as_ref().unwrap();
        assert_eq!(covenant.in_compliance, Some(false));
        assert!(covenant.max_supportable_principal.unwrap() < dec!(3_750_000));
        assert!(warnings.iter().any(|w| w.contains("covenant")));
    }

    #[test]
    fn test_no_debt_has_no_ratios() {
        let mut warnings = Vec::new();
        let m = analyze_financing(&Scenario::default(), &noi_years(dec!(100_000), 2), &mut warnings);
        assert_eq!(m.total_debt, Decimal::ZERO);
        assert_eq!(m.blended_rate, None);
        assert_eq!(m.debt_yield, None);
        assert_eq!(m.ltv, None);
        assert_eq!(m.dscr_year1, None);
        assert_eq!(m.schedule[0].total_debt_service, Decimal::ZERO);
    }

    #[test]
    fn test_schedule_splits_interest_and_principal() {
        let mut warnings = Vec::new();
        let m = analyze_financing(&dscr_scenario(), &noi_years(dec!(350_000), 3), &mut warnings);
        let y1 = &m.schedule[0];
        assert!(y1.interest > y1.principal);
        assert!((y1.interest + y1.principal - y1.total_debt_service).abs() < dec!(0.000001));
        assert!(y1.ending_balance < dec!(3_750_000));
        assert!(m.schedule[2].interest < y1.interest);
    }
}
