use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::amortization::{
    interest_only_payment, loan_balance_after_months, monthly_payment_for_months,
};
use crate::types::{Money, Rate};

const MONTHS_PER_YEAR: u32 = 12;

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// Repayment terms shared by seller paper and the DSCR loan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    /// Amortization schedule length; 0 means interest only
    pub amortization_years: u32,
    /// Maturity (balloon) in years; 0 means the loan runs to full amortization
    pub term_years: u32,
    /// Leading interest-only period before amortization begins
    pub interest_only_years: u32,
    /// Interest only for the whole life of the loan
    pub interest_only: bool,
}

/// An existing loan taken over on its original schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectToTerms {
    pub current_balance: Money,
    pub annual_rate: Rate,
    pub original_term_months: u32,
    pub remaining_term_months: u32,
}

/// New third-party debt sized against a coverage covenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DscrLoanTerms {
    pub loan: LoanTerms,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_dscr: Option<Rate>,
    pub origination_fee_percent: Rate,
}

/// One optional slot per instrument type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancingStack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_to: Option<SubjectToTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_financing: Option<LoanTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_carryback: Option<LoanTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscr_loan: Option<DscrLoanTerms>,
}

impl FinancingStack {
    /// Instruments present in the stack, in a fixed order.
    pub fn instruments(&self) -> Vec<FinancingInstrument> {
        let mut out = Vec::new();
        if let Some(terms) = &self.subject_to {
            out.push(FinancingInstrument::SubjectTo(terms.clone()));
        }
        if let Some(terms) = &self.seller_financing {
            out.push(FinancingInstrument::SellerFinancing(terms.clone()));
        }
        if let Some(terms) = &self.seller_carryback {
            out.push(FinancingInstrument::SellerCarryback(terms.clone()));
        }
        if let Some(terms) = &self.dscr_loan {
            out.push(FinancingInstrument::DscrLoan(terms.clone()));
        }
        out
    }

    pub fn total_principal(&self) -> Money {
        self.instruments().iter().map(|i| i.principal()).sum()
    }

    pub fn total_origination_fees(&self) -> Money {
        self.instruments().iter().map(|i| i.origination_fee()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    SubjectTo,
    SellerFinancing,
    SellerCarryback,
    DscrLoan,
}

impl InstrumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            InstrumentKind::SubjectTo => "Subject-To",
            InstrumentKind::SellerFinancing => "Seller Financing",
            InstrumentKind::SellerCarryback => "Seller Carryback",
            InstrumentKind::DscrLoan => "DSCR Loan",
        }
    }
}

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinancingInstrument {
    SubjectTo(SubjectToTerms),
    SellerFinancing(LoanTerms),
    SellerCarryback(LoanTerms),
    DscrLoan(DscrLoanTerms),
}

impl FinancingInstrument {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            FinancingInstrument::SubjectTo(_) => InstrumentKind::SubjectTo,
            FinancingInstrument::SellerFinancing(_) => InstrumentKind::SellerFinancing,
            FinancingInstrument::SellerCarryback(_) => InstrumentKind::SellerCarryback,
            FinancingInstrument::DscrLoan(_) => InstrumentKind::DscrLoan,
        }
    }

    pub fn principal(&self) -> Money {
        let p = match self {
            FinancingInstrument::SubjectTo(t) => t.current_balance,
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                t.principal
            }
            FinancingInstrument::DscrLoan(t) => t.loan.principal,
        };
        p.max(Decimal::ZERO)
    }

    pub fn annual_rate(&self) -> Rate {
        match self {
            FinancingInstrument::SubjectTo(t) => t.annual_rate,
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                t.annual_rate
            }
            FinancingInstrument::DscrLoan(t) => t.loan.annual_rate,
        }
    }

    pub fn origination_fee(&self) -> Money {
        match self {
            FinancingInstrument::DscrLoan(t) => self.principal() * t.origination_fee_percent,
            _ => Decimal::ZERO,
        }
    }

    /// Month after which no further payments are scheduled.
    ///
    /// `None` for a whole-life interest-only loan without a stated term.
    pub fn maturity_months(&self) -> Option<u32> {
        match self {
            FinancingInstrument::SubjectTo(t) => Some(t.remaining_term_months),
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                loan_maturity(t)
            }
            FinancingInstrument::DscrLoan(t) => loan_maturity(&t.loan),
        }
    }

    /// Scheduled payment in month `month` (1-based); zero past maturity.
    pub fn payment_for_month(&self, month: u32) -> Money {
        if month == 0 || self.is_past_maturity(month) {
            return Decimal::ZERO;
        }
        match self {
            FinancingInstrument::SubjectTo(t) => subject_to_payment(t),
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                loan_payment(t, month)
            }
            FinancingInstrument::DscrLoan(t) => loan_payment(&t.loan, month),
        }
    }

    /// Payment in the first month of the loan.
    pub fn monthly_payment(&self) -> Money {
        self.payment_for_month(1)
    }

    /// Level payment once amortization starts (equals the IO payment for
    /// interest-only loans).
    pub fn amortizing_payment(&self) -> Money {
        match self {
            FinancingInstrument::SubjectTo(t) => subject_to_payment(t),
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                loan_payment(t, io_months(t) + 1)
            }
            FinancingInstrument::DscrLoan(t) => loan_payment(&t.loan, io_months(&t.loan) + 1),
        }
    }

    /// Outstanding balance after `months` payments.
    ///
    /// Past maturity this stays at the balloon balance: the payoff is owed
    /// until the asset is sold.
    pub fn balance_after_months(&self, months: u32) -> Money {
        let months = match self.maturity_months() {
            Some(maturity) => months.min(maturity),
            None => months,
        };
        match self {
            // No term left: the whole balance is a balloon due now
            FinancingInstrument::SubjectTo(t) if t.remaining_term_months == 0 => self.principal(),
            FinancingInstrument::SubjectTo(t) => loan_balance_after_months(
                t.current_balance,
                t.annual_rate,
                t.remaining_term_months,
                months,
            ),
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                loan_balance(t, months)
            }
            FinancingInstrument::DscrLoan(t) => loan_balance(&t.loan, months),
        }
    }

    /// Balance due at maturity (zero for a fully amortizing loan).
    pub fn balloon_balance(&self) -> Option<Money> {
        self.maturity_months().map(|m| self.balance_after_months(m))
    }

    pub fn is_past_maturity(&self, month: u32) -> bool {
        matches!(self.maturity_months(), Some(maturity) if month > maturity)
    }

    /// Σ payments falling in projection year `year`.
    pub fn debt_service_for_year(&self, year: u32) -> Money {
        year_months(year).map(|m| self.payment_for_month(m)).sum()
    }

    pub fn balance_after_year(&self, year: u32) -> Money {
        self.balance_after_months(year.saturating_mul(MONTHS_PER_YEAR))
    }

    /// Principal retired during `year`.
    pub fn principal_for_year(&self, year: u32) -> Money {
        if year == 0 {
            return Decimal::ZERO;
        }
        let opening = self.balance_after_year(year - 1);
        let closing = self.balance_after_year(year);
        (opening - closing).max(Decimal::ZERO)
    }

    pub fn interest_for_year(&self, year: u32) -> Money {
        self.debt_service_for_year(year) - self.principal_for_year(year)
    }

    /// Problems with the terms that the engine computes through.
    pub fn check(&self) -> Vec<String> {
        let label = self.kind().label();
        let mut warnings = Vec::new();
        let raw_principal = match self {
            FinancingInstrument::SubjectTo(t) => t.current_balance,
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                t.principal
            }
            FinancingInstrument::DscrLoan(t) => t.loan.principal,
        };
        if raw_principal < Decimal::ZERO {
            warnings.push(format!("{label}: negative principal treated as zero"));
        }
        let rate = self.annual_rate();
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            warnings.push(format!("{label}: annual rate {rate} outside [0, 1)"));
        }
        match self {
            FinancingInstrument::SubjectTo(t) => {
                if t.remaining_term_months > t.original_term_months {
                    warnings.push(format!(
                        "{label}: remaining term ({}) exceeds original term ({})",
                        t.remaining_term_months, t.original_term_months
                    ));
                }
                if t.remaining_term_months == 0 && raw_principal > Decimal::ZERO {
                    warnings.push(format!(
                        "{label}: no remaining term on an outstanding balance"
                    ));
                }
            }
            FinancingInstrument::SellerFinancing(t) | FinancingInstrument::SellerCarryback(t) => {
                check_loan_terms(label, t, &mut warnings);
            }
            FinancingInstrument::DscrLoan(t) => {
                check_loan_terms(label, &t.loan, &mut warnings);
                if matches!(t.min_dscr, Some(m) if m <= Decimal::ZERO) {
                    warnings.push(format!("{label}: min_dscr must be positive; covenant ignored"));
                }
            }
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Months of projection year `year`; empty for year 0.
fn year_months(year: u32) -> std::ops::RangeInclusive<u32> {
    let first = year.saturating_sub(1) * MONTHS_PER_YEAR + 1;
    first..=year * MONTHS_PER_YEAR
}

fn is_interest_only(terms: &LoanTerms) -> bool {
    terms.interest_only || terms.amortization_years == 0
}

fn io_months(terms: &LoanTerms) -> u32 {
    terms.interest_only_years.saturating_mul(MONTHS_PER_YEAR)
}

fn amortization_months(terms: &LoanTerms) -> u32 {
    terms.amortization_years.saturating_mul(MONTHS_PER_YEAR)
}

fn loan_maturity(terms: &LoanTerms) -> Option<u32> {
    if terms.term_years > 0 {
        return Some(terms.term_years.saturating_mul(MONTHS_PER_YEAR));
    }
    if is_interest_only(terms) {
        return None;
    }
    Some(io_months(terms).saturating_add(amortization_months(terms)))
}

fn loan_payment(terms: &LoanTerms, month: u32) -> Money {
    let principal = terms.principal.max(Decimal::ZERO);
    if is_interest_only(terms) || month <= io_months(terms) {
        return interest_only_payment(principal, terms.annual_rate);
    }
    monthly_payment_for_months(principal, terms.annual_rate, amortization_months(terms))
}

fn loan_balance(terms: &LoanTerms, months: u32) -> Money {
    let principal = terms.principal.max(Decimal::ZERO);
    if is_interest_only(terms) || months <= io_months(terms) {
        return principal;
    }
    loan_balance_after_months(
        principal,
        terms.annual_rate,
        amortization_months(terms),
        months - io_months(terms),
    )
}

/// Original-schedule payment: retires today's balance over the months left.
fn subject_to_payment(terms: &SubjectToTerms) -> Money {
    monthly_payment_for_months(
        terms.current_balance.max(Decimal::ZERO),
        terms.annual_rate,
        terms.remaining_term_months,
    )
}

fn check_loan_terms(label: &str, terms: &LoanTerms, warnings: &mut Vec<String>) {
    if terms.amortization_years == 0 && !terms.interest_only && terms.principal > Decimal::ZERO {
        warnings.push(format!(
            "{label}: no amortization period given; treated as interest only"
        ));
    }
    if terms.interest_only_years > 0
        && terms.term_years > 0
        && terms.interest_only_years >= terms.term_years
    {
        warnings.push(format!(
            "{label}: interest-only period covers the whole term"
        ));
    }
    if terms.annual_rate > dec!(0.25) {
        warnings.push(format!(
            "{label}: annual rate {} is unusually high",
            terms.annual_rate
        ));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
