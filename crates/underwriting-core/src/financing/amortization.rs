use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::UnderwritingError;
use crate::types::*;
use crate::UnderwritingResult;

const MONTHS_PER_YEAR: u32 = 12;

/// Longest schedule `build_amortization_schedule` will lay out.
pub const MAX_AMORTIZATION_YEARS: u32 = 50;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a standalone level-payment schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub principal: Money,
    pub annual_rate: Rate,
    pub amortization_years: u32,
}

/// One monthly payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub month: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub balance: Money,
}

/// Twelve rows rolled up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationYear {
    pub year: u32,
    pub payments: Money,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub monthly_payment: Money,
    pub total_months: u32,
    pub rows: Vec<AmortizationRow>,
    pub annual_summary: Vec<AmortizationYear>,
    pub total_interest: Money,
    pub total_paid: Money,
}

// ---------------------------------------------------------------------------
// Payment math
// ---------------------------------------------------------------------------

/// Level monthly payment that retires `principal` over `amortization_years`.
///
/// Returns zero for a non-positive principal or a zero-length term.
pub fn monthly_payment(principal: Money, annual_rate: Rate, amortization_years: u32) -> Money {
    monthly_payment_for_months(
        principal,
        annual_rate,
        amortization_years.saturating_mul(MONTHS_PER_YEAR),
    )
}

/// `P × r(1+r)^n / ((1+r)^n − 1)` with `r` the monthly rate.
pub fn monthly_payment_for_months(principal: Money, annual_rate: Rate, months: u32) -> Money {
    if principal <= Decimal::ZERO || months == 0 {
        return Decimal::ZERO;
    }

    let r = annual_rate / dec!(12);
    if r.is_zero() {
        return principal / Decimal::from(months);
    }

    match compound(r, months) {
        Some(growth) if growth > Decimal::ONE => {
            principal * r * growth / (growth - Decimal::ONE)
        }
        // Compounding too large to represent: payment converges to interest
        _ => principal * r,
    }
}

/// Interest-only monthly payment: `principal × rate / 12`, independent of term.
pub fn interest_only_payment(principal: Money, annual_rate: Rate) -> Money {
    if principal <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    principal * annual_rate / dec!(12)
}

/// Remaining balance after `years_paid` years of level payments.
pub fn loan_balance(
    principal: Money,
    annual_rate: Rate,
    amortization_years: u32,
    years_paid: u32,
) -> Money {
    loan_balance_after_months(
        principal,
        annual_rate,
        amortization_years.saturating_mul(MONTHS_PER_YEAR),
        years_paid.saturating_mul(MONTHS_PER_YEAR),
    )
}

/// Remaining balance after `months_paid` of `total_months` level payments.
///
/// Exactly zero once the term has run; never negative.
pub fn loan_balance_after_months(
    principal: Money,
    annual_rate: Rate,
    total_months: u32,
    months_paid: u32,
) -> Money {
    if principal <= Decimal::ZERO || months_paid >= total_months {
        return Decimal::ZERO;
    }
    if months_paid == 0 {
        return principal;
    }

    let r = annual_rate / dec!(12);
    if r.is_zero() {
        let remaining = Decimal::from(total_months - months_paid);
        return principal * remaining / Decimal::from(total_months);
    }

    // B_k = P × ((1+r)^n − (1+r)^k) / ((1+r)^n − 1)
    let balance = match (compound(r, total_months), compound(r, months_paid)) {
        (Some(full), Some(partial)) if full > Decimal::ONE => {
            principal * (full - partial) / (full - Decimal::ONE)
        }
        // Payment is effectively interest-only at this horizon
        _ => principal,
    };
    balance.max(Decimal::ZERO)
}

/// Largest principal whose level payment over `months` does not exceed
/// `payment`.
pub fn max_principal_for_payment(payment: Money, annual_rate: Rate, months: u32) -> Money {
    if payment <= Decimal::ZERO || months == 0 {
        return Decimal::ZERO;
    }

    let r = annual_rate / dec!(12);
    if r.is_zero() {
        return payment * Decimal::from(months);
    }

    match compound(r, months) {
        Some(growth) if growth > Decimal::ONE => {
            payment * (growth - Decimal::ONE) / (r * growth)
        }
        _ => payment / r,
    }
}

/// Month-by-month schedule with an annual roll-up.
///
/// Allocates one row per month; callers bound the term.
pub fn amortization_schedule(
    principal: Money,
    annual_rate: Rate,
    amortization_years: u32,
) -> AmortizationSchedule {
    let total_months = amortization_years.saturating_mul(MONTHS_PER_YEAR);
    let payment = monthly_payment_for_months(principal, annual_rate, total_months);
    let r = annual_rate / dec!(12);

    let mut rows = Vec::with_capacity(total_months as usize);
    let mut balance = principal.max(Decimal::ZERO);

    for month in 1..=total_months {
        let interest = balance * r;
        let mut principal_paid = payment - interest;
        let mut this_payment = payment;

        // Close out the residual in the final month
        if month == total_months || principal_paid > balance {
            principal_paid = balance;
            this_payment = interest + principal_paid;
        }
        balance -= principal_paid;

        rows.push(AmortizationRow {
            month,
            payment: this_payment,
            interest,
            principal: principal_paid,
            balance,
        });
    }

    let annual_summary = summarize_by_year(&rows);
    let total_interest: Money = rows.iter().map(|r| r.interest).sum();
    let total_paid: Money = rows.iter().map(|r| r.payment).sum();

    AmortizationSchedule {
        monthly_payment: payment,
        total_months,
        rows,
        annual_summary,
        total_interest,
        total_paid,
    }
}

/// Validated entry point returning the standard envelope.
pub fn build_amortization_schedule(
    input: &AmortizationInput,
) -> UnderwritingResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.principal < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "principal".into(),
            reason: "Principal cannot be negative".into(),
        });
    }
    if input.annual_rate < Decimal::ZERO || input.annual_rate >= Decimal::ONE {
        return Err(UnderwritingError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Annual rate must be in [0, 1)".into(),
        });
    }
    if input.amortization_years > MAX_AMORTIZATION_YEARS {
        return Err(UnderwritingError::InvalidInput {
            field: "amortization_years".into(),
            reason: format!("Amortization cannot exceed {MAX_AMORTIZATION_YEARS} years"),
        });
    }
    if input.amortization_years == 0 || input.principal.is_zero() {
        warnings.push("Zero principal or zero-length term: no payments due".into());
    }

    let schedule = amortization_schedule(
        input.principal,
        input.annual_rate,
        input.amortization_years,
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization (monthly compounding)",
        input,
        warnings,
        elapsed,
        schedule,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `(1 + r)^n`, `None` on overflow.
fn compound(r: Rate, n: u32) -> Option<Decimal> {
    (Decimal::ONE + r).checked_powi(i64::from(n))
}

fn summarize_by_year(rows: &[AmortizationRow]) -> Vec<AmortizationYear> {
    rows.chunks(MONTHS_PER_YEAR as usize)
        .enumerate()
        .map(|(i, chunk)| AmortizationYear {
            year: i as u32 + 1,
            payments: chunk.iter().map(|r| r.payment).sum(),
            interest: chunk.iter().map(|r| r.interest).sum(),
            principal: chunk.iter().map(|r| r.principal).sum(),
            ending_balance: chunk.last().map(|r| r.balance).unwrap_or_default(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
