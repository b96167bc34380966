use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::UnderwritingError;
use crate::types::{Money, Rate};
use crate::UnderwritingResult;

/// Newton step size below which the IRR is considered solved.
pub const IRR_TOLERANCE: Decimal = dec!(0.000001);
pub const MAX_IRR_ITERATIONS: u32 = 100;
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.10);

const DERIVATIVE_FLOOR: Decimal = dec!(0.000000000001);
const MIN_RATE: Decimal = dec!(-0.99);
const MAX_RATE: Decimal = dec!(100);

/// Net Present Value: `Σ cf_t / (1 + rate)^t`, with `cash_flows[0]` at t = 0.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> UnderwritingResult<Money> {
    if rate <= dec!(-1) {
        return Err(UnderwritingError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_and_derivative(cash_flows, rate)
        .map(|(value, _)| value)
        .ok_or_else(|| UnderwritingError::DivisionByZero {
            context: format!("NPV discount factors at rate {rate}"),
        })
}

/// Internal Rate of Return by Newton-Raphson on NPV(rate) = 0.
///
/// Returns an error, never the last unconverged guess, when the cash flows
/// have no sign change, the derivative vanishes, the arithmetic overflows,
/// or the iteration cap is reached.
pub fn irr(cash_flows: &[Money], guess: Rate) -> UnderwritingResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(UnderwritingError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let has_inflow = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_outflow = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_inflow || !has_outflow {
        return Err(UnderwritingError::InsufficientData(
            "IRR requires at least one positive and one negative cash flow".into(),
        ));
    }

    let mut rate = guess.clamp(MIN_RATE, MAX_RATE);
    let mut last_npv = Decimal::ZERO;

    for i in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) =
            npv_and_derivative(cash_flows, rate).ok_or_else(|| UnderwritingError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: last_npv,
            })?;
        last_npv = npv_val;

        if dnpv.abs() < DERIVATIVE_FLOOR {
            return Err(UnderwritingError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        let step = npv_val
            .checked_div(dnpv)
            .ok_or_else(|| UnderwritingError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            })?;
        let next = rate - step;

        if step.abs() < IRR_TOLERANCE && next > MIN_RATE && next < MAX_RATE {
            return Ok(next);
        }

        // Guard against divergence
        rate = next.clamp(MIN_RATE, MAX_RATE);
    }

    Err(UnderwritingError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: last_npv,
    })
}

/// NPV(r) and its analytic derivative dNPV/dr = Σ -t·cf_t / (1+r)^(t+1).
///
/// `None` when a discount factor cannot be represented (rate at -100% or
/// overflow at extreme rates).
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let step = Decimal::ONE.checked_div(one_plus_r)?;

    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        let pv = cf.checked_mul(discount)?;
        npv = npv.checked_add(pv)?;
        if t > 0 {
            let term = Decimal::from(t as i64).checked_mul(pv)?.checked_mul(step)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_mul(step)?;
    }

    Some((npv, dnpv))
}
