use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use underwriting_core::financing::amortization::{build_amortization_schedule, AmortizationInput};

use crate::input;

/// Arguments for a level-payment amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate as a decimal (0.065 = 6.5%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Amortization period in years
    #[arg(long, default_value_t = 30)]
    pub years: u32,

    /// Print the annual roll-up instead of every month
    #[arg(long)]
    pub annual: bool,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let amortization_input: AmortizationInput =
        match input::read_input(args.input.as_deref())? {
            Some(parsed) => parsed,
            None => AmortizationInput {
                principal: args
                    .principal
                    .ok_or("--principal is required (or provide --input)")?,
                annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
                amortization_years: args.years,
            },
        };

    let result = build_amortization_schedule(&amortization_input)?;
    let mut value = serde_json::to_value(result)?;

    if args.annual {
        if let Some(schedule) = value.get_mut("result") {
            if let Some(rows) = schedule.as_object_mut() {
                rows.remove("rows");
            }
        }
    }
    Ok(value)
}
