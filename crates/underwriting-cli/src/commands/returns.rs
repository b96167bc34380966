use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use underwriting_core::investment::returns::{calculate_returns, ReturnsInput};
use underwriting_core::investment::waterfall::{calculate_waterfall, WaterfallInput};

use crate::input;

/// Arguments for IRR / NPV / equity multiple on a cash flow vector
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Annual cash flows, initial investment first (e.g. "-1000000,80000,85000,1300000")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Discount rate for NPV
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// Starting guess for the IRR solver
    #[arg(long)]
    pub guess: Option<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns_input: ReturnsInput = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => ReturnsInput {
            cash_flows: args
                .cash_flows
                .ok_or("--cash-flows is required (or provide --input)")?,
            guess: args.guess,
            discount_rate: args.discount_rate,
        },
    };

    let result = calculate_returns(&returns_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a standalone LP/GP waterfall
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to JSON/YAML input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wf_input: WaterfallInput = input::read_input(args.input.as_deref())?
        .ok_or("--input <file> or stdin required for waterfall")?;
    let result = calculate_waterfall(&wf_input)?;
    Ok(serde_json::to_value(result)?)
}
