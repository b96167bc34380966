use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tracing::debug;

use underwriting_core::analysis::analyze_deal;
use underwriting_core::financing::instruments::{DscrLoanTerms, LoanTerms};
use underwriting_core::growth::GrowthPolicy;
use underwriting_core::investment::sensitivity::run_sensitivity;
use underwriting_core::investment::waterfall::WaterfallTerms;
use underwriting_core::scenario::{
    ExpenseCategory, ExpenseLine, IncomeCategory, IncomeLine, Scenario, Unit, UnitStatus,
};

use crate::input;

/// Scenario source plus the overrides every scenario command accepts
#[derive(Args)]
pub struct ScenarioArgs {
    /// Path to a JSON or YAML scenario (stdin is read when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of projected years
    #[arg(long)]
    pub projection_years: Option<u32>,

    /// Override the planned hold period in years
    #[arg(long)]
    pub hold_period: Option<u32>,
}

impl ScenarioArgs {
    pub fn load(&self) -> Result<Scenario, Box<dyn std::error::Error>> {
        let mut scenario: Scenario = input::read_input(self.input.as_deref())?
            .ok_or("--input <scenario.json|yaml> or a scenario on stdin is required")?;
        if let Some(years) = self.projection_years {
            scenario.projection_years = years;
        }
        if let Some(hold) = self.hold_period {
            scenario.acquisition.hold_period_years = hold;
        }
        debug!(
            property = %scenario.property.name,
            units = scenario.unit_count(),
            years = scenario.projection_years,
            "loaded scenario"
        );
        Ok(scenario)
    }
}

/// One part of the full analysis
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Section {
    Summary,
    ProForma,
    RentRoll,
    Revenue,
    Expenses,
    Noi,
    Financing,
    CashFlow,
    Sale,
    Equity,
    SourcesUses,
    Returns,
    Unlevered,
    Waterfall,
    Sensitivity,
}

impl Section {
    fn field(&self) -> &'static str {
        match self {
            Section::Summary => "year1",
            Section::ProForma => "pro_forma",
            Section::RentRoll => "rent_roll",
            Section::Revenue => "revenue_projections",
            Section::Expenses => "expense_projections",
            Section::Noi => "noi_projections",
            Section::Financing => "financing_metrics",
            Section::CashFlow => "cash_flow_projections",
            Section::Sale => "sale_analysis",
            Section::Equity => "equity_investment",
            Section::SourcesUses => "sources_and_uses",
            Section::Returns => "irr_cash_flows",
            Section::Unlevered => "unlevered_returns",
            Section::Waterfall => "waterfall_distribution",
            Section::Sensitivity => "sensitivity_analysis",
        }
    }
}

/// Arguments for the full deal analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Print only one section of the analysis
    #[arg(long, value_enum)]
    pub section: Option<Section>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = args.scenario.load()?;
    let result = analyze_deal(&scenario)?;
    let mut value = serde_json::to_value(result)?;

    if let Some(section) = args.section {
        select_section(&mut value, section)?;
    }
    Ok(value)
}

/// Replace the envelope's `result` with one of its fields, keeping warnings.
fn select_section(envelope: &mut Value, section: Section) -> Result<(), Box<dyn std::error::Error>> {
    let result = envelope
        .get_mut("result")
        .ok_or("analysis output has no result")?;
    let part = result
        .get_mut(section.field())
        .map(Value::take)
        .ok_or_else(|| format!("analysis output has no '{}' section", section.field()))?;
    *result = part;
    Ok(())
}

/// Arguments for the exit cap × rent growth grid
#[derive(Args)]
pub struct SensitivityArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Exit cap rates to test (comma-separated, e.g. "0.055,0.06,0.065")
    #[arg(long, value_delimiter = ',')]
    pub exit_caps: Option<Vec<Decimal>>,

    /// Rent growth rates to test (comma-separated, e.g. "0.01,0.03")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub rent_growth: Option<Vec<Decimal>>,
}

pub fn run_grid(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut scenario = args.scenario.load()?;
    if let Some(caps) = args.exit_caps {
        scenario.sensitivity.exit_cap_rates = caps;
    }
    if let Some(growth) = args.rent_growth {
        scenario.sensitivity.rent_growth_rates = growth;
    }
    let result = run_sensitivity(&scenario)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for the scenario fingerprint
#[derive(Args)]
pub struct FingerprintArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
}

pub fn run_fingerprint(args: FingerprintArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario = args.scenario.load()?;
    Ok(serde_json::json!({ "fingerprint": scenario.fingerprint() }))
}

/// A complete 24-unit scenario to start from.
pub fn run_template() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(sample_scenario())?)
}

fn sample_scenario() -> Scenario {
    let mut s = Scenario::default();

    s.property.name = "Maple Court Apartments".into();
    s.property.units = 24;
    s.property.square_feet = dec!(20_400);
    s.property.purchase_price = dec!(3_600_000);
    s.property.year_built = Some(1986);

    s.acquisition.hold_period_years = 7;
    s.acquisition.closing_costs = dec!(54_000);
    s.acquisition.acquisition_fee = dec!(36_000);
    s.acquisition.renovation_budget = dec!(120_000);
    s.acquisition.upfront_reserves = dec!(24_000);

    s.growth.annual_rent_growth = dec!(0.03);
    s.growth.annual_expense_growth = dec!(0.025);
    s.growth.vacancy_rate = dec!(0.05);
    s.growth.bad_debt_rate = dec!(0.01);
    s.growth.management_fee_percent = dec!(0.04);
    s.growth.concessions_annual = dec!(6_000);
    s.growth.exit_cap_rate_5yr = dec!(0.065);
    s.growth.exit_cap_rate_10yr = dec!(0.07);

    s.sale.selling_costs_percent = dec!(0.02);
    s.sale.capex_reserve_per_unit_per_year = dec!(250);
    s.sale.discount_rate = Some(dec!(0.10));

    s.rent_roll = (0..24u32)
        .map(|i| {
            let (unit_type, market, in_place, sqft) = if i < 12 {
                ("1x1", dec!(1150), dec!(1095), dec!(720))
            } else {
                ("2x1", dec!(1395), dec!(1320), dec!(980))
            };
            Unit {
                id: format!("{}", 101 + i),
                unit_type: unit_type.into(),
                square_feet: sqft,
                status: if i == 11 { UnitStatus::Vacant } else { UnitStatus::Occupied },
                market_rent: market,
                in_place_rent: if i == 11 { Decimal::ZERO } else { in_place },
                lease_start: None,
                lease_end: None,
            }
        })
        .collect();

    s.other_income = vec![
        IncomeLine {
            name: "Laundry".into(),
            category: IncomeCategory::Laundry,
            annual_amount: dec!(7_200),
            growth: None,
        },
        IncomeLine {
            name: "Parking".into(),
            category: IncomeCategory::Parking,
            annual_amount: dec!(4_800),
            growth: Some(GrowthPolicy::Fixed(dec!(0.02))),
        },
    ];

    let expense = |name: &str, category, amount| ExpenseLine {
        name: name.into(),
        category,
        annual_amount: amount,
        growth: None,
    };
    s.expenses = vec![
        expense("Property Taxes", ExpenseCategory::PropertyTaxes, dec!(52_000)),
        expense("Insurance", ExpenseCategory::Insurance, dec!(14_400)),
        expense("Utilities", ExpenseCategory::Utilities, dec!(28_800)),
        expense("Repairs & Maintenance", ExpenseCategory::RepairsMaintenance, dec!(21_600)),
        expense("Payroll", ExpenseCategory::Payroll, dec!(30_000)),
        expense("Administrative", ExpenseCategory::Administrative, dec!(6_000)),
    ];

    s.financing.dscr_loan = Some(DscrLoanTerms {
        loan: LoanTerms {
            principal: dec!(2_520_000),
            annual_rate: dec!(0.0625),
            amortization_years: 30,
            term_years: 10,
            ..Default::default()
        },
        min_dscr: Some(dec!(1.25)),
        origination_fee_percent: dec!(0.01),
    });

    s.waterfall = WaterfallTerms {
        preferred_return: dec!(0.08),
        lp_equity_share: dec!(0.9),
        gp_equity_share: dec!(0.1),
        lp_split_pre_pref: dec!(0.9),
        gp_split_pre_pref: dec!(0.1),
        lp_split_after_pref: dec!(0.7),
        gp_promote_after_pref: dec!(0.3),
        ..Default::default()
    };

    s
}
