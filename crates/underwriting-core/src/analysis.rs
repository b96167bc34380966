use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::UnderwritingError;
use crate::financing::metrics::{analyze_financing, FinancingMetrics};
use crate::investment::cash_flow::{project_cash_flows, CashFlowYear};
use crate::investment::equity::{compute_equity, sources_and_uses, EquityInvestment, SourcesAndUses};
use crate::investment::returns::{levered_returns, unlevered_returns, ReturnResult};
use crate::investment::sale::{analyze_sales, sale_for_year, SaleYear, FIRST_EXIT_YEAR, LAST_EXIT_YEAR};
use crate::investment::sensitivity::{sensitivity_grid, SensitivityGrid};
use crate::investment::waterfall::{distributable_cash, run_waterfall, WaterfallResult};
use crate::operations::expenses::{annual_reserves, project_expenses, ExpenseYear};
use crate::operations::noi::{aggregate_noi, NoiYear};
use crate::operations::rent_roll::{summarize_rent_roll, RentRollSummary};
use crate::operations::revenue::{project_revenue, RevenueYear};
use crate::scenario::{ReservePlacement, Scenario};
use crate::types::*;
use crate::UnderwritingResult;

pub const MAX_PROJECTION_YEARS: u32 = 50;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Headline acquisition metrics for one operating year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSummary {
    pub purchase_price: Money,
    pub price_per_unit: Option<Money>,
    pub price_per_sqft: Option<Money>,
    pub purchase_cap_rate: Option<Rate>,
    pub gross_rent_multiplier: Option<Multiple>,
    pub gross_potential_rent: Money,
    pub effective_gross_income: Money,
    pub total_expenses: Money,
    pub noi: Money,
    pub expense_ratio: Option<Rate>,
    pub debt_service: Money,
    pub dscr: Option<Rate>,
    pub cash_on_cash: Option<Rate>,
    pub debt_yield: Option<Rate>,
    pub ltv: Option<Rate>,
    /// Occupancy at which income just covers expenses and debt service
    pub break_even_occupancy: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonReturns {
    pub five_year: Option<ReturnResult>,
    pub ten_year: Option<ReturnResult>,
    pub hold_period: Option<ReturnResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonWaterfalls {
    pub five_year: Option<WaterfallResult>,
    pub ten_year: Option<WaterfallResult>,
}

/// Complete underwriting of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealAnalysis {
    pub property_name: String,
    pub projection_years: u32,
    pub hold_period_years: u32,
    pub year1: DealSummary,
    pub pro_forma: DealSummary,
    pub rent_roll: RentRollSummary,
    pub revenue_projections: Vec<RevenueYear>,
    pub expense_projections: Vec<ExpenseYear>,
    pub noi_projections: Vec<NoiYear>,
    pub financing_metrics: FinancingMetrics,
    pub cash_flow_projections: Vec<CashFlowYear>,
    pub sale_analysis: Vec<SaleYear>,
    pub equity_investment: EquityInvestment,
    pub sources_and_uses: SourcesAndUses,
    pub irr_cash_flows: HorizonReturns,
    pub unlevered_returns: HorizonReturns,
    pub waterfall_distribution: HorizonWaterfalls,
    /// `None` when the projection is shorter than the 5-year exit
    pub sensitivity_analysis: Option<SensitivityGrid>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Stage outputs shared by the full analysis and sensitivity cells.
struct Pipeline {
    years: u32,
    hold_period: u32,
    /// Years 1..=N+1; the extra year prices the exit
    revenue: Vec<RevenueYear>,
    expenses: Vec<ExpenseYear>,
    noi: Vec<NoiYear>,
    financing: FinancingMetrics,
    equity: EquityInvestment,
    cash_flows: Vec<CashFlowYear>,
    sales: Vec<SaleYear>,
    hold_sale: Option<SaleYear>,
}

impl Pipeline {
    fn sale(&self, exit_year: u32) -> Option<&SaleYear> {
        self.sales
            .iter()
            .chain(self.hold_sale.iter())
            .find(|s| s.exit_year == exit_year)
    }
}

fn run_pipeline(scenario: &Scenario, warnings: &mut Vec<String>) -> UnderwritingResult<Pipeline> {
    let years = scenario.projection_years;
    let forward_years = years + 1;

    let revenue = project_revenue(scenario, forward_years)?;
    let expenses = project_expenses(scenario, &revenue)?;
    let noi = aggregate_noi(&revenue, &expenses, scenario.unit_count());
    debug!(years = forward_years, "projected revenue, expenses and NOI");

    let in_horizon = &noi[..years as usize];
    let financing = analyze_financing(scenario, in_horizon, warnings);
    let equity = compute_equity(scenario, warnings);
    let cash_flows = project_cash_flows(scenario, in_horizon, &financing, &equity, warnings);
    debug!(
        instruments = financing.instruments.len(),
        total_debt = %financing.total_debt,
        "projected debt service and cash flow"
    );

    let sales = analyze_sales(scenario, &noi, years, warnings);
    let hold_period = resolve_hold_period(scenario, warnings);
    let hold_sale = if (FIRST_EXIT_YEAR..=LAST_EXIT_YEAR).contains(&hold_period) {
        None
    } else {
        let instruments = scenario.financing.instruments();
        sale_for_year(scenario, &instruments, &noi, hold_period, warnings)
    };
    debug!(exits = sales.len(), hold_period, "priced sale scenarios");

    Ok(Pipeline {
        years,
        hold_period,
        revenue,
        expenses,
        noi,
        financing,
        equity,
        cash_flows,
        sales,
        hold_sale,
    })
}

fn resolve_hold_period(scenario: &Scenario, warnings: &mut Vec<String>) -> u32 {
    let hold = scenario.acquisition.hold_period_years;
    let years = scenario.projection_years;
    if hold == 0 {
        return years;
    }
    if hold > years {
        warnings.push(format!(
            "Hold period ({hold} years) exceeds the projection; using {years} years"
        ));
        return years;
    }
    hold
}

fn levered(
    pipeline: &Pipeline,
    exit_year: u32,
    discount_rate: Option<Rate>,
    warnings: &mut Vec<String>,
) -> Option<ReturnResult> {
    let sale = pipeline.sale(exit_year)?;
    levered_returns(
        pipeline.equity.required_equity,
        &pipeline.cash_flows,
        sale,
        discount_rate,
        warnings,
    )
}

fn unlevered(
    pipeline: &Pipeline,
    exit_year: u32,
    discount_rate: Option<Rate>,
    warnings: &mut Vec<String>,
) -> Option<ReturnResult> {
    let sale = pipeline.sale(exit_year)?;
    unlevered_returns(
        pipeline.equity.total_acquisition_cost,
        &pipeline.noi,
        sale,
        discount_rate,
        warnings,
    )
}

fn waterfall(
    scenario: &Scenario,
    pipeline: &Pipeline,
    exit_year: u32,
    warnings: &mut Vec<String>,
) -> Option<WaterfallResult> {
    let sale = pipeline.sale(exit_year)?;
    let cash = distributable_cash(&pipeline.cash_flows, sale)?;
    Some(run_waterfall(
        &scenario.waterfall,
        pipeline.equity.lp_equity,
        pipeline.equity.gp_equity,
        &cash,
        warnings,
    ))
}

/// 5-year levered IRR and equity multiple; the quantity each sensitivity
/// cell records.
pub fn five_year_levered_metrics(scenario: &Scenario) -> (Option<Rate>, Option<Multiple>) {
    if scenario.projection_years < FIRST_EXIT_YEAR
        || scenario.projection_years > MAX_PROJECTION_YEARS
    {
        return (None, None);
    }
    let mut discarded = Vec::new();
    let Ok(pipeline) = run_pipeline(scenario, &mut discarded) else {
        return (None, None);
    };
    match levered(&pipeline, FIRST_EXIT_YEAR, None, &mut discarded) {
        Some(r) => (r.irr, r.equity_multiple),
        None => (None, None),
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

struct SummaryInputs<'a> {
    revenue: &'a RevenueYear,
    expenses: &'a ExpenseYear,
    noi: &'a NoiYear,
    debt_service: Money,
    capex_below_noi: Money,
}

fn deal_summary(
    scenario: &Scenario,
    inputs: SummaryInputs<'_>,
    financing: &FinancingMetrics,
    equity: &EquityInvestment,
) -> DealSummary {
    let price = scenario.property.purchase_price;
    let priced = |denominator: Decimal| {
        if price > Decimal::ZERO {
            ratio(price, denominator)
        } else {
            None
        }
    };
    let noi = inputs.noi.noi;
    let gpr = inputs.revenue.gross_potential_rent;
    let cash_flow = noi - inputs.debt_service - inputs.capex_below_noi;

    DealSummary {
        purchase_price: price,
        price_per_unit: priced(Decimal::from(scenario.unit_count())),
        price_per_sqft: priced(scenario.property.square_feet),
        purchase_cap_rate: positive_ratio(noi, price),
        gross_rent_multiplier: priced(gpr),
        gross_potential_rent: gpr,
        effective_gross_income: inputs.revenue.effective_gross_income,
        total_expenses: inputs.expenses.total_expenses,
        noi,
        expense_ratio: inputs.noi.expense_ratio,
        debt_service: inputs.debt_service,
        dscr: ratio(noi, inputs.debt_service),
        cash_on_cash: positive_ratio(cash_flow, equity.required_equity),
        debt_yield: ratio(noi, financing.total_debt),
        ltv: positive_ratio(financing.total_debt, price),
        break_even_occupancy: ratio(
            inputs.expenses.total_expenses + inputs.debt_service + inputs.capex_below_noi,
            gpr + inputs.revenue.other_income_total,
        ),
    }
}

/// Year 1 with every in-place rent marked to market and no concessions.
fn pro_forma_summary(scenario: &Scenario, pipeline: &Pipeline) -> UnderwritingResult<DealSummary> {
    let mut marked = scenario.clone();
    for unit in &mut marked.rent_roll {
        unit.in_place_rent = unit.market_rent;
    }
    marked.growth.concessions_annual = Decimal::ZERO;

    let revenue = project_revenue(&marked, 1)?;
    let expenses = project_expenses(&marked, &revenue)?;
    let noi = aggregate_noi(&revenue, &expenses, marked.unit_count());

    Ok(deal_summary(
        &marked,
        SummaryInputs {
            revenue: &revenue[0],
            expenses: &expenses[0],
            noi: &noi[0],
            debt_service: pipeline.financing.total_annual_debt_service,
            capex_below_noi: capex_below_noi(&marked),
        },
        &pipeline.financing,
        &pipeline.equity,
    ))
}

fn capex_below_noi(scenario: &Scenario) -> Money {
    match scenario.sale.reserve_placement {
        ReservePlacement::BelowNoi => annual_reserves(scenario),
        ReservePlacement::AboveNoi => Decimal::ZERO,
    }
}

fn scenario_warnings(scenario: &Scenario) -> Vec<String> {
    let mut warnings = scenario.waterfall.check();
    if scenario.property.purchase_price <= Decimal::ZERO {
        warnings.push("Purchase price is not positive; price-based ratios are omitted".into());
    }
    if scenario.rent_roll.is_empty() {
        warnings.push("Rent roll is empty; rental income is zero".into());
    }
    if scenario.property.units > 0
        && !scenario.rent_roll.is_empty()
        && scenario.property.units as usize != scenario.rent_roll.len()
    {
        warnings.push(format!(
            "Property lists {} units but the rent roll has {}",
            scenario.property.units,
            scenario.rent_roll.len()
        ));
    }
    let g = &scenario.growth;
    if g.exit_cap_rate_5yr <= Decimal::ZERO && g.exit_cap_rate_10yr <= Decimal::ZERO {
        warnings.push("No exit cap rate given; sale scenarios cannot be priced".into());
    }
    if g.vacancy_rate < Decimal::ZERO || g.vacancy_rate > Decimal::ONE {
        warnings.push(format!("Vacancy rate {} is outside [0, 1]", g.vacancy_rate));
    }
    warnings
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Underwrite a deal: revenue → expenses → NOI → financing → cash flow →
/// sale → returns → waterfall → sensitivity.
///
/// Only a zero or unreasonably long projection, or growth that compounds a
/// line past `MAX_PROJECTED_AMOUNT`, is rejected; degenerate inputs surface
/// as `None` ratios and warnings.
pub fn analyze_deal(scenario: &Scenario) -> UnderwritingResult<ComputationOutput<DealAnalysis>> {
    let start = Instant::now();

    if scenario.projection_years == 0 {
        return Err(UnderwritingError::InvalidInput {
            field: "projection_years".into(),
            reason: "Projection must cover at least one year".into(),
        });
    }
    if scenario.projection_years > MAX_PROJECTION_YEARS {
        return Err(UnderwritingError::InvalidInput {
            field: "projection_years".into(),
            reason: format!("Projection cannot exceed {MAX_PROJECTION_YEARS} years"),
        });
    }

    let mut warnings = scenario_warnings(scenario);
    let pipeline = run_pipeline(scenario, &mut warnings)?;
    let discount_rate = scenario.sale.discount_rate;
    let n = pipeline.years as usize;
    let hold_period = pipeline.hold_period;

    let year1 = deal_summary(
        scenario,
        SummaryInputs {
            revenue: &pipeline.revenue[0],
            expenses: &pipeline.expenses[0],
            noi: &pipeline.noi[0],
            debt_service: pipeline.cash_flows[0].total_debt_service,
            capex_below_noi: pipeline.cash_flows[0].capex_reserves,
        },
        &pipeline.financing,
        &pipeline.equity,
    );
    let pro_forma = pro_forma_summary(scenario, &pipeline)?;

    let irr_cash_flows = HorizonReturns {
        five_year: levered(&pipeline, FIRST_EXIT_YEAR, discount_rate, &mut warnings),
        ten_year: levered(&pipeline, LAST_EXIT_YEAR, discount_rate, &mut warnings),
        hold_period: levered(&pipeline, hold_period, discount_rate, &mut warnings),
    };
    let unlevered_returns = HorizonReturns {
        five_year: unlevered(&pipeline, FIRST_EXIT_YEAR, discount_rate, &mut warnings),
        ten_year: unlevered(&pipeline, LAST_EXIT_YEAR, discount_rate, &mut warnings),
        hold_period: unlevered(&pipeline, hold_period, discount_rate, &mut warnings),
    };
    let waterfall_distribution = HorizonWaterfalls {
        five_year: waterfall(scenario, &pipeline, FIRST_EXIT_YEAR, &mut warnings),
        ten_year: waterfall(scenario, &pipeline, LAST_EXIT_YEAR, &mut warnings),
    };
    debug!("computed returns and waterfalls");

    let sensitivity_analysis = if pipeline.years >= FIRST_EXIT_YEAR {
        Some(sensitivity_grid(scenario, &mut warnings))
    } else {
        warnings.push(format!(
            "Projection shorter than {FIRST_EXIT_YEAR} years; no exit scenarios or sensitivity grid"
        ));
        None
    };

    let sources_and_uses = sources_and_uses(scenario, &pipeline.equity);
    let Pipeline {
        mut revenue,
        mut expenses,
        mut noi,
        financing,
        equity,
        cash_flows,
        sales,
        ..
    } = pipeline;
    revenue.truncate(n);
    expenses.truncate(n);
    noi.truncate(n);

    let analysis = DealAnalysis {
        property_name: scenario.property.name.clone(),
        projection_years: scenario.projection_years,
        hold_period_years: hold_period,
        year1,
        pro_forma,
        rent_roll: summarize_rent_roll(&scenario.rent_roll),
        revenue_projections: revenue,
        expense_projections: expenses,
        noi_projections: noi,
        financing_metrics: financing,
        cash_flow_projections: cash_flows,
        sale_analysis: sales,
        equity_investment: equity,
        sources_and_uses,
        irr_cash_flows,
        unlevered_returns,
        waterfall_distribution,
        sensitivity_analysis,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multifamily underwriting: rent-roll revenue, grown expenses, blended debt stack, \
         cap-rate reversion, Newton-Raphson IRR, LP/GP waterfall, exit cap x rent growth grid",
        &serde_json::json!({
            "projection_years": scenario.projection_years,
            "hold_period_years": analysis.hold_period_years,
            "annual_rent_growth": scenario.growth.annual_rent_growth.to_string(),
            "annual_expense_growth": scenario.growth.annual_expense_growth.to_string(),
            "vacancy_rate": scenario.growth.vacancy_rate.to_string(),
            "exit_cap_rate_5yr": scenario.growth.exit_cap_rate_5yr.to_string(),
            "exit_cap_rate_10yr": scenario.growth.exit_cap_rate_10yr.to_string(),
            "reserve_placement": scenario.sale.reserve_placement,
            "pref_accrual": scenario.waterfall.pref_accrual,
        }),
        warnings,
        elapsed,
        analysis,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financing::instruments::{DscrLoanTerms, LoanTerms};
    use crate::scenario::{ExpenseLine, Unit};
    use rust_decimal_macros::dec;

    fn scenario() -> Scenario {
        let mut s = Scenario::default();
        s.property.name = "Test Gardens".into();
        s.property.units = 10;
        s.property.square_feet = dec!(8000);
        s.property.purchase_price = dec!(1_500_000);
        s.rent_roll = (0..10)
            .map(|i| Unit {
                id: format!("{}", 100 + i),
                market_rent: dec!(1200),
                in_place_rent: dec!(1100),
                ..Default::default()
            })
            .collect();
        s.growth.annual_rent_growth = dec!(0.03);
        s.growth.annual_expense_growth = dec!(0.02);
        s.growth.vacancy_rate = dec!(0.05);
        s.growth.exit_cap_rate_5yr = dec!(0.065);
        s.growth.exit_cap_rate_10yr = dec!(0.07);
        s.sale.selling_costs_percent = dec!(0.02);
        s.expenses = vec![ExpenseLine {
            name: "Operating".into(),
            annual_amount: dec!(40_000),
            ..Default::default()
        }];
        s.financing.dscr_loan = Some(DscrLoanTerms {
            loan: LoanTerms {
                principal: dec!(900_000),
                annual_rate: dec!(0.065),
                amortization_years: 30,
                ..Default::default()
            },
            min_dscr: Some(dec!(1.2)),
            origination_fee_percent: Decimal::ZERO,
        });
        s
    }

    #[test]
    fn test_rejects_zero_projection() {
        let mut s = scenario();
        s.projection_years = 0;
        assert!(analyze_deal(&s).is_err());
    }

    #[test]
    fn test_projection_lengths() {
        let out = analyze_deal(&scenario()).unwrap();
        let a = &out.result;
        assert_eq!(a.revenue_projections.len(), 10);
        assert_eq!(a.noi_projections.len(), 10);
        assert_eq!(a.cash_flow_projections.len(), 10);
        assert_eq!(a.sale_analysis.len(), 6);
        assert!(a.irr_cash_flows.five_year.is_some());
        assert!(a.irr_cash_flows.ten_year.is_some());
        assert_eq!(a.irr_cash_flows.hold_period, a.irr_cash_flows.ten_year);
        assert!(a.sensitivity_analysis.is_some());
    }

    #[test]
    fn test_pro_forma_marks_rents_to_market() {
        let out = analyze_deal(&scenario()).unwrap();
        let a = &out.result;
        assert!(a.pro_forma.noi > a.year1.noi);
        assert_eq!(a.pro_forma.gross_potential_rent, a.year1.gross_potential_rent);
    }

    #[test]
    fn test_short_projection_has_no_exits() {
        let mut s = scenario();
        s.projection_years = 3;
        let out = analyze_deal(&s).unwrap();
        assert!(out.result.sale_analysis.is_empty());
        assert!(out.result.irr_cash_flows.five_year.is_none());
        assert!(out.result.sensitivity_analysis.is_none());
        // Hold defaults to the 3-year projection
        assert!(out.result.irr_cash_flows.hold_period.is_some());
    }

    #[test]
    fn test_hold_period_exit() {
        let mut s = scenario();
        s.acquisition.hold_period_years = 7;
        let out = analyze_deal(&s).unwrap();
        let hold = out.result.irr_cash_flows.hold_period.as_ref().unwrap();
        assert_eq!(hold.exit_year, 7);
        assert_eq!(hold.cash_flows.len(), 8);
    }

    #[test]
    fn test_zero_price_ratios_are_none() {
        let mut s = scenario();
        s.property.purchase_price = Decimal::ZERO;
        let out = analyze_deal(&s).unwrap();
        let y1 = &out.result.year1;
        assert_eq!(y1.price_per_unit, None);
        assert_eq!(y1.purchase_cap_rate, None);
        assert_eq!(y1.ltv, None);
        assert_eq!(y1.gross_rent_multiplier, None);
    }
}
