use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use underwriting_core::analysis::analyze_deal;
use underwriting_core::financing::instruments::{DscrLoanTerms, LoanTerms, SubjectToTerms};
use underwriting_core::investment::sale::sale_for_year;
use underwriting_core::operations::expenses::project_expenses;
use underwriting_core::operations::noi::aggregate_noi;
use underwriting_core::operations::revenue::project_revenue;
use underwriting_core::scenario::{ExpenseLine, Scenario, Unit};

// ===========================================================================
// Fixtures
// ===========================================================================

/// 50 units at $1,000, no vacancy or growth: GPR $600,000 less `expenses`.
fn flat_deal(expenses: Decimal) -> Scenario {
    let mut s = Scenario::default();
    s.property.name = "Cedar Flats".into();
    s.property.units = 50;
    s.property.square_feet = dec!(40_000);
    s.property.purchase_price = dec!(5_000_000);
    s.rent_roll = (0..50)
        .map(|i| Unit {
            id: format!("{}", 101 + i),
            unit_type: if i % 2 == 0 { "1x1".into() } else { "2x1".into() },
            market_rent: dec!(1000),
            in_place_rent: dec!(1000),
            ..Default::default()
        })
        .collect();
    s.expenses = vec![ExpenseLine {
        name: "Operating".into(),
        annual_amount: expenses,
        ..Default::default()
    }];
    s
}

fn senior_loan(principal: Decimal) -> DscrLoanTerms {
    DscrLoanTerms {
        loan: LoanTerms {
            principal,
            annual_rate: dec!(0.06),
            amortization_years: 30,
            ..Default::default()
        },
        min_dscr: Some(dec!(1.25)),
        origination_fee_percent: Decimal::ZERO,
    }
}

fn value_add_deal() -> Scenario {
    let mut s = flat_deal(dec!(240_000));
    for (i, unit) in s.rent_roll.iter_mut().enumerate() {
        unit.in_place_rent = dec!(920) + Decimal::from(i as u32 % 5) * dec!(10);
    }
    s.growth.annual_rent_growth = dec!(0.035);
    s.growth.annual_expense_growth = dec!(0.025);
    s.growth.vacancy_rate = dec!(0.06);
    s.growth.bad_debt_rate = dec!(0.005);
    s.growth.management_fee_percent = dec!(0.03);
    s.growth.exit_cap_rate_5yr = dec!(0.0625);
    s.growth.exit_cap_rate_10yr = dec!(0.065);
    s.sale.selling_costs_percent = dec!(0.02);
    s.sale.capex_reserve_per_unit_per_year = dec!(250);
    s.acquisition.closing_costs = dec!(75_000);
    s.financing.dscr_loan = Some(senior_loan(dec!(3_250_000)));
    s.financing.seller_carryback = Some(LoanTerms {
        principal: dec!(250_000),
        annual_rate: dec!(0.05),
        interest_only: true,
        term_years: 7,
        ..Default::default()
    });
    s.waterfall.preferred_return = dec!(0.08);
    s.waterfall.lp_equity_share = dec!(0.9);
    s.waterfall.gp_equity_share = dec!(0.1);
    s.waterfall.lp_split_after_pref = dec!(0.7);
    s.waterfall.gp_promote_after_pref = dec!(0.3);
    s.waterfall.lp_split_pre_pref = dec!(0.9);
    s.waterfall.gp_split_pre_pref = dec!(0.1);
    s
}

// ===========================================================================
// Known answers
// ===========================================================================

#[test]
fn test_seventy_five_percent_ltv_dscr() {
    // NOI 350k; 3.75M at 6%/30y → ~22,483/month, ~269,798/year
    let mut s = flat_deal(dec!(250_000));
    s.financing.dscr_loan = Some(senior_loan(dec!(3_750_000)));
    s.growth.exit_cap_rate_5yr = dec!(0.06);

    let out = analyze_deal(&s).unwrap();
    let y1 = &out.result.year1;
    assert_eq!(y1.noi, dec!(350_000));
    assert_eq!(y1.ltv, Some(dec!(0.75)));
    assert!(
        (y1.debt_service - dec!(269_798)).abs() < dec!(1),
        "Expected annual debt service ~269,798, got {}",
        y1.debt_service
    );
    let dscr = y1.dscr.unwrap();
    assert!((dscr - dec!(1.30)).abs() < dec!(0.01), "DSCR {dscr}");

    let senior = &out.result.financing_metrics.instruments[0];
    assert!((senior.monthly_payment - dec!(22_483.14)).abs() < dec!(0.01));
    assert_eq!(y1.price_per_unit, Some(dec!(100_000)));
    assert_eq!(y1.purchase_cap_rate, Some(dec!(0.07)));
}

#[test]
fn test_reversion_at_six_percent_cap() {
    // Flat NOI of 400k, so year-6 forward NOI is 400k
    let mut s = flat_deal(dec!(200_000));
    s.growth.exit_cap_rate_5yr = dec!(0.06);
    s.sale.selling_costs_percent = dec!(0.02);

    let revenue = project_revenue(&s, 6).unwrap();
    let expenses = project_expenses(&s, &revenue).unwrap();
    let noi = aggregate_noi(&revenue, &expenses, s.unit_count());
    let mut warnings = Vec::new();
    let sale = sale_for_year(&s, &[], &noi, 5, &mut warnings).unwrap();

    assert_eq!(sale.forward_noi, dec!(400_000));
    let gross = sale.gross_sale_price.unwrap();
    assert!((gross - dec!(6_666_666.67)).abs() < dec!(0.01));
    let net = sale.net_sale_proceeds.unwrap();
    assert!((net - dec!(6_533_333.33)).abs() < dec!(0.01));
    assert!(warnings.is_empty());
}

#[test]
fn test_zero_price_omits_price_ratios() {
    let mut s = flat_deal(dec!(250_000));
    s.property.purchase_price = Decimal::ZERO;
    let out = analyze_deal(&s).unwrap();
    let y1 = &out.result.year1;
    assert_eq!(y1.price_per_unit, None);
    assert_eq!(y1.purchase_cap_rate, None);
    assert_eq!(y1.ltv, None);
    assert!(out.warnings.iter().any(|w| w.contains("Purchase price")));
}

// ===========================================================================
// Pipeline
// ===========================================================================

#[test]
fn test_identical_scenarios_give_identical_result_payloads() {
    // metadata.computation_time_us is wall-clock and differs between runs
    let s = value_add_deal();
    let first = analyze_deal(&s).unwrap();
    let second = analyze_deal(&s.clone()).unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.warnings, second.warnings);
    assert_eq!(first.methodology, second.methodology);
    assert_eq!(first.assumptions, second.assumptions);
    assert_eq!(first.metadata.version, second.metadata.version);
    assert_eq!(first.metadata.precision, second.metadata.precision);
}

#[test]
fn test_cash_flow_ties_to_noi_and_debt_service() {
    let out = analyze_deal(&value_add_deal()).unwrap();
    let a = &out.result;
    for (cf, noi) in a.cash_flow_projections.iter().zip(&a.noi_projections) {
        assert_eq!(cf.noi, noi.noi);
        assert_eq!(
            cf.before_tax_cash_flow,
            cf.noi - cf.total_debt_service - cf.capex_reserves,
            "Year {}",
            cf.year
        );
        let by_instrument: Decimal = cf.debt_service_by_instrument.iter().map(|l| l.amount).sum();
        assert_eq!(by_instrument, cf.total_debt_service);
    }
}

#[test]
fn test_sources_equal_uses() {
    let out = analyze_deal(&value_add_deal()).unwrap();
    let a = &out.result;
    assert!(a.sources_and_uses.balanced);
    assert_eq!(a.sources_and_uses.total_sources, a.sources_and_uses.total_uses);
    assert_eq!(
        a.equity_investment.required_equity,
        dec!(5_075_000) - dec!(3_500_000)
    );
    assert_eq!(
        a.equity_investment.lp_equity + a.equity_investment.gp_equity,
        a.equity_investment.required_equity
    );
}

#[test]
fn test_carryback_is_paid_off_at_sale() {
    let out = analyze_deal(&value_add_deal()).unwrap();
    let five = &out.result.sale_analysis[0];
    assert_eq!(five.exit_year, 5);
    let carryback = five
        .loan_payoffs
        .iter()
        .find(|l| l.name == "Seller Carryback")
        .unwrap();
    assert_eq!(carryback.amount, dec!(250_000));

    // Term ends in year 7; the balloon stays owed until the sale
    let ten = out.result.sale_analysis.last().unwrap();
    assert_eq!(ten.exit_year, 10);
    let carryback = ten
        .loan_payoffs
        .iter()
        .find(|l| l.name == "Seller Carryback")
        .unwrap();
    assert_eq!(carryback.amount, dec!(250_000));
    assert!(out.warnings.iter().any(|w| w.contains("unfunded balloon")));
}

#[test]
fn test_waterfall_distributes_levered_cash() {
    let out = analyze_deal(&value_add_deal()).unwrap();
    let a = &out.result;
    let levered = a.irr_cash_flows.five_year.as_ref().unwrap();
    let wf = a.waterfall_distribution.five_year.as_ref().unwrap();

    assert_eq!(wf.years.len(), 5);
    let distributed: Decimal = wf.years.iter().map(|y| y.distributable_cash).sum();
    let levered_inflows: Decimal = levered.cash_flows.iter().skip(1).copied().sum();
    assert_eq!(distributed, levered_inflows);
    assert_eq!(
        wf.total_lp_distributions + wf.total_gp_distributions,
        distributed
    );
}

#[test]
fn test_sensitivity_base_cell_matches_five_year_irr() {
    let out = analyze_deal(&value_add_deal()).unwrap();
    let a = &out.result;
    let grid = a.sensitivity_analysis.as_ref().unwrap();
    assert_eq!(grid.matrix.len(), 5);
    assert!(grid.matrix.iter().all(|row| row.len() == 5));

    let pos = grid.base_case_position;
    assert_eq!((pos.row, pos.col), (2, 2));
    let base = grid.matrix[pos.row][pos.col];
    assert_eq!(base, a.irr_cash_flows.five_year.as_ref().unwrap().irr);

    // Lower exit cap, higher price, higher IRR
    let low_cap = grid.matrix[0][pos.col].unwrap();
    let high_cap = grid.matrix[4][pos.col].unwrap();
    assert!(low_cap > high_cap);
}

#[test]
fn test_subject_to_balance_reduces_over_hold() {
    let mut s = flat_deal(dec!(250_000));
    s.growth.exit_cap_rate_5yr = dec!(0.065);
    s.financing.subject_to = Some(SubjectToTerms {
        current_balance: dec!(2_000_000),
        annual_rate: dec!(0.04),
        original_term_months: 360,
        remaining_term_months: 300,
    });
    let out = analyze_deal(&s).unwrap();
    let schedule = &out.result.financing_metrics.schedule;
    assert_eq!(schedule.len(), 10);
    assert!(schedule
        .windows(2)
        .all(|w| w[1].ending_balance < w[0].ending_balance));
    let payoff = out.result.sale_analysis[0].total_loan_payoff;
    assert_eq!(payoff, schedule[4].ending_balance);
}

#[test]
fn test_subject_to_without_remaining_term_is_repaid_at_sale() {
    let mut s = flat_deal(dec!(250_000));
    s.growth.exit_cap_rate_5yr = dec!(0.065);
    s.financing.subject_to = Some(SubjectToTerms {
        current_balance: dec!(600_000),
        annual_rate: dec!(0.05),
        original_term_months: 360,
        remaining_term_months: 0,
    });
    let out = analyze_deal(&s).unwrap();
    let a = &out.result;
    assert_eq!(a.financing_metrics.total_debt, dec!(600_000));
    assert_eq!(a.cash_flow_projections[0].total_debt_service, Decimal::ZERO);
    for sale in &a.sale_analysis {
        assert_eq!(sale.total_loan_payoff, dec!(600_000), "Exit year {}", sale.exit_year);
    }
    assert!(out.warnings.iter().any(|w| w.contains("unfunded balloon")));
}

// ===========================================================================
// Out-of-range inputs
// ===========================================================================

#[test]
fn test_runaway_rent_growth_is_an_error() {
    let mut s = flat_deal(dec!(250_000));
    s.projection_years = 50;
    s.growth.annual_rent_growth = dec!(2.0);
    s.growth.exit_cap_rate_5yr = dec!(0.06);
    let err = analyze_deal(&s).unwrap_err();
    assert!(err.to_string().contains("Gross potential rent"), "{err}");
}

#[test]
fn test_vanishing_exit_cap_leaves_sale_unpriced() {
    let mut s = flat_deal(dec!(250_000));
    s.financing.dscr_loan = Some(senior_loan(dec!(3_000_000)));
    s.growth.exit_cap_rate_5yr = Decimal::new(1, 27);
    let out = analyze_deal(&s).unwrap();
    let a = &out.result;
    assert_eq!(a.sale_analysis[0].gross_sale_price, None);
    assert_eq!(a.sale_analysis[0].net_sale_proceeds, None);
    assert!(a.irr_cash_flows.five_year.is_none());
    assert!(a.waterfall_distribution.five_year.is_none());
    assert!(out.warnings.iter().any(|w| w.contains("Year 5 sale not priced")));
}

#[test]
fn test_non_positive_exit_caps_leave_grid_rows_empty() {
    let mut s = value_add_deal();
    s.sensitivity.exit_cap_rates = vec![Decimal::ZERO, dec!(-0.01), dec!(0.0625)];
    let out = analyze_deal(&s).unwrap();
    let grid = out.result.sensitivity_analysis.as_ref().unwrap();

    assert_eq!(grid.matrix.len(), 3);
    for row in &grid.matrix[..2] {
        assert!(row.iter().all(|cell| cell.is_none()));
    }
    for row in &grid.equity_multiple_matrix[..2] {
        assert!(row.iter().all(|cell| cell.is_none()));
    }
    assert!(grid.matrix[2].iter().all(|cell| cell.is_some()));
    assert_eq!(grid.base_case_position.row, 2);
    assert!(out.warnings.iter().any(|w| w.contains("Non-positive exit cap rates")));
}

#[test]
fn test_projection_too_long_is_rejected() {
    let mut s = flat_deal(dec!(250_000));
    s.projection_years = 51;
    assert!(analyze_deal(&s).is_err());
}
