use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::UnderwritingError;
use crate::scenario::Scenario;
use crate::types::*;
use crate::UnderwritingResult;

/// Axis length cap; longer sweeps are truncated with a warning.
pub const MAX_AXIS_VALUES: usize = 25;

const CAP_RATE_OFFSETS: [Decimal; 5] = [dec!(-0.01), dec!(-0.005), dec!(0), dec!(0.005), dec!(0.01)];
const RENT_GROWTH_OFFSETS: [Decimal; 5] = [dec!(-0.02), dec!(-0.01), dec!(0), dec!(0.01), dec!(0.02)];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

/// Rows are exit cap rates, columns are rent growth rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub exit_cap_rates: Vec<Rate>,
    pub rent_growth_rates: Vec<Rate>,
    /// 5-year levered IRR per cell
    pub matrix: Vec<Vec<Option<Rate>>>,
    pub equity_multiple_matrix: Vec<Vec<Option<Multiple>>>,
    pub base_case_position: GridPosition,
}

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

/// `min..=max` by `step`, always ending on `max`.
pub fn sweep_values(var: &SensitivityVariable) -> UnderwritingResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: format!("sweep:{}", var.name),
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(UnderwritingError::InvalidInput {
            field: format!("sweep:{}", var.name),
            reason: "Min must be <= max".into(),
        });
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max && values.len() <= MAX_AXIS_VALUES {
        values.push(current);
        current += var.step;
    }
    if let Some(&last) = values.last() {
        if last < var.max && values.len() <= MAX_AXIS_VALUES {
            values.push(var.max);
        }
    }
    Ok(values)
}

fn axis_values(
    name: &str,
    explicit: &[Rate],
    sweep: Option<&SensitivityVariable>,
    defaults: Vec<Rate>,
    warnings: &mut Vec<String>,
) -> Vec<Rate> {
    let mut values = if !explicit.is_empty() {
        explicit.to_vec()
    } else if let Some(var) = sweep {
        match sweep_values(var) {
            Ok(v) => v,
            Err(e) => {
                warnings.push(format!("{name} sweep ignored: {e}"));
                defaults
            }
        }
    } else {
        defaults
    };

    if values.len() > MAX_AXIS_VALUES {
        warnings.push(format!(
            "{name} axis truncated to {MAX_AXIS_VALUES} values"
        ));
        values.truncate(MAX_AXIS_VALUES);
    }
    values
}

/// Index of the value nearest `target`.
pub fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Evaluate `cell(cap, growth)` over the cross product of both axes.
pub fn build_grid<F>(
    exit_cap_rates: Vec<Rate>,
    rent_growth_rates: Vec<Rate>,
    base_cap: Rate,
    base_growth: Rate,
    mut cell: F,
) -> SensitivityGrid
where
    F: FnMut(Rate, Rate) -> (Option<Rate>, Option<Multiple>),
{
    let mut matrix = Vec::with_capacity(exit_cap_rates.len());
    let mut equity_multiple_matrix = Vec::with_capacity(exit_cap_rates.len());

    for &cap in &exit_cap_rates {
        let (irr_row, em_row): (Vec<_>, Vec<_>) =
            rent_growth_rates.iter().map(|&g| cell(cap, g)).unzip();
        matrix.push(irr_row);
        equity_multiple_matrix.push(em_row);
    }

    let base_case_position = GridPosition {
        row: closest_index(&exit_cap_rates, base_cap),
        col: closest_index(&rent_growth_rates, base_growth),
    };

    SensitivityGrid {
        exit_cap_rates,
        rent_growth_rates,
        matrix,
        equity_multiple_matrix,
        base_case_position,
    }
}

/// Exit cap × rent growth grid for a scenario, each cell a full rerun of the
/// projection with those two assumptions overridden.
pub fn sensitivity_grid(scenario: &Scenario, warnings: &mut Vec<String>) -> SensitivityGrid {
    let base_cap = scenario.growth.exit_cap_rate_5yr;
    let base_growth = scenario.growth.annual_rent_growth;
    let config = &scenario.sensitivity;

    let caps = axis_values(
        "Exit cap rate",
        &config.exit_cap_rates,
        config.exit_cap_sweep.as_ref(),
        CAP_RATE_OFFSETS
            .iter()
            .map(|o| base_cap + o)
            .filter(|c| *c > Decimal::ZERO)
            .collect(),
        warnings,
    );
    let growths = axis_values(
        "Rent growth",
        &config.rent_growth_rates,
        config.rent_growth_sweep.as_ref(),
        RENT_GROWTH_OFFSETS.iter().map(|o| base_growth + o).collect(),
        warnings,
    );

    if caps.is_empty() {
        warnings.push("No positive exit cap rate to test; sensitivity grid is empty".into());
    }
    if caps.iter().any(|c| *c <= Decimal::ZERO) {
        warnings.push("Non-positive exit cap rates cannot price a sale; those rows are empty".into());
    }
    debug!(rows = caps.len(), cols = growths.len(), "building sensitivity grid");

    build_grid(caps, growths, base_cap, base_growth, |cap, growth| {
        let mut cell = scenario.clone();
        cell.growth.exit_cap_rate_5yr = cap;
        if cap <= Decimal::ZERO {
            // Otherwise a zero cap falls back to the 10-year rate
            cell.growth.exit_cap_rate_10yr = cap;
        }
        cell.growth.annual_rent_growth = growth;
        crate::analysis::five_year_levered_metrics(&cell)
    })
}

/// Standalone grid with the standard envelope.
pub fn run_sensitivity(
    scenario: &Scenario,
) -> UnderwritingResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    if scenario.projection_years < 5 {
        return Err(UnderwritingError::InvalidInput {
            field: "projection_years".into(),
            reason: "The 5-year exit grid needs at least 5 projection years".into(),
        });
    }

    let mut warnings = Vec::new();
    let grid = sensitivity_grid(scenario, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Exit cap rate x rent growth grid of 5-year levered IRR and equity multiple",
        &serde_json::json!({
            "base_exit_cap_rate": scenario.growth.exit_cap_rate_5yr.to_string(),
            "base_rent_growth": scenario.growth.annual_rent_growth.to_string(),
        }),
        warnings,
        elapsed,
        grid,
    ))
}
