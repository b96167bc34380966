use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scenario::{Unit, UnitStatus};
use crate::types::{ratio, Money, Rate};

/// Averages for one floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeSummary {
    pub unit_type: String,
    pub count: u32,
    pub occupied: u32,
    pub avg_square_feet: Option<Decimal>,
    pub avg_market_rent: Option<Money>,
    pub avg_in_place_rent: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentRollSummary {
    pub total_units: u32,
    pub occupied_units: u32,
    pub vacant_units: u32,
    pub renovated_units: u32,
    pub classic_units: u32,
    pub physical_occupancy: Option<Rate>,
    pub total_square_feet: Decimal,
    /// Monthly totals across every unit
    pub market_rent_total: Money,
    pub in_place_rent_total: Money,
    pub avg_market_rent: Option<Money>,
    /// Average over occupied units only
    pub avg_in_place_rent: Option<Money>,
    pub market_rent_per_sqft: Option<Money>,
    /// Annualized, occupied units only; negative when leases are above market
    pub annual_loss_to_lease: Money,
    pub loss_to_lease_percent: Option<Rate>,
    pub by_unit_type: Vec<UnitTypeSummary>,
}

/// Year-0 annual loss to lease: Σ (market − in-place) × 12 over occupied units.
pub fn baseline_loss_to_lease(units: &[Unit]) -> Money {
    units
        .iter()
        .filter(|u| u.status.is_occupied())
        .map(|u| u.loss_to_lease() * Decimal::from(12))
        .sum()
}

pub fn summarize_rent_roll(units: &[Unit]) -> RentRollSummary {
    let total_units = units.len() as u32;
    let count_status =
        |status: UnitStatus| units.iter().filter(|u| u.status == status).count() as u32;
    let vacant_units = count_status(UnitStatus::Vacant);
    let occupied_units = total_units - vacant_units;

    let total_square_feet: Decimal = units.iter().map(|u| u.square_feet).sum();
    let market_rent_total: Money = units.iter().map(|u| u.market_rent).sum();
    let in_place_rent_total: Money = units
        .iter()
        .filter(|u| u.status.is_occupied())
        .map(|u| u.in_place_rent)
        .sum();
    let occupied_market_annual: Money = units
        .iter()
        .filter(|u| u.status.is_occupied())
        .map(|u| u.market_rent * Decimal::from(12))
        .sum();
    let annual_loss_to_lease = baseline_loss_to_lease(units);

    let mut groups: BTreeMap<&str, Vec<&Unit>> = BTreeMap::new();
    for unit in units {
        groups.entry(unit.unit_type.as_str()).or_default().push(unit);
    }
    let by_unit_type = groups
        .into_iter()
        .map(|(unit_type, members)| {
            let count = members.len() as u32;
            let occupied: Vec<&&Unit> =
                members.iter().filter(|u| u.status.is_occupied()).collect();
            UnitTypeSummary {
                unit_type: unit_type.to_string(),
                count,
                occupied: occupied.len() as u32,
                avg_square_feet: ratio(
                    members.iter().map(|u| u.square_feet).sum(),
                    Decimal::from(count),
                ),
                avg_market_rent: ratio(
                    members.iter().map(|u| u.market_rent).sum(),
                    Decimal::from(count),
                ),
                avg_in_place_rent: ratio(
                    occupied.iter().map(|u| u.in_place_rent).sum(),
                    Decimal::from(occupied.len() as u32),
                ),
            }
        })
        .collect();

    RentRollSummary {
        total_units,
        occupied_units,
        vacant_units,
        renovated_units: count_status(UnitStatus::Renovated),
        classic_units: count_status(UnitStatus::Classic),
        physical_occupancy: ratio(Decimal::from(occupied_units), Decimal::from(total_units)),
        total_square_feet,
        market_rent_total,
        in_place_rent_total,
        avg_market_rent: ratio(market_rent_total, Decimal::from(total_units)),
        avg_in_place_rent: ratio(in_place_rent_total, Decimal::from(occupied_units)),
        market_rent_per_sqft: ratio(market_rent_total, total_square_feet),
        annual_loss_to_lease,
        loss_to_lease_percent: ratio(annual_loss_to_lease, occupied_market_annual),
        by_unit_type,
    }
}
