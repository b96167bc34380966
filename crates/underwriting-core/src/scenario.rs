use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::financing::instruments::FinancingStack;
use crate::growth::GrowthPolicy;
use crate::investment::waterfall::WaterfallTerms;
use crate::types::{Money, Rate, SensitivityVariable};

pub const DEFAULT_PROJECTION_YEARS: u32 = 10;

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Everything known about one deal. Immutable for the length of a run;
/// overrides (pro forma, sensitivity cells) work on a clone.
///
/// Missing numerics deserialize as zero and missing lists as empty, so a
/// partially extracted deal still analyzes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub property: PropertyFacts,
    pub acquisition: AcquisitionTerms,
    pub growth: GrowthAssumptions,
    pub sale: SaleAssumptions,
    pub rent_roll: Vec<Unit>,
    pub other_income: Vec<IncomeLine>,
    pub expenses: Vec<ExpenseLine>,
    pub financing: FinancingStack,
    pub waterfall: WaterfallTerms,
    pub sensitivity: SensitivityConfig,
    pub projection_years: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            property: PropertyFacts::default(),
            acquisition: AcquisitionTerms::default(),
            growth: GrowthAssumptions::default(),
            sale: SaleAssumptions::default(),
            rent_roll: Vec::new(),
            other_income: Vec::new(),
            expenses: Vec::new(),
            financing: FinancingStack::default(),
            waterfall: WaterfallTerms::default(),
            sensitivity: SensitivityConfig::default(),
            projection_years: DEFAULT_PROJECTION_YEARS,
        }
    }
}

impl Scenario {
    /// Units counted for per-unit metrics: the stated count, else the rent roll size.
    pub fn unit_count(&self) -> u32 {
        if self.property.units > 0 {
            self.property.units
        } else {
            self.rent_roll.len() as u32
        }
    }

    /// Price plus every acquisition cost, excluding loan fees.
    pub fn acquisition_cost_before_fees(&self) -> Money {
        self.property.purchase_price
            + self.acquisition.closing_costs
            + self.acquisition.acquisition_fee
            + self.acquisition.renovation_budget
            + self.acquisition.upfront_reserves
    }

    /// Stable SHA-256 hex digest of the scenario's JSON form.
    #[cfg(feature = "cache")]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        // Struct fields serialize in declaration order, so the bytes are canonical
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

// ---------------------------------------------------------------------------
// Property and acquisition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFacts {
    pub name: String,
    pub units: u32,
    pub square_feet: Decimal,
    pub purchase_price: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionTerms {
    /// Planned hold; 0 means hold for the full projection
    pub hold_period_years: u32,
    pub closing_costs: Money,
    pub acquisition_fee: Money,
    pub renovation_budget: Money,
    pub upfront_reserves: Money,
}

// ---------------------------------------------------------------------------
// Operating assumptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthAssumptions {
    pub annual_rent_growth: Rate,
    pub annual_expense_growth: Rate,
    pub vacancy_rate: Rate,
    pub bad_debt_rate: Rate,
    /// Share of net rental income paid to the manager
    pub management_fee_percent: Rate,
    pub concessions_annual: Money,
    pub loss_to_lease_policy: GrowthPolicy,
    pub concessions_policy: GrowthPolicy,
    pub exit_cap_rate_5yr: Rate,
    pub exit_cap_rate_10yr: Rate,
}

/// Where replacement reserves are deducted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservePlacement {
    /// Operating expense line, reduces NOI
    #[default]
    AboveNoi,
    /// Capital item, reduces cash flow after debt service
    BelowNoi,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleAssumptions {
    pub selling_costs_percent: Rate,
    pub capex_reserve_per_unit_per_year: Money,
    pub reserve_placement: ReservePlacement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
}

// ---------------------------------------------------------------------------
// Rent roll
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitStatus {
    #[default]
    Occupied,
    Vacant,
    Renovated,
    Classic,
}

impl UnitStatus {
    pub fn is_occupied(&self) -> bool {
        !matches!(self, UnitStatus::Vacant)
    }
}

/// One rentable unit. Rents are monthly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
    pub id: String,
    pub unit_type: String,
    pub square_feet: Decimal,
    pub status: UnitStatus,
    pub market_rent: Money,
    pub in_place_rent: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_end: Option<NaiveDate>,
}

impl Unit {
    /// Monthly market minus in-place rent; negative for above-market leases.
    pub fn loss_to_lease(&self) -> Money {
        self.market_rent - self.in_place_rent
    }
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeCategory {
    Laundry,
    Parking,
    PetFees,
    Storage,
    UtilityReimbursement,
    Fees,
    #[default]
    Other,
}

impl IncomeCategory {
    /// Other income is held flat unless a line says otherwise.
    pub fn default_growth(&self) -> GrowthPolicy {
        GrowthPolicy::Flat
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeLine {
    pub name: String,
    pub category: IncomeCategory,
    pub annual_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<GrowthPolicy>,
}

impl IncomeLine {
    pub fn growth_policy(&self) -> GrowthPolicy {
        self.growth.unwrap_or_else(|| self.category.default_growth())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCategory {
    PropertyTaxes,
    Insurance,
    Utilities,
    RepairsMaintenance,
    Payroll,
    ContractServices,
    Administrative,
    Marketing,
    Turnover,
    #[default]
    Other,
}

impl ExpenseCategory {
    pub fn default_growth(&self) -> GrowthPolicy {
        GrowthPolicy::ExpenseGrowth
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseLine {
    pub name: String,
    pub category: ExpenseCategory,
    pub annual_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<GrowthPolicy>,
}

impl ExpenseLine {
    pub fn growth_policy(&self) -> GrowthPolicy {
        self.growth.unwrap_or_else(|| self.category.default_growth())
    }
}

// ---------------------------------------------------------------------------
// Sensitivity axes
// ---------------------------------------------------------------------------

/// Candidate axis values. An explicit list wins over a sweep; with neither,
/// the grid is centred on the base case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    pub exit_cap_rates: Vec<Rate>,
    pub rent_growth_rates: Vec<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_cap_sweep: Option<SensitivityVariable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_growth_sweep: Option<SensitivityVariable>,
}
