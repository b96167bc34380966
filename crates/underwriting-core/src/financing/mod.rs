pub mod amortization;
pub mod instruments;
pub mod metrics;

pub use instruments::{FinancingInstrument, FinancingStack, InstrumentKind};
pub use metrics::{analyze_financing, FinancingMetrics};
