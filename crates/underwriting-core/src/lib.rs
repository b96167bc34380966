pub mod error;
pub mod growth;
pub mod scenario;
pub mod time_value;
pub mod types;

pub mod financing;
pub mod investment;
pub mod operations;

pub mod analysis;

#[cfg(feature = "cache")]
pub mod cache;

pub use analysis::{analyze_deal, DealAnalysis};
pub use error::UnderwritingError;
pub use scenario::Scenario;
pub use types::*;

/// Standard result type for all underwriting operations
pub type UnderwritingResult<T> = Result<T, UnderwritingError>;
