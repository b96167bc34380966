pub mod analysis;
pub mod debt;
pub mod returns;
