pub mod cash_flow;
pub mod equity;
pub mod returns;
pub mod sale;
pub mod sensitivity;
pub mod waterfall;
