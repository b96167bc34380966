pub mod expenses;
pub mod noi;
pub mod rent_roll;
pub mod revenue;
