// Market data processing modules
pub mod indicators;
pub mod profile_preparation;
