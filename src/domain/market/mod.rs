// Market data domain
pub mod time_series;
pub mod volatility_profile;
