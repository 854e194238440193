// Market data domain (daily series, volatility profiles)
pub mod market;

// Direction-forecast domain
pub mod ml;

// Volatility clustering domain
pub mod clustering;

// Domain-specific error types
pub mod errors;
