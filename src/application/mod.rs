// Market data processing (indicators, profile preparation)
pub mod market_data;

// Direction forecasting
pub mod ml;

// Volatility clustering, elbow analysis and validation
pub mod clustering;

// Boundary facade
pub mod analytics_service;
