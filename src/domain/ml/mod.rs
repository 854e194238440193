pub mod feature_registry;
pub mod feature_table;
pub mod forecast;
