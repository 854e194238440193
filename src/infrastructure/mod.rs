// File adapters
pub mod csv_input;
