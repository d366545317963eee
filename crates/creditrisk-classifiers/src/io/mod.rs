//! Readers for the credit-card input tables (plain or zip-compressed CSV).
pub mod csv_input;

pub use csv_input::{read_dataset, read_dataset_from_reader};
