//! Utility functions and types

pub mod data_loader;
pub mod fs;

pub use data_loader::{load_csv, parse_csv_bytes, to_csv_bytes};
pub use fs::write_atomic;
