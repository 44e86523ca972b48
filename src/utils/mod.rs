//! Utility modules for crudbase

pub mod filter;

pub use filter::{filter_null_fields, filter_valid_fields};
