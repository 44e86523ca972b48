pub mod activities;
pub mod manager;

pub use manager::BaseManager;
