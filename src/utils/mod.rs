//! Shared utilities: address shape checks.

pub mod address;

pub use address::{is_plausible_address, validate_addresses};
