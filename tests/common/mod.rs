//! Shared test fixtures (used by unit and proptest)

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;
