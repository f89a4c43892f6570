//! CLI command implementations.

pub mod audit;
pub mod clean;
pub mod deps;
pub mod doctor;
pub mod generate;
pub mod target;
pub mod wrap;
