//! Terminal views over the core: the dashboard listing and the analysis.

pub mod generator;

pub use generator::*;
