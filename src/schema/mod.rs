//! Schema module - Settings and run bookkeeping types for GAUDI essays.

mod config;
mod evolution;

pub use config::*;
pub use evolution::*;
