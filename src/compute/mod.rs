//! Compute module - the evolutionary search engine.

pub mod evolution;
