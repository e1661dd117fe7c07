//! GAUDI - Multi-objective evolutionary search with a Pareto archive.
//!
//! This crate runs a μ+λ genetic algorithm over genomes assembled from
//! configurable gene components, scored by configurable objectives, and
//! keeps the non-dominated solutions it finds in a deduplicated archive.
//!
//! # Architecture
//!
//! - `schema`: settings types and run bookkeeping (statistics log, history)
//! - `compute`: the evolution engine (components, NSGA-II, archive, loop)
//! - `output`: genome artifacts and the result manifest
//! - `essay`: the settings-to-manifest pipeline used by the CLI
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use gaudi::{compute::evolution::ComponentRegistry, essay::run_essay, schema::Settings};
//!
//! let settings = Settings::from_path("essay.yaml").unwrap();
//! let outcome = run_essay(
//!     &settings,
//!     &ComponentRegistry::default(),
//!     Arc::new(AtomicBool::new(false)),
//!     |_| {},
//! )
//! .unwrap();
//!
//! println!("Manifest written to {}", outcome.manifest.display());
//! ```

pub mod compute;
pub mod error;
pub mod essay;
pub mod output;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{ComponentRegistry, EvolutionEngine, EvolutionResult};
pub use error::{Error, Result};
pub use schema::Settings;
