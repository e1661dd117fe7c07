//! Multi-objective evolutionary search.
//!
//! # Overview
//!
//! The search system consists of:
//!
//! - **Genomes** (`genome`): alleles, genomes and the seeded random source
//! - **Components** (`genes`, `objectives`, `registry`): configured gene and
//!   objective types resolved to typed implementations
//! - **Individuals** (`individual`): genomes with cached fitness vectors
//! - **Selection** (`nsga2`): non-dominated sorting with crowding distance
//! - **Archive** (`archive`): the Pareto front seen so far, without twins
//! - **Statistics** (`statistics`): per-generation mean, min and max
//! - **Engine** (`search`): the μ+λ loop with parallel evaluation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gaudi::compute::evolution::{ComponentRegistry, EvolutionEngine};
//! use gaudi::schema::Settings;
//!
//! let settings = Settings::from_path("essay.yaml").unwrap();
//! let components = ComponentRegistry::default().resolve(&settings).unwrap();
//! let mut engine = EvolutionEngine::new(&settings, Arc::new(components)).unwrap();
//!
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: archive size {}", progress.generation, progress.archive_size);
//! }).unwrap();
//!
//! println!("Pareto front: {} individuals", result.archive.len());
//! ```

mod archive;
mod genes;
mod genome;
mod individual;
mod nsga2;
mod objectives;
mod operators;
mod registry;
mod search;
mod statistics;

pub use archive::{ArchiveUpdate, ParetoArchive};
pub use genes::{ChoiceGene, Gene, IntegerGene, RealGene};
pub use genome::{Allele, Genome, GenomeRng, blend};
pub use individual::Individual;
pub use nsga2::{Nsga2Selection, crowding_distance, dominates, non_dominated_sort, select_nsga2};
pub use objectives::{CostObjective, DistanceObjective, EvaluationError, Objective, SumObjective};
pub use operators::{Evaluator, SelectionStrategy, Similarity, Variation};
pub use registry::{
    ComponentRegistry, Components, GeneFactory, GenePool, ObjectiveFactory, PluginLoadError,
    SimilarityRule,
};
pub use search::{EvolutionEngine, EvolutionResult};
pub use statistics::StatisticsRecorder;
