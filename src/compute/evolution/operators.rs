//! Interfaces injected into the evolution engine.

use super::genome::{Genome, GenomeRng};
use super::individual::Individual;
use super::objectives::EvaluationError;
use crate::schema::Goal;

/// Maps a genome to its objective vector.
pub trait Evaluator: Send + Sync {
    /// Score every objective.
    fn evaluate(&self, genome: &Genome) -> Result<Vec<f64>, EvaluationError>;

    /// Optimisation direction per objective.
    fn goals(&self) -> &[Goal];

    /// Fitness assigned when evaluation fails.
    fn worst_fitness(&self) -> Vec<f64>;

    /// Number of objectives.
    fn objective_count(&self) -> usize {
        self.goals().len()
    }
}

/// Genome-level crossover and mutation.
pub trait Variation: Send + Sync {
    /// Recombine two genomes in place.
    fn crossover(&self, a: &mut Genome, b: &mut Genome, rng: &mut GenomeRng);

    /// Mutate a genome in place with per-gene probability `indpb`.
    fn mutate(&self, genome: &mut Genome, indpb: f64, rng: &mut GenomeRng);
}

/// Decides whether two individuals are duplicates for archiving purposes.
pub trait Similarity: Send + Sync {
    fn similar(&self, a: &Individual, b: &Individual) -> bool;
}

/// Reduces a pool of evaluated individuals to the next generation.
pub trait SelectionStrategy: Send + Sync {
    /// Select exactly `min(n, pool.len())` individuals.
    fn select(&self, pool: Vec<Individual>, n: usize, goals: &[Goal]) -> Vec<Individual>;
}
