//! Candidate solutions and their cached fitness.

use serde::Serialize;

use super::genome::{Genome, GenomeRng};
use super::nsga2::dominates;
use super::objectives::EvaluationError;
use super::operators::{Evaluator, Similarity, Variation};
use crate::schema::Goal;

/// A candidate individual in the population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Individual {
    /// Unique identifier.
    pub id: u64,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
    genome: Genome,
    fitness: Option<Vec<f64>>,
}

impl Individual {
    /// Create an unevaluated individual.
    pub fn new(id: u64, genome: Genome, generation: usize) -> Self {
        Self {
            id,
            generation,
            parents: Vec::new(),
            genome,
            fitness: None,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Mutable genome access. Invalidates the cached fitness.
    pub fn genome_mut(&mut self) -> &mut Genome {
        self.fitness = None;
        &mut self.genome
    }

    /// Cached fitness, if evaluated.
    pub fn fitness(&self) -> Option<&[f64]> {
        self.fitness.as_deref()
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub(crate) fn set_fitness(&mut self, fitness: Vec<f64>) {
        self.fitness = Some(fitness);
    }

    /// Drop the cached fitness.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// Compute and cache the fitness vector. Returns the cached vector when present.
    pub fn evaluate(&mut self, evaluator: &dyn Evaluator) -> Result<&[f64], EvaluationError> {
        if self.fitness.is_none() {
            let fitness = evaluator.evaluate(&self.genome)?;
            check_objective_count(&fitness, evaluator.objective_count())?;
            self.fitness = Some(fitness);
        }
        Ok(self.fitness.as_deref().unwrap_or_default())
    }

    /// Crossover with another individual; both genomes change in place.
    pub fn mate(&mut self, other: &mut Individual, variation: &dyn Variation, rng: &mut GenomeRng) {
        variation.crossover(&mut self.genome, &mut other.genome, rng);
        self.invalidate();
        other.invalidate();
    }

    /// Mutate with per-gene probability `indpb`.
    pub fn mutate(&mut self, indpb: f64, variation: &dyn Variation, rng: &mut GenomeRng) {
        variation.mutate(&mut self.genome, indpb, rng);
        self.invalidate();
    }

    /// Check whether two individuals are indistinguishable for archiving.
    pub fn similar(&self, other: &Individual, similarity: &dyn Similarity) -> bool {
        similarity.similar(self, other)
    }

    /// Pareto dominance over another evaluated individual.
    pub fn dominates(&self, other: &Individual, goals: &[Goal]) -> bool {
        match (self.fitness(), other.fitness()) {
            (Some(a), Some(b)) => dominates(a, b, goals),
            _ => false,
        }
    }
}

pub(crate) fn check_objective_count(
    fitness: &[f64],
    expected: usize,
) -> Result<(), EvaluationError> {
    if fitness.len() == expected {
        Ok(())
    } else {
        Err(EvaluationError::ObjectiveCount {
            expected,
            found: fitness.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::genome::Allele;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEvaluator {
        calls: AtomicUsize,
        goals: Vec<Goal>,
    }

    impl Evaluator for CountingEvaluator {
        fn evaluate(&self, genome: &Genome) -> Result<Vec<f64>, EvaluationError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let values = genome.get(0).and_then(Allele::as_numeric).unwrap_or_default();
            Ok(vec![values.iter().sum(), values.len() as f64])
        }

        fn goals(&self) -> &[Goal] {
            &self.goals
        }

        fn worst_fitness(&self) -> Vec<f64> {
            vec![f64::INFINITY; 2]
        }
    }

    struct ShiftVariation;

    impl Variation for ShiftVariation {
        fn crossover(&self, a: &mut Genome, b: &mut Genome, _rng: &mut GenomeRng) {
            std::mem::swap(a, b);
        }

        fn mutate(&self, genome: &mut Genome, _indpb: f64, _rng: &mut GenomeRng) {
            if let Some(Allele::Real(values)) = genome.alleles_mut().first_mut() {
                values.iter_mut().for_each(|v| *v += 1.0);
            }
        }
    }

    fn evaluator() -> CountingEvaluator {
        CountingEvaluator {
            calls: AtomicUsize::new(0),
            goals: vec![Goal::Minimize, Goal::Minimize],
        }
    }

    fn individual(id: u64, values: Vec<f64>) -> Individual {
        Individual::new(id, Genome::new(vec![Allele::Real(values)]), 0)
    }

    #[test]
    fn test_evaluate_is_cached() {
        let eval = evaluator();
        let mut ind = individual(0, vec![1.0, 2.0]);

        let first = ind.evaluate(&eval).unwrap().to_vec();
        let second = ind.evaluate(&eval).unwrap().to_vec();

        assert_eq!(first, vec![3.0, 2.0]);
        assert_eq!(first, second);
        assert_eq!(eval.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_mutation_invalidates_fitness() {
        let eval = evaluator();
        let mut rng = GenomeRng::new(0);
        let mut ind = individual(0, vec![1.0]);
        ind.evaluate(&eval).unwrap();

        ind.mutate(1.0, &ShiftVariation, &mut rng);
        assert!(!ind.is_evaluated());
        assert_eq!(ind.evaluate(&eval).unwrap(), &[2.0, 1.0]);
    }

    #[test]
    fn test_mate_changes_both_and_invalidates() {
        let eval = evaluator();
        let mut rng = GenomeRng::new(0);
        let mut a = individual(0, vec![1.0]);
        let mut b = individual(1, vec![5.0]);
        a.evaluate(&eval).unwrap();
        b.evaluate(&eval).unwrap();

        a.mate(&mut b, &ShiftVariation, &mut rng);
        assert!(!a.is_evaluated() && !b.is_evaluated());
        assert_eq!(a.genome().get(0), Some(&Allele::Real(vec![5.0])));
        assert_eq!(b.genome().get(0), Some(&Allele::Real(vec![1.0])));
    }

    #[test]
    fn test_genome_mut_invalidates() {
        let eval = evaluator();
        let mut ind = individual(0, vec![1.0]);
        ind.evaluate(&eval).unwrap();
        let _ = ind.genome_mut();
        assert!(ind.fitness().is_none());
    }

    #[test]
    fn test_objective_count_checked() {
        assert!(check_objective_count(&[1.0], 1).is_ok());
        assert_eq!(
            check_objective_count(&[1.0], 2),
            Err(EvaluationError::ObjectiveCount {
                expected: 2,
                found: 1
            })
        );
    }
}
