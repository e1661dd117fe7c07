//! Pareto archive: the non-dominated front seen across generations.

use log::debug;

use super::individual::Individual;
use super::nsga2::{crowding_distance, dominates, lexicographic};
use super::operators::Similarity;
use crate::schema::Goal;

/// Archive of mutually non-dominated individuals, deduplicated by a
/// [`Similarity`] oracle.
///
/// Members are kept best-first in lexicographic order of their oriented
/// fitness; equal fitness vectors keep insertion order.
#[derive(Debug, Clone)]
pub struct ParetoArchive {
    members: Vec<Individual>,
    goals: Vec<Goal>,
    /// Maximum archive size.
    capacity: Option<usize>,
}

/// Changes made by one [`ParetoArchive::update`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveUpdate {
    pub inserted: usize,
    pub removed: usize,
}

impl ParetoArchive {
    /// Create an unbounded archive.
    pub fn new(goals: Vec<Goal>) -> Self {
        Self {
            members: Vec::new(),
            goals,
            capacity: None,
        }
    }

    /// Bound the archive size. When exceeded, the most crowded member is dropped.
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Merge candidates into the archive.
    ///
    /// A candidate dominated by a member is rejected. Members dominated by the
    /// candidate are removed. A candidate similar to a remaining member is a
    /// twin and is rejected, so the first one encountered survives.
    pub fn update(&mut self, candidates: &[Individual], similarity: &dyn Similarity) -> ArchiveUpdate {
        let mut update = ArchiveUpdate::default();

        for candidate in candidates {
            let Some(fitness) = candidate.fitness() else {
                continue;
            };

            let dominated = self.members.iter().any(|member| {
                member
                    .fitness()
                    .is_some_and(|m| dominates(m, fitness, &self.goals))
            });
            if dominated {
                continue;
            }

            let before = self.members.len();
            let goals = &self.goals;
            self.members.retain(|member| {
                !member
                    .fitness()
                    .is_some_and(|m| dominates(fitness, m, goals))
            });
            update.removed += before - self.members.len();

            if self
                .members
                .iter()
                .any(|member| similarity.similar(member, candidate))
            {
                continue;
            }

            let position = self.members.partition_point(|member| {
                member
                    .fitness()
                    .is_some_and(|m| lexicographic(m, fitness, &self.goals).is_le())
            });
            self.members.insert(position, candidate.clone());
            update.inserted += 1;

            if self.enforce_capacity() {
                update.removed += 1;
            }
        }

        if update.inserted > 0 || update.removed > 0 {
            debug!(
                "Archive update: +{} -{} ({} members)",
                update.inserted,
                update.removed,
                self.members.len()
            );
        }

        update
    }

    /// Drops the member with the smallest crowding distance when over capacity.
    fn enforce_capacity(&mut self) -> bool {
        let Some(capacity) = self.capacity else {
            return false;
        };
        if self.members.len() <= capacity {
            return false;
        }

        let fitnesses: Vec<&[f64]> = self.members.iter().filter_map(Individual::fitness).collect();
        let front: Vec<usize> = (0..fitnesses.len()).collect();
        let distances = crowding_distance(&front, &fitnesses);

        // the last of equally crowded members goes, so earlier ones are kept
        let victim = distances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(index, _)| index);

        match victim {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Archive members, best first.
    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn iter(&self) -> impl Iterator<Item = &Individual> {
        self.members.iter()
    }

    /// Get archive size.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if archive is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }
}
