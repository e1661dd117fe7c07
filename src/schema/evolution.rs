//! Run bookkeeping types: statistics log, variation history, progress and stats.

use serde::{Deserialize, Serialize};

/// Fitness summary for one generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRecord {
    /// Generation index (0 is the initial population).
    #[serde(rename = "gen")]
    pub generation: usize,
    /// Evaluations performed in this generation.
    pub nevals: usize,
    /// Mean per objective.
    pub avg: Vec<f64>,
    /// Minimum per objective.
    pub min: Vec<f64>,
    /// Maximum per objective.
    pub max: Vec<f64>,
}

/// Append-only sequence of per-generation records.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct StatisticsLog {
    records: Vec<GenerationRecord>,
}

impl StatisticsLog {
    pub(crate) fn push(&mut self, record: GenerationRecord) {
        self.records.push(record);
    }

    /// All records in generation order.
    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&GenerationRecord> {
        self.records.last()
    }

    /// Number of recorded generations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one statistic for one objective across generations.
    pub fn select(&self, stat: Statistic, objective: usize) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| {
                let values = match stat {
                    Statistic::Avg => &r.avg,
                    Statistic::Min => &r.min,
                    Statistic::Max => &r.max,
                };
                values.get(objective).copied()
            })
            .collect()
    }
}

/// Statistic kind in a [`GenerationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Avg,
    Min,
    Max,
}

/// Variation operator applied to produce an offspring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VariationKind {
    /// Crossover of two parents.
    Mate,
    /// Mutation of a single parent.
    Mutate,
    /// Plain reproduction.
    Clone,
}

/// One entry in the variation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariationEvent {
    /// Generation in which the offspring was produced.
    pub generation: usize,
    /// Operator used.
    pub kind: VariationKind,
    /// Parent individual ids.
    pub parents: Vec<u64>,
    /// Offspring individual id.
    pub offspring: u64,
}

/// Genealogy of variation operators, appended by the engine after each variation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct History {
    events: Vec<VariationEvent>,
}

impl History {
    pub(crate) fn record(&mut self, event: VariationEvent) {
        self.events.push(event);
    }

    /// All events in the order they happened.
    pub fn events(&self) -> &[VariationEvent] {
        &self.events
    }

    /// Direct parents of an individual, empty for initial individuals.
    pub fn parents_of(&self, id: u64) -> &[u64] {
        self.events
            .iter()
            .find(|e| e.offspring == id)
            .map(|e| e.parents.as_slice())
            .unwrap_or(&[])
    }

    /// All ancestors of an individual, nearest first, without duplicates.
    pub fn lineage(&self, id: u64) -> Vec<u64> {
        let mut lineage = Vec::new();
        let mut frontier = vec![id];

        while let Some(current) = frontier.pop() {
            for &parent in self.parents_of(current) {
                if parent != id && !lineage.contains(&parent) {
                    lineage.push(parent);
                    frontier.insert(0, parent);
                }
            }
        }

        lineage
    }
}

/// Current phase of evolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Initial population evaluated.
    #[default]
    Initializing,
    /// Generations in progress.
    Evolving,
    /// All generations done.
    Complete,
    /// Stopped at a generation boundary on request.
    Stopped,
}

/// Progress snapshot reported after each completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Last completed generation.
    pub generation: usize,
    /// Configured generation count.
    pub total_generations: usize,
    /// Evaluations so far.
    pub evaluations: u64,
    /// Evaluations that fell back to worst fitness so far.
    pub failed_evaluations: u64,
    /// Current population size.
    pub population_size: usize,
    /// Current Pareto archive size.
    pub archive_size: usize,
    /// Record of the last completed generation.
    pub record: Option<GenerationRecord>,
    /// Current phase.
    pub phase: EvolutionPhase,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations completed after the initial one.
    pub generations: usize,
    /// Total evaluations performed.
    pub total_evaluations: u64,
    /// Evaluations that fell back to worst fitness.
    pub failed_evaluations: u64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the configured generation count.
    MaxGenerations,
    /// Cancelled at a generation boundary.
    Cancelled,
}
