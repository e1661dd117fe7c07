//! Built-in objective components.
//!
//! An objective scores a whole genome; failures are reported as
//! [`EvaluationError`] and handled by the engine's worst-fitness policy.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use super::genome::{Allele, Genome};
use super::registry::{GenePool, PluginLoadError, parse_params};
use crate::schema::ObjectiveSpec;

/// Capability interface of an objective component.
pub trait Objective: Send + Sync {
    /// Objective name as configured.
    fn name(&self) -> &str;

    /// Score a genome.
    fn score(&self, genome: &Genome) -> Result<f64, EvaluationError>;
}

/// Failure to score a single individual.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EvaluationError {
    #[error("Objective '{objective}' cannot score genome: {reason}")]
    Degenerate { objective: String, reason: String },
    #[error("Objective '{objective}' produced a non-finite score")]
    NonFinite { objective: String },
    #[error("Expected {expected} objective values, got {found}")]
    ObjectiveCount { expected: usize, found: usize },
    #[error("Evaluation exceeded {0:?}")]
    Timeout(Duration),
    #[error("Evaluation worker terminated without a result")]
    WorkerLost,
}

impl EvaluationError {
    pub fn degenerate(objective: &str, reason: impl Into<String>) -> Self {
        Self::Degenerate {
            objective: objective.to_string(),
            reason: reason.into(),
        }
    }
}

/// Euclidean distance between a numeric gene and a target vector.
pub struct DistanceObjective {
    name: String,
    gene: usize,
    target: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DistanceParams {
    gene: String,
    target: Vec<f64>,
}

impl DistanceObjective {
    pub fn from_spec(
        spec: &ObjectiveSpec,
        pool: &GenePool,
    ) -> Result<Box<dyn Objective>, PluginLoadError> {
        let params: DistanceParams = parse_params(&spec.name, &spec.params)?;
        let gene = pool.resolve(&spec.name, &params.gene)?;

        Ok(Box::new(Self {
            name: spec.name.clone(),
            gene,
            target: params.target,
        }))
    }
}

impl Objective for DistanceObjective {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, genome: &Genome) -> Result<f64, EvaluationError> {
        let values = numeric_allele(&self.name, genome, self.gene)?;
        if values.len() != self.target.len() {
            return Err(EvaluationError::degenerate(
                &self.name,
                format!(
                    "gene has {} values, target has {}",
                    values.len(),
                    self.target.len()
                ),
            ));
        }

        let distance = values
            .iter()
            .zip(&self.target)
            .map(|(v, t)| (v - t).powi(2))
            .sum::<f64>()
            .sqrt();
        finite(&self.name, distance)
    }
}

/// Sum of the values of a numeric gene.
pub struct SumObjective {
    name: String,
    gene: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SumParams {
    gene: String,
}

impl SumObjective {
    pub fn from_spec(
        spec: &ObjectiveSpec,
        pool: &GenePool,
    ) -> Result<Box<dyn Objective>, PluginLoadError> {
        let params: SumParams = parse_params(&spec.name, &spec.params)?;
        let gene = pool.resolve(&spec.name, &params.gene)?;

        Ok(Box::new(Self {
            name: spec.name.clone(),
            gene,
        }))
    }
}

impl Objective for SumObjective {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, genome: &Genome) -> Result<f64, EvaluationError> {
        let values = numeric_allele(&self.name, genome, self.gene)?;
        finite(&self.name, values.iter().sum())
    }
}

/// Cost looked up per label of a categorical gene.
///
/// Labels without a configured cost cannot be scored.
pub struct CostObjective {
    name: String,
    gene: usize,
    costs: Vec<Option<f64>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CostParams {
    gene: String,
    costs: BTreeMap<String, f64>,
}

impl CostObjective {
    pub fn from_spec(
        spec: &ObjectiveSpec,
        pool: &GenePool,
    ) -> Result<Box<dyn Objective>, PluginLoadError> {
        let params: CostParams = parse_params(&spec.name, &spec.params)?;
        let gene = pool.resolve(&spec.name, &params.gene)?;
        let labels = pool
            .get(gene)
            .and_then(|g| g.labels())
            .ok_or_else(|| PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: format!("gene '{}' is not categorical", params.gene),
            })?;

        let costs = labels
            .iter()
            .map(|label| params.costs.get(label).copied())
            .collect();

        Ok(Box::new(Self {
            name: spec.name.clone(),
            gene,
            costs,
        }))
    }
}

impl Objective for CostObjective {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, genome: &Genome) -> Result<f64, EvaluationError> {
        match genome.get(self.gene) {
            Some(Allele::Choice(index)) => self
                .costs
                .get(*index)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    EvaluationError::degenerate(&self.name, format!("no cost for option {index}"))
                }),
            _ => Err(EvaluationError::degenerate(
                &self.name,
                "gene is missing or not categorical",
            )),
        }
    }
}

fn numeric_allele(
    objective: &str,
    genome: &Genome,
    gene: usize,
) -> Result<Vec<f64>, EvaluationError> {
    genome
        .get(gene)
        .and_then(Allele::as_numeric)
        .ok_or_else(|| EvaluationError::degenerate(objective, "gene is missing or not numeric"))
}

fn finite(objective: &str, value: f64) -> Result<f64, EvaluationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NonFinite {
            objective: objective.to_string(),
        })
    }
}
