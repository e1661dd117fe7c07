//! Component registry: resolves configured gene and objective types to
//! typed implementations.
//!
//! The registry maps a component `type` name to a factory. Resolving a
//! [`Settings`] document produces a closed [`Components`] set that the
//! engine uses through its [`Evaluator`], [`Variation`] and [`Similarity`]
//! seams.

use std::collections::BTreeMap;

use log::debug;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use super::genes::{ChoiceGene, Gene, IntegerGene, RealGene};
use super::genome::{Genome, GenomeRng};
use super::individual::Individual;
use super::objectives::{
    CostObjective, DistanceObjective, EvaluationError, Objective, SumObjective,
};
use super::operators::{Evaluator, Similarity, Variation};
use crate::schema::{GeneSpec, Goal, ObjectiveSpec, Settings};

/// Errors raised while resolving components.
#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("Gene '{name}' has unknown type '{kind}'")]
    UnknownGene { name: String, kind: String },
    #[error("Objective '{name}' has unknown type '{kind}'")]
    UnknownObjective { name: String, kind: String },
    #[error("Invalid parameters for '{component}': {source}")]
    InvalidParameters {
        component: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Objective '{objective}' references unknown gene '{gene}'")]
    UnknownGeneReference { objective: String, gene: String },
    #[error("Invalid component '{component}': {reason}")]
    InvalidComponent { component: String, reason: String },
}

/// Deserialize component-specific parameters.
pub(crate) fn parse_params<T: DeserializeOwned>(
    component: &str,
    params: &BTreeMap<String, Value>,
) -> Result<T, PluginLoadError> {
    let mapping: Mapping = params
        .iter()
        .map(|(key, value)| (Value::String(key.clone()), value.clone()))
        .collect();

    serde_yaml::from_value(Value::Mapping(mapping)).map_err(|source| {
        PluginLoadError::InvalidParameters {
            component: component.to_string(),
            source,
        }
    })
}

/// Resolved gene components, in genome order.
pub struct GenePool {
    genes: Vec<Box<dyn Gene>>,
}

impl GenePool {
    pub fn new(genes: Vec<Box<dyn Gene>>) -> Self {
        Self { genes }
    }

    /// Position of the gene named `gene`, as referenced by `objective`.
    pub fn resolve(&self, objective: &str, gene: &str) -> Result<usize, PluginLoadError> {
        self.index_of(gene)
            .ok_or_else(|| PluginLoadError::UnknownGeneReference {
                objective: objective.to_string(),
                gene: gene.to_string(),
            })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.genes.iter().position(|g| g.name() == name)
    }

    pub fn get(&self, index: usize) -> Option<&dyn Gene> {
        self.genes.get(index).map(|g| g.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Gene> {
        self.genes.iter().map(|g| g.as_ref())
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Builds a gene component from its specification.
pub type GeneFactory = fn(&GeneSpec) -> Result<Box<dyn Gene>, PluginLoadError>;

/// Builds an objective component from its specification and the resolved genes.
pub type ObjectiveFactory =
    fn(&ObjectiveSpec, &GenePool) -> Result<Box<dyn Objective>, PluginLoadError>;

/// Maps component type names to factories.
pub struct ComponentRegistry {
    genes: BTreeMap<String, GeneFactory>,
    objectives: BTreeMap<String, ObjectiveFactory>,
}

impl Default for ComponentRegistry {
    /// Registry holding the built-in components.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_gene("real", RealGene::from_spec);
        registry.register_gene("integer", IntegerGene::from_spec);
        registry.register_gene("choice", ChoiceGene::from_spec);
        registry.register_objective("distance", DistanceObjective::from_spec);
        registry.register_objective("sum", SumObjective::from_spec);
        registry.register_objective("cost", CostObjective::from_spec);
        registry
    }
}

impl ComponentRegistry {
    /// Registry without any component.
    pub fn empty() -> Self {
        Self {
            genes: BTreeMap::new(),
            objectives: BTreeMap::new(),
        }
    }

    /// Register a gene factory, replacing any factory of the same type.
    pub fn register_gene(&mut self, kind: &str, factory: GeneFactory) -> &mut Self {
        self.genes.insert(kind.to_string(), factory);
        self
    }

    /// Register an objective factory, replacing any factory of the same type.
    pub fn register_objective(&mut self, kind: &str, factory: ObjectiveFactory) -> &mut Self {
        self.objectives.insert(kind.to_string(), factory);
        self
    }

    /// Registered gene types.
    pub fn gene_types(&self) -> impl Iterator<Item = &str> {
        self.genes.keys().map(String::as_str)
    }

    /// Registered objective types.
    pub fn objective_types(&self) -> impl Iterator<Item = &str> {
        self.objectives.keys().map(String::as_str)
    }

    /// Instantiate every configured gene and objective.
    pub fn resolve(&self, settings: &Settings) -> Result<Components, PluginLoadError> {
        let genes = settings
            .genes
            .iter()
            .map(|spec| {
                let factory =
                    self.genes
                        .get(&spec.kind)
                        .ok_or_else(|| PluginLoadError::UnknownGene {
                            name: spec.name.clone(),
                            kind: spec.kind.clone(),
                        })?;
                factory(spec)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pool = GenePool::new(genes);

        let objectives = settings
            .objectives
            .iter()
            .map(|spec| {
                let factory = self.objectives.get(&spec.kind).ok_or_else(|| {
                    PluginLoadError::UnknownObjective {
                        name: spec.name.clone(),
                        kind: spec.kind.clone(),
                    }
                })?;
                factory(spec, &pool)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Resolved {} genes and {} objectives",
            pool.len(),
            objectives.len()
        );

        let similarity = if settings.ga.similarity {
            SimilarityRule::Tolerance(settings.ga.similarity_threshold)
        } else {
            SimilarityRule::Exact
        };

        Ok(Components {
            pool,
            objectives,
            goals: settings.objectives.iter().map(|o| o.goal).collect(),
            worst: settings
                .objectives
                .iter()
                .map(ObjectiveSpec::worst_value)
                .collect(),
            descriptors: settings.objective_descriptors(),
            similarity,
        })
    }
}

/// How the archive decides two individuals are twins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimilarityRule {
    /// Identical genomes only.
    Exact,
    /// Every gene distance at or below the threshold.
    Tolerance(f64),
}

/// The closed set of components configured for a run.
pub struct Components {
    pool: GenePool,
    objectives: Vec<Box<dyn Objective>>,
    goals: Vec<Goal>,
    worst: Vec<f64>,
    descriptors: Vec<String>,
    similarity: SimilarityRule,
}

impl Components {
    /// Draw a genome with one random allele per gene.
    pub fn random_genome(&self, rng: &mut GenomeRng) -> Genome {
        Genome::new(self.pool.iter().map(|gene| gene.random(rng)).collect())
    }

    /// Render a genome as a gene name to value mapping.
    pub fn express(&self, genome: &Genome) -> Mapping {
        self.pool
            .iter()
            .zip(genome.alleles())
            .map(|(gene, allele)| (Value::String(gene.name().to_string()), gene.express(allele)))
            .collect()
    }

    /// Objective descriptors, `name (type)`, in fitness order.
    pub fn descriptors(&self) -> &[String] {
        &self.descriptors
    }

    pub fn genes(&self) -> &GenePool {
        &self.pool
    }

    pub fn similarity_rule(&self) -> SimilarityRule {
        self.similarity
    }
}

impl Evaluator for Components {
    fn evaluate(&self, genome: &Genome) -> Result<Vec<f64>, EvaluationError> {
        self.objectives
            .iter()
            .map(|objective| objective.score(genome))
            .collect()
    }

    fn goals(&self) -> &[Goal] {
        &self.goals
    }

    fn worst_fitness(&self) -> Vec<f64> {
        self.worst.clone()
    }
}

impl Variation for Components {
    fn crossover(&self, a: &mut Genome, b: &mut Genome, rng: &mut GenomeRng) {
        for ((gene, x), y) in self
            .pool
            .iter()
            .zip(a.alleles_mut().iter_mut())
            .zip(b.alleles_mut().iter_mut())
        {
            gene.crossover(x, y, rng);
        }
    }

    fn mutate(&self, genome: &mut Genome, indpb: f64, rng: &mut GenomeRng) {
        for (gene, allele) in self.pool.iter().zip(genome.alleles_mut().iter_mut()) {
            gene.mutate(allele, indpb, rng);
        }
    }
}

impl Similarity for Components {
    fn similar(&self, a: &Individual, b: &Individual) -> bool {
        let (a, b) = (a.genome(), b.genome());
        if a.len() != b.len() {
            return false;
        }

        match self.similarity {
            SimilarityRule::Exact => a == b,
            SimilarityRule::Tolerance(threshold) => self
                .pool
                .iter()
                .zip(a.alleles().iter().zip(b.alleles()))
                .all(|(gene, (x, y))| gene.distance(x, y) <= threshold),
        }
    }
}
