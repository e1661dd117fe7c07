//! Settings types for GAUDI essays.
//!
//! A settings file is a YAML document with four sections: `general` (run
//! name, output location, display precision), `ga` (population and variation
//! parameters), and the ordered `genes` and `objectives` component lists.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Annotated example settings file.
pub const EXAMPLE_SETTINGS: &str = r#"# GAUDI essay settings
general:
  name: essay
  outputpath: ./results
  precision: 3
ga:
  pop: 40
  gens: 20
  mu: 0.75
  lambda_: 0.75
  cx_pb: 0.5
  mut_pb: 0.3
  mut_indpb: 0.5
  similarity: true
  similarity_threshold: 0.01
  history: false
  seed: 42
genes:
  - name: position
    type: real
    size: 3
    bounds: [-5.0, 5.0]
    sigma: 0.5
  - name: element
    type: choice
    options: [C, N, O]
objectives:
  - name: origin
    type: distance
    goal: minimize
    gene: position
    target: [0.0, 0.0, 0.0]
  - name: corner
    type: distance
    goal: minimize
    gene: position
    target: [2.0, 2.0, 2.0]
  - name: price
    type: cost
    goal: maximize
    gene: element
    costs: {C: 1.0, N: 2.0, O: 3.0}
"#;

/// Top-level essay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Run name and output options.
    #[serde(default)]
    pub general: GeneralSettings,
    /// Genetic algorithm parameters.
    #[serde(default)]
    pub ga: GaSettings,
    /// Gene components, in genome order.
    pub genes: Vec<GeneSpec>,
    /// Objective components, in fitness-vector order.
    pub objectives: Vec<ObjectiveSpec>,
}

/// Run name, output path and numeric display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralSettings {
    /// Run name used to derive output filenames.
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory receiving genome artifacts and the result manifest.
    #[serde(default = "default_outputpath")]
    pub outputpath: PathBuf,
    /// Decimal places used when displaying or writing fitness values.
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            outputpath: default_outputpath(),
            precision: default_precision(),
        }
    }
}

fn default_name() -> String {
    "gaudi".to_string()
}
fn default_outputpath() -> PathBuf {
    PathBuf::from(".")
}
fn default_precision() -> usize {
    3
}

/// Genetic algorithm parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaSettings {
    /// Initial population size.
    #[serde(default = "default_pop")]
    pub pop: usize,
    /// Number of generations to run after the initial one.
    #[serde(default = "default_gens")]
    pub gens: usize,
    /// Fraction of `pop` kept as parents (mu).
    #[serde(default = "default_mu")]
    pub mu: f64,
    /// Fraction of `pop` produced as offspring (lambda).
    #[serde(default = "default_lambda", rename = "lambda_")]
    pub lambda: f64,
    /// Probability that an offspring is produced by crossover.
    #[serde(default = "default_cx_pb")]
    pub cx_pb: f64,
    /// Probability that an offspring is produced by mutation.
    #[serde(default = "default_mut_pb")]
    pub mut_pb: f64,
    /// Per-gene mutation probability.
    #[serde(default = "default_mut_indpb")]
    pub mut_indpb: f64,
    /// Use tolerance-based similarity in the archive instead of exact genome equality.
    #[serde(default = "default_similarity")]
    pub similarity: bool,
    /// Maximum normalised gene distance under which two genomes are similar.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Record the genealogy of variation operators.
    #[serde(default)]
    pub history: bool,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Evaluation worker threads. Uses the rayon default when absent.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Per-individual evaluation timeout in milliseconds.
    #[serde(default)]
    pub eval_timeout_ms: Option<u64>,
    /// Abort the run on the first evaluation failure instead of assigning worst fitness.
    #[serde(default)]
    pub abort_on_evaluation_error: bool,
    /// Optional upper bound on the Pareto archive size.
    #[serde(default)]
    pub archive_capacity: Option<usize>,
}

impl Default for GaSettings {
    fn default() -> Self {
        Self {
            pop: default_pop(),
            gens: default_gens(),
            mu: default_mu(),
            lambda: default_lambda(),
            cx_pb: default_cx_pb(),
            mut_pb: default_mut_pb(),
            mut_indpb: default_mut_indpb(),
            similarity: default_similarity(),
            similarity_threshold: default_similarity_threshold(),
            history: false,
            seed: None,
            workers: None,
            eval_timeout_ms: None,
            abort_on_evaluation_error: false,
            archive_capacity: None,
        }
    }
}

fn default_pop() -> usize {
    200
}
fn default_gens() -> usize {
    100
}
fn default_mu() -> f64 {
    0.75
}
fn default_lambda() -> f64 {
    0.75
}
fn default_cx_pb() -> f64 {
    0.5
}
fn default_mut_pb() -> f64 {
    0.1
}
fn default_mut_indpb() -> f64 {
    0.05
}
fn default_similarity() -> bool {
    true
}
fn default_similarity_threshold() -> f64 {
    1e-3
}

impl GaSettings {
    /// Number of parents kept each generation: `floor(mu * pop)`.
    pub fn mu(&self) -> usize {
        (self.mu * self.pop as f64).floor().max(0.0) as usize
    }

    /// Number of offspring produced each generation: `floor(lambda_ * pop)`.
    pub fn lambda(&self) -> usize {
        (self.lambda * self.pop as f64).floor().max(0.0) as usize
    }

    /// Validate population and variation parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pop == 0 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.mu() < 1 {
            return Err(ConfigError::MuTooSmall {
                fraction: self.mu,
                pop: self.pop,
            });
        }
        if self.lambda() < 1 {
            return Err(ConfigError::LambdaTooSmall {
                fraction: self.lambda,
                pop: self.pop,
            });
        }
        if self.mu() > self.pop + self.lambda() {
            return Err(ConfigError::MuExceedsPool {
                mu: self.mu(),
                pool: self.pop + self.lambda(),
            });
        }

        let check_probability = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidProbability { name, value })
            }
        };
        check_probability(self.cx_pb, "cx_pb")?;
        check_probability(self.mut_pb, "mut_pb")?;
        check_probability(self.mut_indpb, "mut_indpb")?;

        if self.cx_pb + self.mut_pb > 1.0 {
            return Err(ConfigError::ProbabilitySum {
                cx_pb: self.cx_pb,
                mut_pb: self.mut_pb,
            });
        }
        if self.similarity_threshold.is_nan() || self.similarity_threshold < 0.0 {
            return Err(ConfigError::InvalidSimilarityThreshold(
                self.similarity_threshold,
            ));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::NoWorkers);
        }
        if self.archive_capacity == Some(0) {
            return Err(ConfigError::EmptyArchiveCapacity);
        }
        Ok(())
    }
}

/// A gene component specification: name, type and component-specific parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneSpec {
    /// Unique gene name, referenced by objectives.
    pub name: String,
    /// Component type resolved by the registry.
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining component parameters.
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_yaml::Value>,
}

/// An objective component specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    /// Objective name.
    pub name: String,
    /// Component type resolved by the registry.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optimisation direction.
    #[serde(default)]
    pub goal: Goal,
    /// Value assigned when the objective cannot score a genome.
    #[serde(default)]
    pub worst: Option<f64>,
    /// Remaining component parameters.
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_yaml::Value>,
}

impl ObjectiveSpec {
    /// Worst possible value for this objective.
    pub fn worst_value(&self) -> f64 {
        self.worst.unwrap_or(match self.goal {
            Goal::Minimize => f64::INFINITY,
            Goal::Maximize => f64::NEG_INFINITY,
        })
    }

    /// Human-readable descriptor, `name (type)`.
    pub fn descriptor(&self) -> String {
        format!("{} ({})", self.name, self.kind)
    }
}

/// Optimisation direction of an objective.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    #[default]
    Minimize,
    Maximize,
}

impl Goal {
    /// Maps a raw value so that smaller is always better.
    #[inline]
    pub fn orient(self, value: f64) -> f64 {
        match self {
            Goal::Minimize => value,
            Goal::Maximize => -value,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&content).map_err(|source| SettingsError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The parsed [`EXAMPLE_SETTINGS`].
    pub fn example() -> Result<Self, serde_yaml::Error> {
        Self::from_yaml(EXAMPLE_SETTINGS)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Validate the whole settings document.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ga.validate()?;

        if self.genes.is_empty() {
            return Err(ConfigError::NoGenes);
        }
        if self.objectives.is_empty() {
            return Err(ConfigError::NoObjectives);
        }

        for (i, gene) in self.genes.iter().enumerate() {
            if self.genes[..i].iter().any(|other| other.name == gene.name) {
                return Err(ConfigError::DuplicateGene(gene.name.clone()));
            }
        }

        Ok(())
    }

    /// Objective descriptors in fitness-vector order.
    pub fn objective_descriptors(&self) -> Vec<String> {
        self.objectives.iter().map(ObjectiveSpec::descriptor).collect()
    }
}

/// Settings source errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Specified input file was not found: {path}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed input file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    PopulationTooSmall,
    #[error("mu fraction {fraction} of population {pop} yields no parents")]
    MuTooSmall { fraction: f64, pop: usize },
    #[error("lambda fraction {fraction} of population {pop} yields no offspring")]
    LambdaTooSmall { fraction: f64, pop: usize },
    #[error("mu ({mu}) exceeds the first selection pool of {pool} individuals")]
    MuExceedsPool { mu: usize, pool: usize },
    #[error("Probability {name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("cx_pb ({cx_pb}) + mut_pb ({mut_pb}) must not exceed 1")]
    ProbabilitySum { cx_pb: f64, mut_pb: f64 },
    #[error("Similarity threshold must be non-negative, got {0}")]
    InvalidSimilarityThreshold(f64),
    #[error("Worker count must be non-zero")]
    NoWorkers,
    #[error("Archive capacity must be non-zero")]
    EmptyArchiveCapacity,
    #[error("Failed to start evaluation workers: {0}")]
    WorkerPool(String),
    #[error("No genes specified")]
    NoGenes,
    #[error("No objectives specified")]
    NoObjectives,
    #[error("Gene name '{0}' is used more than once")]
    DuplicateGene(String),
}
