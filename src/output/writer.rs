//! Result writer.
//!
//! For each archived individual a genome artifact `<name>_<index>.yaml` is
//! written to the output directory. The manifest `<name>.result.yaml` maps
//! every artifact filename to its fitness vector and is written last, through
//! a temporary file renamed into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde_yaml::{Mapping, Value};

use crate::compute::evolution::{Components, Individual, ParetoArchive};
use crate::schema::{GeneralSettings, StatisticsLog};

/// Output errors.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes run results under `outputpath`, named after the run.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    outputpath: PathBuf,
    name: String,
    precision: usize,
}

impl ResultWriter {
    pub fn new<P: AsRef<Path>>(outputpath: P, name: &str, precision: usize) -> Self {
        Self {
            outputpath: outputpath.as_ref().to_path_buf(),
            name: name.to_string(),
            precision,
        }
    }

    pub fn from_settings(general: &GeneralSettings) -> Self {
        Self::new(&general.outputpath, &general.name, general.precision)
    }

    /// Create the output directory.
    pub fn prepare(&self) -> Result<(), OutputError> {
        fs::create_dir_all(&self.outputpath).map_err(|source| OutputError::CreateDir {
            path: self.outputpath.clone(),
            source,
        })
    }

    /// Path of the result manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.outputpath.join(format!("{}.result.yaml", self.name))
    }

    /// Path of the statistics log.
    pub fn log_path(&self) -> PathBuf {
        self.outputpath.join(format!("{}.log.json", self.name))
    }

    /// Artifact filename of the `index`-th archived individual.
    pub fn artifact_name(&self, index: usize) -> String {
        format!("{}_{:03}.yaml", self.name, index)
    }

    /// Write every archive member and then the manifest. Returns the manifest path.
    pub fn write(
        &self,
        archive: &ParetoArchive,
        descriptors: &[String],
        components: &Components,
    ) -> Result<PathBuf, OutputError> {
        let mut results = Mapping::new();

        for (index, individual) in archive.iter().enumerate() {
            let filename = self.artifact_name(index);
            let artifact = self.artifact(individual, components);
            write_file(&self.outputpath.join(&filename), &serde_yaml::to_string(&artifact)?)?;
            results.insert(Value::from(filename), self.fitness_value(individual));
        }

        let mut manifest = Mapping::new();
        manifest.insert(
            Value::from("GAUDI.objectives"),
            Value::Sequence(descriptors.iter().map(|d| Value::from(d.as_str())).collect()),
        );
        manifest.insert(Value::from("GAUDI.results"), Value::Mapping(results));

        let content = format!(
            "# Generated by GAUDI on {}\n{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            serde_yaml::to_string(&manifest)?
        );

        let path = self.manifest_path();
        let staging = path.with_extension("yaml.tmp");
        write_file(&staging, &content)?;
        fs::rename(&staging, &path).map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;

        info!(
            "Wrote {} archived individuals and manifest {}",
            archive.len(),
            path.display()
        );
        Ok(path)
    }

    /// Write the statistics log as JSON. Returns its path.
    pub fn write_log(&self, log: &StatisticsLog) -> Result<PathBuf, OutputError> {
        let path = self.log_path();
        write_file(&path, &serde_json::to_string_pretty(log)?)?;
        Ok(path)
    }

    fn artifact(&self, individual: &Individual, components: &Components) -> Mapping {
        let mut artifact = Mapping::new();
        artifact.insert(Value::from("id"), Value::from(individual.id));
        artifact.insert(
            Value::from("generation"),
            Value::from(individual.generation as u64),
        );
        artifact.insert(
            Value::from("genes"),
            Value::Mapping(components.express(individual.genome())),
        );
        artifact.insert(Value::from("fitness"), self.fitness_value(individual));
        artifact
    }

    fn fitness_value(&self, individual: &Individual) -> Value {
        Value::Sequence(
            individual
                .fitness()
                .unwrap_or_default()
                .iter()
                .map(|&v| Value::from(round(v, self.precision)))
                .collect(),
        )
    }
}

/// Round to `precision` decimals. Non-finite values pass through.
fn round(value: f64, precision: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(precision.min(15) as i32);
    (value * scale).round() / scale
}

fn write_file(path: &Path, content: &str) -> Result<(), OutputError> {
    fs::write(path, content).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}
