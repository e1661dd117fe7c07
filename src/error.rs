//! Crate-level error type.

use crate::compute::evolution::{EvaluationError, PluginLoadError};
use crate::output::OutputError;
use crate::schema::{ConfigError, SettingsError};

/// Any failure that stops a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load components: {0}")]
    Plugin(#[from] PluginLoadError),
    #[error("Evaluation aborted the run: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

pub type Result<T> = std::result::Result<T, Error>;
