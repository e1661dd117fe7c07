//! Runs a complete essay: settings in, result manifest out.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::info;

use crate::compute::evolution::{ComponentRegistry, EvolutionEngine, EvolutionResult};
use crate::error::Result;
use crate::output::ResultWriter;
use crate::schema::{EvolutionProgress, Settings};

/// Files written by a finished essay, with the run result.
#[derive(Debug)]
pub struct EssayOutcome {
    pub manifest: PathBuf,
    pub log: PathBuf,
    pub result: EvolutionResult,
}

/// Validate, resolve components, evolve and write results.
///
/// The output directory is created before the search starts. When `cancel`
/// is raised the search stops at the next generation boundary and the last
/// completed generation is written. Any error returns before the manifest is
/// written.
pub fn run_essay<F>(
    settings: &Settings,
    registry: &ComponentRegistry,
    cancel: Arc<AtomicBool>,
    callback: F,
) -> Result<EssayOutcome>
where
    F: FnMut(&EvolutionProgress),
{
    settings.validate()?;
    let components = Arc::new(registry.resolve(settings)?);

    let writer = ResultWriter::from_settings(&settings.general);
    writer.prepare()?;

    let mut engine =
        EvolutionEngine::new(settings, Arc::clone(&components))?.with_cancel_handle(cancel);
    let result = engine.run_with_callback(callback)?;

    let manifest = writer.write(&result.archive, components.descriptors(), &components)?;
    let log = writer.write_log(&result.log)?;
    info!(
        "Essay '{}' finished ({:?})",
        settings.general.name, result.stats.stop_reason
    );

    Ok(EssayOutcome {
        manifest,
        log,
        result,
    })
}
