//! GAUDI CLI - Run an essay from YAML settings.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gaudi::{
    ComponentRegistry,
    essay::run_essay,
    schema::{EXAMPLE_SETTINGS, EvolutionPhase, Goal, Settings, Statistic},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Input file not provided");
        eprintln!();
        eprintln!("Usage: {} <settings.yaml>", args[0]);
        eprintln!();
        eprintln!("Run a GAUDI essay from YAML settings.");
        eprintln!("An example settings file is printed with the --example flag.");
        std::process::exit(2);
    }

    if args[1] == "--example" {
        print!("{EXAMPLE_SETTINGS}");
        return;
    }

    let settings_path = PathBuf::from(&args[1]);
    let settings = Settings::from_path(&settings_path).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("Interrupted, stopping after the current generation");
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("Cannot install interrupt handler: {e}");
    }

    println!("GAUDI");
    println!("=====");
    println!("Essay: {}", settings.general.name);
    println!(
        "Population: {}, generations: {}, mu: {}, lambda: {}",
        settings.ga.pop,
        settings.ga.gens,
        settings.ga.mu(),
        settings.ga.lambda()
    );
    println!("Objectives: {}", settings.objective_descriptors().join(", "));
    println!();

    let total = settings.ga.gens;
    let outcome = run_essay(
        &settings,
        &ComponentRegistry::default(),
        cancel,
        |progress| {
            if progress.phase == EvolutionPhase::Evolving
                && (progress.generation % (total / 10).max(1) == 0)
            {
                println!(
                    "  Generation {}/{}: {} evaluations, archive size {}",
                    progress.generation,
                    progress.total_generations,
                    progress.evaluations,
                    progress.archive_size
                );
            }
        },
    );

    match outcome {
        Ok(outcome) => {
            let stats = &outcome.result.stats;
            println!();
            println!(
                "Finished after {} generations ({:?})",
                stats.generations, stats.stop_reason
            );
            println!(
                "Evaluations: {} ({} failed), {:.1}/s",
                stats.total_evaluations, stats.failed_evaluations, stats.evaluations_per_second
            );
            println!("Pareto front: {} individuals", outcome.result.archive.len());

            let log = &outcome.result.log;
            for (i, name) in settings.objective_descriptors().iter().enumerate() {
                let best = match settings.objectives[i].goal {
                    Goal::Minimize => log.select(Statistic::Min, i),
                    Goal::Maximize => log.select(Statistic::Max, i),
                };
                if let (Some(first), Some(last)) = (best.first(), best.last()) {
                    println!("  {name}: {first} -> {last}");
                }
            }

            if let (Some(history), Some(leader)) =
                (&outcome.result.history, outcome.result.archive.iter().next())
            {
                println!(
                    "  Individual {} descends from {} ancestors",
                    leader.id,
                    history.lineage(leader.id).len()
                );
            }
            println!("Results: {}", outcome.manifest.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
