//! The μ+λ generational loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::schema::{
    ConfigError, EvolutionPhase, EvolutionProgress, EvolutionStats, GaSettings, History,
    Settings, StatisticsLog, StopReason, VariationEvent, VariationKind,
};

use super::archive::ParetoArchive;
use super::genome::{Genome, GenomeRng};
use super::individual::{Individual, check_objective_count};
use super::nsga2::Nsga2Selection;
use super::objectives::EvaluationError;
use super::operators::{Evaluator, SelectionStrategy, Similarity, Variation};
use super::registry::Components;
use super::statistics::StatisticsRecorder;

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct EvolutionResult {
    /// Population at the last completed generation.
    pub population: Vec<Individual>,
    /// Pareto archive at the last completed generation.
    pub archive: ParetoArchive,
    /// One record per completed generation, starting with generation 0.
    pub log: StatisticsLog,
    /// Variation genealogy, when enabled.
    pub history: Option<History>,
    pub stats: EvolutionStats,
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    ga: GaSettings,
    components: Arc<Components>,
    evaluator: Arc<dyn Evaluator>,
    variation: Arc<dyn Variation>,
    similarity: Arc<dyn Similarity>,
    selection: Box<dyn SelectionStrategy>,
    recorder: StatisticsRecorder,
    rng: GenomeRng,
    workers: Option<rayon::ThreadPool>,
    population: Vec<Individual>,
    archive: ParetoArchive,
    history: Option<History>,
    generation: usize,
    evaluations: u64,
    failed_evaluations: u64,
    next_id: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

/// Evaluation outcome of one batch.
#[derive(Debug, Default, Clone, Copy)]
struct BatchCount {
    evaluated: usize,
    failed: usize,
}

impl EvolutionEngine {
    /// Create an engine from validated settings and resolved components.
    pub fn new(settings: &Settings, components: Arc<Components>) -> Result<Self, ConfigError> {
        settings.validate()?;
        let ga = settings.ga.clone();

        let seed = ga.seed.unwrap_or_else(rand::random);
        debug!("Random seed: {seed}");

        let workers = match ga.workers {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("gaudi-eval-{i}"))
                    .build()
                    .map_err(|e| ConfigError::WorkerPool(e.to_string()))?,
            ),
            None => None,
        };

        let goals = components.goals().to_vec();
        let archive = ParetoArchive::new(goals.clone()).with_capacity(ga.archive_capacity);
        let recorder = StatisticsRecorder::new(settings.general.precision, goals.len());
        let history = ga.history.then(History::default);

        Ok(Self {
            evaluator: components.clone(),
            variation: components.clone(),
            similarity: components.clone(),
            components,
            selection: Box::new(Nsga2Selection),
            recorder,
            rng: GenomeRng::new(seed),
            workers,
            population: Vec::new(),
            archive,
            history,
            generation: 0,
            evaluations: 0,
            failed_evaluations: 0,
            next_id: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
            ga,
        })
    }

    /// Replace the survivor selection strategy.
    pub fn with_selection(mut self, selection: Box<dyn SelectionStrategy>) -> Self {
        self.selection = selection;
        self
    }

    /// Replace the evaluator. Archive and statistics follow its objectives.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        let goals = evaluator.goals().to_vec();
        self.recorder = StatisticsRecorder::new(self.recorder.precision(), goals.len());
        self.archive = ParetoArchive::new(goals).with_capacity(self.ga.archive_capacity);
        self.evaluator = evaluator;
        self
    }

    /// Replace the archive similarity oracle.
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_handle(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Population as of the last completed generation.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Archive as of the last completed generation.
    pub fn archive(&self) -> &ParetoArchive {
        &self.archive
    }

    pub fn log(&self) -> &StatisticsLog {
        self.recorder.log()
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Last completed generation.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Build and evaluate the initial population (generation 0).
    fn initialize(&mut self) -> Result<(), EvaluationError> {
        let mut population = Vec::with_capacity(self.ga.pop);
        for _ in 0..self.ga.pop {
            let genome = self.components.random_genome(&mut self.rng);
            population.push(Individual::new(self.next_id(), genome, 0));
        }

        let count = self.evaluate(&mut population)?;

        self.archive.update(&population, self.similarity.as_ref());
        self.population = population;
        self.generation = 0;
        self.commit_counts(count);
        self.recorder.record(0, count.evaluated, &self.population);
        Ok(())
    }

    /// Run one generation. State is committed only when the whole step succeeds.
    fn step(&mut self) -> Result<(), EvaluationError> {
        let generation = self.generation + 1;
        let (mut offspring, events) = self.vary(generation);
        let count = self.evaluate(&mut offspring)?;

        let mut pool = self.population.clone();
        pool.extend(offspring);

        self.archive.update(&pool, self.similarity.as_ref());
        self.population = self
            .selection
            .select(pool, self.ga.mu(), self.evaluator.goals());
        if let Some(history) = self.history.as_mut() {
            events.into_iter().for_each(|event| history.record(event));
        }
        self.generation = generation;
        self.commit_counts(count);
        self.recorder.record(generation, count.evaluated, &self.population);
        Ok(())
    }

    fn commit_counts(&mut self, count: BatchCount) {
        self.evaluations += count.evaluated as u64;
        self.failed_evaluations += count.failed as u64;
    }

    /// Produce λ offspring. Each one comes from crossover, mutation or
    /// reproduction, exclusively.
    fn vary(&mut self, generation: usize) -> (Vec<Individual>, Vec<VariationEvent>) {
        let lambda = self.ga.lambda();
        let mut offspring = Vec::with_capacity(lambda);
        let mut events = Vec::with_capacity(lambda);

        for _ in 0..lambda {
            let p = self.rng.unit();
            let (mut child, kind, parents) = if p < self.ga.cx_pb {
                let (i, j) = self.rng.pair(self.population.len());
                let mut first = self.population[i].clone();
                let mut second = self.population[j].clone();
                first.mate(&mut second, self.variation.as_ref(), &mut self.rng);
                let parents = vec![self.population[i].id, self.population[j].id];
                (first, VariationKind::Mate, parents)
            } else if p < self.ga.cx_pb + self.ga.mut_pb {
                let i = self.rng.index(self.population.len());
                let mut child = self.population[i].clone();
                child.mutate(self.ga.mut_indpb, self.variation.as_ref(), &mut self.rng);
                (child, VariationKind::Mutate, vec![self.population[i].id])
            } else {
                // reproduction keeps the parent's fitness
                let i = self.rng.index(self.population.len());
                let child = self.population[i].clone();
                (child, VariationKind::Clone, vec![self.population[i].id])
            };

            child.id = self.next_id();
            child.generation = generation;
            child.parents = parents.clone();

            events.push(VariationEvent {
                generation,
                kind,
                parents,
                offspring: child.id,
            });
            offspring.push(child);
        }

        debug!(
            "Generation {generation}: {} mated, {} mutated, {} cloned",
            events.iter().filter(|e| e.kind == VariationKind::Mate).count(),
            events.iter().filter(|e| e.kind == VariationKind::Mutate).count(),
            events.iter().filter(|e| e.kind == VariationKind::Clone).count(),
        );

        (offspring, events)
    }

    /// Evaluate every individual lacking fitness, in parallel.
    ///
    /// Failures get the worst fitness unless the run is configured to abort.
    fn evaluate(&self, individuals: &mut [Individual]) -> Result<BatchCount, EvaluationError> {
        let evaluator = &self.evaluator;
        let timeout = self.ga.eval_timeout_ms.map(Duration::from_millis);

        let batch = |individuals: &mut [Individual]| -> Vec<Option<EvaluationError>> {
            individuals
                .par_iter_mut()
                .map(|individual| {
                    if individual.is_evaluated() {
                        return None;
                    }
                    match score(evaluator, individual.genome(), timeout) {
                        Ok(fitness) => {
                            individual.set_fitness(fitness);
                            None
                        }
                        Err(e) => Some(e),
                    }
                })
                .collect()
        };

        let pending = individuals.iter().filter(|i| !i.is_evaluated()).count();
        let failures = match &self.workers {
            Some(pool) => pool.install(|| batch(&mut *individuals)),
            None => batch(individuals),
        };

        let mut count = BatchCount {
            evaluated: pending,
            failed: 0,
        };
        for (individual, failure) in individuals.iter_mut().zip(failures) {
            let Some(error) = failure else {
                continue;
            };
            if self.ga.abort_on_evaluation_error {
                return Err(error);
            }
            warn!("Individual {} assigned worst fitness: {error}", individual.id);
            individual.set_fitness(self.evaluator.worst_fitness());
            count.failed += 1;
        }

        Ok(count)
    }

    /// Get current progress.
    pub fn progress(&self, phase: EvolutionPhase) -> EvolutionProgress {
        EvolutionProgress {
            generation: self.generation,
            total_generations: self.ga.gens,
            evaluations: self.evaluations,
            failed_evaluations: self.failed_evaluations,
            population_size: self.population.len(),
            archive_size: self.archive.len(),
            record: self.recorder.log().last().cloned(),
            phase,
        }
    }

    /// Run evolution with progress callback.
    ///
    /// A second call resumes from the last completed generation.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, EvaluationError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();
        let evaluations_before = self.evaluations;

        if self.population.is_empty() {
            info!(
                "Starting evolution: pop {}, gens {}, mu {}, lambda {}",
                self.ga.pop,
                self.ga.gens,
                self.ga.mu(),
                self.ga.lambda()
            );
            self.initialize()?;
            callback(&self.progress(EvolutionPhase::Initializing));
        }

        let stop_reason = loop {
            if self.generation >= self.ga.gens {
                break StopReason::MaxGenerations;
            }
            if self.cancelled.load(Ordering::Relaxed) {
                info!("Evolution cancelled after generation {}", self.generation);
                break StopReason::Cancelled;
            }

            self.step()?;
            callback(&self.progress(EvolutionPhase::Evolving));
        };

        let phase = match stop_reason {
            StopReason::MaxGenerations => EvolutionPhase::Complete,
            StopReason::Cancelled => EvolutionPhase::Stopped,
        };
        callback(&self.progress(phase));

        let elapsed = start_time.elapsed().as_secs_f64();
        let run_evaluations = self.evaluations - evaluations_before;
        info!(
            "Evolution finished: {} generations, {} evaluations ({} failed), archive size {}",
            self.generation,
            self.evaluations,
            self.failed_evaluations,
            self.archive.len()
        );

        Ok(EvolutionResult {
            population: self.population.clone(),
            archive: self.archive.clone(),
            log: self.recorder.log().clone(),
            history: self.history.clone(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.evaluations,
                failed_evaluations: self.failed_evaluations,
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    run_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvaluationError> {
        self.run_with_callback(|_| {})
    }
}

/// Score a genome, optionally bounded by a timeout.
fn score(
    evaluator: &Arc<dyn Evaluator>,
    genome: &Genome,
    timeout: Option<Duration>,
) -> Result<Vec<f64>, EvaluationError> {
    let fitness = match timeout {
        None => evaluator.evaluate(genome)?,
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            let evaluator = Arc::clone(evaluator);
            let genome = genome.clone();
            // a timed out evaluation keeps running detached; its result is dropped
            thread::spawn(move || {
                let _ = tx.send(evaluator.evaluate(&genome));
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result?,
                Err(RecvTimeoutError::Timeout) => return Err(EvaluationError::Timeout(limit)),
                Err(RecvTimeoutError::Disconnected) => return Err(EvaluationError::WorkerLost),
            }
        }
    };

    check_objective_count(&fitness, evaluator.objective_count())?;
    Ok(fitness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::registry::ComponentRegistry;
    use crate::schema::Goal;
    use std::sync::atomic::AtomicUsize;

    const ESSAY: &str = r#"
general:
  precision: 3
ga:
  pop: 10
  gens: 1
  mu: 0.5
  lambda_: 1.0
  cx_pb: 0.5
  mut_pb: 0.3
  mut_indpb: 0.5
  seed: 7
genes:
  - name: position
    type: real
    size: 2
    bounds: [-5.0, 5.0]
objectives:
  - name: origin
    type: distance
    gene: position
    target: [0.0, 0.0]
  - name: corner
    type: distance
    gene: position
    target: [2.0, 2.0]
"#;

    fn settings() -> Settings {
        Settings::from_yaml(ESSAY).unwrap()
    }

    fn engine(settings: &Settings) -> EvolutionEngine {
        let components = ComponentRegistry::default().resolve(settings).unwrap();
        EvolutionEngine::new(settings, Arc::new(components)).unwrap()
    }

    /// Fails every other call.
    struct Flaky {
        calls: AtomicUsize,
        goals: Vec<Goal>,
    }

    impl Flaky {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                goals: vec![Goal::Minimize, Goal::Minimize],
            }
        }
    }

    impl Evaluator for Flaky {
        fn evaluate(&self, genome: &Genome) -> Result<Vec<f64>, EvaluationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return Err(EvaluationError::degenerate("flaky", "odd call"));
            }
            let values = genome.get(0).and_then(|a| a.as_numeric()).unwrap_or_default();
            Ok(vec![values[0].abs(), values[1].abs()])
        }

        fn goals(&self) -> &[Goal] {
            &self.goals
        }

        fn worst_fitness(&self) -> Vec<f64> {
            vec![f64::INFINITY; 2]
        }
    }

    struct Slow;

    impl Evaluator for Slow {
        fn evaluate(&self, _genome: &Genome) -> Result<Vec<f64>, EvaluationError> {
            thread::sleep(Duration::from_millis(300));
            Ok(vec![0.0, 0.0])
        }

        fn goals(&self) -> &[Goal] {
            &[Goal::Minimize, Goal::Minimize]
        }

        fn worst_fitness(&self) -> Vec<f64> {
            vec![1e9, 1e9]
        }
    }

    /// Scores the first `initial` genomes poorly and everything after perfectly.
    struct Improving {
        calls: AtomicUsize,
        initial: usize,
    }

    impl Evaluator for Improving {
        fn evaluate(&self, _genome: &Genome) -> Result<Vec<f64>, EvaluationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.initial {
                Ok(vec![10.0, 10.0])
            } else {
                Ok(vec![0.0, 0.0])
            }
        }

        fn goals(&self) -> &[Goal] {
            &[Goal::Minimize, Goal::Minimize]
        }

        fn worst_fitness(&self) -> Vec<f64> {
            vec![f64::INFINITY; 2]
        }
    }

    /// Keeps the current parents and discards every offspring.
    struct ParentsOnly;

    impl SelectionStrategy for ParentsOnly {
        fn select(&self, pool: Vec<Individual>, n: usize, _goals: &[Goal]) -> Vec<Individual> {
            pool.into_iter().filter(|i| i.generation == 0).take(n).collect()
        }
    }

    #[test]
    fn test_single_generation_scenario() {
        let mut engine = engine(&settings());
        let result = engine.run().unwrap();

        assert_eq!(result.population.len(), 5);
        assert_eq!(result.log.len(), 2);
        assert_eq!(result.log.records()[0].generation, 0);
        assert_eq!(result.log.records()[0].nevals, 10);
        assert_eq!(result.log.records()[1].generation, 1);
        assert_eq!(result.stats.generations, 1);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert!(!result.archive.is_empty());
    }

    #[test]
    fn test_population_is_mu_every_generation() {
        let mut settings = settings();
        settings.ga.gens = 6;
        let mut engine = engine(&settings);

        let mut sizes = Vec::new();
        engine
            .run_with_callback(|progress| {
                if progress.phase == EvolutionPhase::Evolving {
                    sizes.push(progress.population_size);
                }
            })
            .unwrap();

        assert_eq!(sizes, vec![5; 6]);
    }

    #[test]
    fn test_every_individual_is_evaluated() {
        let mut settings = settings();
        settings.ga.gens = 3;
        let result = engine(&settings).run().unwrap();

        for individual in result.population.iter().chain(result.archive.iter()) {
            assert_eq!(individual.fitness().map(<[f64]>::len), Some(2));
        }
    }

    #[test]
    fn test_evaluation_error_gets_worst_fitness() {
        let result = engine(&settings())
            .with_evaluator(Arc::new(Flaky::new()))
            .run()
            .unwrap();

        assert_eq!(result.population.len(), 5);
        assert_eq!(result.log.len(), 2);
        assert!(result.stats.failed_evaluations > 0);
        assert_eq!(result.log.records()[0].max, vec![f64::INFINITY; 2]);
    }

    #[test]
    fn test_abort_on_evaluation_error() {
        let mut settings = settings();
        settings.ga.abort_on_evaluation_error = true;
        let mut engine = engine(&settings).with_evaluator(Arc::new(Flaky::new()));

        assert!(engine.run().is_err());
        assert!(engine.population().is_empty());
        assert!(engine.log().is_empty());
    }

    #[test]
    fn test_timeout_becomes_worst_fitness() {
        let mut settings = settings();
        settings.ga.pop = 4;
        settings.ga.eval_timeout_ms = Some(20);
        let result = engine(&settings)
            .with_evaluator(Arc::new(Slow))
            .run()
            .unwrap();

        assert_eq!(result.population.len(), 2);
        assert!(result.stats.failed_evaluations > 0);
        assert!(
            result
                .population
                .iter()
                .all(|i| i.fitness() == Some(&[1e9, 1e9][..]))
        );
    }

    #[test]
    fn test_archive_sees_offspring_dropped_by_selection() {
        let mut settings = settings();
        settings.ga.cx_pb = 0.5;
        settings.ga.mut_pb = 0.5;
        let result = engine(&settings)
            .with_evaluator(Arc::new(Improving {
                calls: AtomicUsize::new(0),
                initial: 10,
            }))
            .with_selection(Box::new(ParentsOnly))
            .run()
            .unwrap();

        assert!(result.population.iter().all(|i| i.generation == 0));
        assert!(!result.archive.is_empty());
        for member in result.archive.iter() {
            assert_eq!(member.generation, 1);
            assert_eq!(member.fitness(), Some(&[0.0, 0.0][..]));
        }
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let mut settings = settings();
        settings.ga.gens = 4;
        settings.ga.workers = Some(3);

        let a = engine(&settings).run().unwrap();
        let b = engine(&settings).run().unwrap();

        assert_eq!(a.population, b.population);
        assert_eq!(a.archive.members(), b.archive.members());
        assert_eq!(a.log, b.log);
    }

    #[test]
    fn test_cancellation_keeps_last_generation() {
        let mut settings = settings();
        settings.ga.gens = 50;
        let mut engine = engine(&settings);
        let cancel = engine.cancel_handle();

        // Cancel right after the initial population
        let result = engine
            .run_with_callback(|progress| {
                if progress.phase == EvolutionPhase::Initializing {
                    cancel.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
        assert_eq!(result.population.len(), 10);
        assert_eq!(result.log.len(), 1);

        // Resuming continues from the committed generation
        engine.cancel_handle().store(false, Ordering::Relaxed);
        let resumed = engine.run().unwrap();
        assert_eq!(resumed.stats.generations, 50);
        assert_eq!(resumed.log.len(), 51);
    }

    #[test]
    fn test_history_records_every_offspring() {
        let mut settings = settings();
        settings.ga.gens = 3;
        settings.ga.history = true;
        let result = engine(&settings).run().unwrap();

        let history = result.history.unwrap();
        assert_eq!(history.events().len(), 30);
        for individual in result.population.iter().filter(|i| i.generation > 0) {
            assert_eq!(history.parents_of(individual.id), individual.parents.as_slice());
            assert!(!individual.parents.is_empty());
        }
    }

    #[test]
    fn test_mu_zero_is_config_error() {
        let mut settings = settings();
        settings.ga.pop = 1;
        settings.ga.mu = 0.1;
        let components = ComponentRegistry::default().resolve(&settings).unwrap();
        let result = EvolutionEngine::new(&settings, Arc::new(components));
        assert!(matches!(result, Err(ConfigError::MuTooSmall { .. })));
    }

    #[test]
    fn test_zero_generations() {
        let mut settings = settings();
        settings.ga.gens = 0;
        let result = engine(&settings).run().unwrap();
        assert_eq!(result.population.len(), 10);
        assert_eq!(result.log.len(), 1);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
    }
}
