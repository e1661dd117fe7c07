//! Per-generation fitness summaries.

use log::info;

use super::individual::Individual;
use crate::schema::{GenerationRecord, StatisticsLog};

/// Aggregates mean, min and max per objective for each generation.
#[derive(Debug, Clone)]
pub struct StatisticsRecorder {
    precision: usize,
    objectives: usize,
    log: StatisticsLog,
}

impl StatisticsRecorder {
    pub fn new(precision: usize, objectives: usize) -> Self {
        Self {
            precision,
            objectives,
            log: StatisticsLog::default(),
        }
    }

    /// Summarise the evaluated members of `population` and append the record.
    ///
    /// Objectives without any evaluated value are reported as NaN.
    pub fn record(
        &mut self,
        generation: usize,
        nevals: usize,
        population: &[Individual],
    ) -> &GenerationRecord {
        let mut avg = vec![f64::NAN; self.objectives];
        let mut min = vec![f64::NAN; self.objectives];
        let mut max = vec![f64::NAN; self.objectives];

        for objective in 0..self.objectives {
            let values = population
                .iter()
                .filter_map(|i| i.fitness().and_then(|f| f.get(objective).copied()));

            let (sum, count, lo, hi) = values.fold(
                (0.0, 0usize, f64::INFINITY, f64::NEG_INFINITY),
                |(sum, count, lo, hi), v| (sum + v, count + 1, lo.min(v), hi.max(v)),
            );

            if count > 0 {
                avg[objective] = sum / count as f64;
                min[objective] = lo;
                max[objective] = hi;
            }
        }

        let record = GenerationRecord {
            generation,
            nevals,
            avg,
            min,
            max,
        };
        info!("{}", self.format(&record));

        self.log.push(record);
        &self.log.records()[self.log.len() - 1]
    }

    /// Render a record with the configured precision.
    pub fn format(&self, record: &GenerationRecord) -> String {
        format!(
            "gen {:>4}  nevals {:>4}  avg {}  min {}  max {}",
            record.generation,
            record.nevals,
            self.format_values(&record.avg),
            self.format_values(&record.min),
            self.format_values(&record.max),
        )
    }

    fn format_values(&self, values: &[f64]) -> String {
        let parts: Vec<String> = values
            .iter()
            .map(|v| format!("{:.*}", self.precision, v))
            .collect();
        format!("[{}]", parts.join(", "))
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn log(&self) -> &StatisticsLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::genome::Genome;

    fn population(fitnesses: &[[f64; 2]]) -> Vec<Individual> {
        fitnesses
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let mut ind = Individual::new(i as u64, Genome::default(), 0);
                ind.set_fitness(f.to_vec());
                ind
            })
            .collect()
    }

    #[test]
    fn test_record_summaries() {
        let mut recorder = StatisticsRecorder::new(3, 2);
        let pop = population(&[[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]]);
        let record = recorder.record(0, 3, &pop).clone();

        assert_eq!(record.generation, 0);
        assert_eq!(record.nevals, 3);
        assert_eq!(record.avg, vec![2.0, 20.0]);
        assert_eq!(record.min, vec![1.0, 10.0]);
        assert_eq!(record.max, vec![3.0, 30.0]);
        assert_eq!(recorder.log().len(), 1);
    }

    #[test]
    fn test_unevaluated_members_skipped() {
        let mut recorder = StatisticsRecorder::new(3, 2);
        let mut pop = population(&[[4.0, 4.0]]);
        pop.push(Individual::new(9, Genome::default(), 0));

        let record = recorder.record(1, 0, &pop);
        assert_eq!(record.avg, vec![4.0, 4.0]);
    }

    #[test]
    fn test_empty_population_is_nan() {
        let mut recorder = StatisticsRecorder::new(3, 1);
        let record = recorder.record(0, 0, &[]);
        assert!(record.avg[0].is_nan());
    }

    #[test]
    fn test_format_uses_precision() {
        let mut recorder = StatisticsRecorder::new(2, 2);
        let pop = population(&[[1.0, 0.125], [2.0, 0.4]]);
        let record = recorder.record(3, 2, &pop).clone();

        let line = recorder.format(&record);
        assert!(line.contains("avg [1.50, 0.26]"), "{line}");
        assert!(line.contains("max [2.00, 0.40]"), "{line}");
    }
}
