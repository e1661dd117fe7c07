//! Genome representation and random number generation for evolutionary search.

use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Value of a single gene component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Allele {
    /// Real-valued vector.
    Real(Vec<f64>),
    /// Integer vector.
    Integer(Vec<i64>),
    /// Index into a list of labels.
    Choice(usize),
}

impl Allele {
    /// Numeric view of the allele, if it has one.
    pub fn as_numeric(&self) -> Option<Vec<f64>> {
        match self {
            Allele::Real(values) => Some(values.clone()),
            Allele::Integer(values) => Some(values.iter().map(|&v| v as f64).collect()),
            Allele::Choice(_) => None,
        }
    }
}

/// Ordered collection of alleles, one per configured gene component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Genome {
    alleles: Vec<Allele>,
}

impl Genome {
    pub fn new(alleles: Vec<Allele>) -> Self {
        Self { alleles }
    }

    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    pub fn alleles_mut(&mut self) -> &mut [Allele] {
        &mut self.alleles
    }

    pub fn get(&self, index: usize) -> Option<&Allele> {
        self.alleles.get(index)
    }

    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }
}

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform value in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Returns true with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.unit() < probability
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Two distinct indices in `0..len`, or the same index twice when `len == 1`.
    pub fn pair(&mut self, len: usize) -> (usize, usize) {
        if len < 2 {
            return (0, 0);
        }
        let first = self.index(len);
        let mut second = self.index(len - 1);
        if second >= first {
            second += 1;
        }
        (first, second)
    }

    /// Uniform real value within bounds.
    pub fn uniform(&mut self, bounds: (f64, f64)) -> f64 {
        if bounds.0 >= bounds.1 {
            return bounds.0;
        }
        self.rng.gen_range(bounds.0..bounds.1)
    }

    /// Uniform integer within inclusive bounds.
    pub fn uniform_int(&mut self, bounds: (i64, i64)) -> i64 {
        if bounds.0 >= bounds.1 {
            return bounds.0;
        }
        self.rng.gen_range(bounds.0..=bounds.1)
    }

    /// Gaussian mutation clamped to bounds.
    pub fn gaussian_mutate(&mut self, value: f64, sigma: f64, bounds: (f64, f64)) -> f64 {
        let delta = match Normal::new(0.0, sigma) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        };
        (value + delta).clamp(bounds.0, bounds.1)
    }

    /// Get next random seed (for sub-generators).
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

/// Linear interpolation between two values.
pub fn blend(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}
