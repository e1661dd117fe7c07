//! Built-in gene components.
//!
//! Each gene owns one [`Allele`] of the genome and knows how to create,
//! mutate, recombine, compare and render it.

use serde::Deserialize;
use serde_yaml::Value;

use super::genome::{Allele, GenomeRng, blend};
use super::registry::{PluginLoadError, parse_params};
use crate::schema::GeneSpec;

/// Capability interface of a gene component.
pub trait Gene: Send + Sync {
    /// Gene name as configured.
    fn name(&self) -> &str;

    /// Draw a random allele.
    fn random(&self, rng: &mut GenomeRng) -> Allele;

    /// Mutate in place, each position with probability `indpb`.
    fn mutate(&self, allele: &mut Allele, indpb: f64, rng: &mut GenomeRng);

    /// Recombine two alleles in place.
    fn crossover(&self, a: &mut Allele, b: &mut Allele, rng: &mut GenomeRng);

    /// Normalised distance in `[0, 1]`.
    fn distance(&self, a: &Allele, b: &Allele) -> f64;

    /// Render an allele for genome artifacts.
    fn express(&self, allele: &Allele) -> Value;

    /// Labels of a categorical gene.
    fn labels(&self) -> Option<&[String]> {
        None
    }
}

/// Bounded real-valued vector.
pub struct RealGene {
    name: String,
    size: usize,
    bounds: (f64, f64),
    sigma: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RealParams {
    #[serde(default = "default_size")]
    size: usize,
    bounds: (f64, f64),
    #[serde(default)]
    sigma: Option<f64>,
}

fn default_size() -> usize {
    1
}

impl RealGene {
    pub fn from_spec(spec: &GeneSpec) -> Result<Box<dyn Gene>, PluginLoadError> {
        let params: RealParams = parse_params(&spec.name, &spec.params)?;
        let span = params.bounds.1 - params.bounds.0;
        if !span.is_finite() {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: format!(
                    "bounds [{}, {}] must be finite with a finite span",
                    params.bounds.0, params.bounds.1
                ),
            });
        }
        if !(params.bounds.0 < params.bounds.1) {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: format!(
                    "bounds min ({}) must be below max ({})",
                    params.bounds.0, params.bounds.1
                ),
            });
        }
        if params.size == 0 {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: "size must be non-zero".to_string(),
            });
        }
        let sigma = params.sigma.unwrap_or(0.1 * span);
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: format!("sigma must be finite and non-negative, got {sigma}"),
            });
        }

        Ok(Box::new(Self {
            name: spec.name.clone(),
            size: params.size,
            bounds: params.bounds,
            sigma,
        }))
    }
}

impl Gene for RealGene {
    fn name(&self) -> &str {
        &self.name
    }

    fn random(&self, rng: &mut GenomeRng) -> Allele {
        Allele::Real((0..self.size).map(|_| rng.uniform(self.bounds)).collect())
    }

    fn mutate(&self, allele: &mut Allele, indpb: f64, rng: &mut GenomeRng) {
        if let Allele::Real(values) = allele {
            for value in values.iter_mut() {
                if rng.chance(indpb) {
                    *value = rng.gaussian_mutate(*value, self.sigma, self.bounds);
                }
            }
        }
    }

    fn crossover(&self, a: &mut Allele, b: &mut Allele, rng: &mut GenomeRng) {
        if let (Allele::Real(xs), Allele::Real(ys)) = (a, b) {
            for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
                let t = rng.unit();
                let (x0, y0) = (*x, *y);
                *x = blend(x0, y0, t).clamp(self.bounds.0, self.bounds.1);
                *y = blend(y0, x0, t).clamp(self.bounds.0, self.bounds.1);
            }
        }
    }

    fn distance(&self, a: &Allele, b: &Allele) -> f64 {
        match (a, b) {
            (Allele::Real(xs), Allele::Real(ys)) => {
                let range = self.bounds.1 - self.bounds.0;
                mean_abs_diff(xs.iter().copied(), ys.iter().copied(), range)
            }
            _ => 1.0,
        }
    }

    fn express(&self, allele: &Allele) -> Value {
        express_numeric(allele)
    }
}

/// Bounded integer vector.
pub struct IntegerGene {
    name: String,
    size: usize,
    bounds: (i64, i64),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IntegerParams {
    #[serde(default = "default_size")]
    size: usize,
    bounds: (i64, i64),
}

impl IntegerGene {
    pub fn from_spec(spec: &GeneSpec) -> Result<Box<dyn Gene>, PluginLoadError> {
        let params: IntegerParams = parse_params(&spec.name, &spec.params)?;
        if params.bounds.0 > params.bounds.1 {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: format!(
                    "bounds min ({}) must not exceed max ({})",
                    params.bounds.0, params.bounds.1
                ),
            });
        }
        if params.size == 0 {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: "size must be non-zero".to_string(),
            });
        }

        Ok(Box::new(Self {
            name: spec.name.clone(),
            size: params.size,
            bounds: params.bounds,
        }))
    }
}

impl Gene for IntegerGene {
    fn name(&self) -> &str {
        &self.name
    }

    fn random(&self, rng: &mut GenomeRng) -> Allele {
        Allele::Integer(
            (0..self.size)
                .map(|_| rng.uniform_int(self.bounds))
                .collect(),
        )
    }

    fn mutate(&self, allele: &mut Allele, indpb: f64, rng: &mut GenomeRng) {
        if let Allele::Integer(values) = allele {
            for value in values.iter_mut() {
                if rng.chance(indpb) {
                    *value = rng.uniform_int(self.bounds);
                }
            }
        }
    }

    fn crossover(&self, a: &mut Allele, b: &mut Allele, rng: &mut GenomeRng) {
        if let (Allele::Integer(xs), Allele::Integer(ys)) = (a, b) {
            for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
                if rng.chance(0.5) {
                    std::mem::swap(x, y);
                }
            }
        }
    }

    fn distance(&self, a: &Allele, b: &Allele) -> f64 {
        match (a, b) {
            (Allele::Integer(xs), Allele::Integer(ys)) => {
                let range = (i128::from(self.bounds.1) - i128::from(self.bounds.0)) as f64;
                mean_abs_diff(
                    xs.iter().map(|&v| v as f64),
                    ys.iter().map(|&v| v as f64),
                    range,
                )
            }
            _ => 1.0,
        }
    }

    fn express(&self, allele: &Allele) -> Value {
        express_numeric(allele)
    }
}

/// One label out of a fixed list.
pub struct ChoiceGene {
    name: String,
    options: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChoiceParams {
    options: Vec<String>,
}

impl ChoiceGene {
    pub fn from_spec(spec: &GeneSpec) -> Result<Box<dyn Gene>, PluginLoadError> {
        let params: ChoiceParams = parse_params(&spec.name, &spec.params)?;
        if params.options.is_empty() {
            return Err(PluginLoadError::InvalidComponent {
                component: spec.name.clone(),
                reason: "options must not be empty".to_string(),
            });
        }

        Ok(Box::new(Self {
            name: spec.name.clone(),
            options: params.options,
        }))
    }
}

impl Gene for ChoiceGene {
    fn name(&self) -> &str {
        &self.name
    }

    fn random(&self, rng: &mut GenomeRng) -> Allele {
        Allele::Choice(rng.index(self.options.len()))
    }

    fn mutate(&self, allele: &mut Allele, indpb: f64, rng: &mut GenomeRng) {
        if let Allele::Choice(index) = allele
            && rng.chance(indpb)
        {
            *index = rng.index(self.options.len());
        }
    }

    fn crossover(&self, a: &mut Allele, b: &mut Allele, rng: &mut GenomeRng) {
        if rng.chance(0.5) {
            std::mem::swap(a, b);
        }
    }

    fn distance(&self, a: &Allele, b: &Allele) -> f64 {
        if a == b { 0.0 } else { 1.0 }
    }

    fn express(&self, allele: &Allele) -> Value {
        match allele {
            Allele::Choice(index) => self
                .options
                .get(*index)
                .map(|label| Value::String(label.clone()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn labels(&self) -> Option<&[String]> {
        Some(&self.options)
    }
}

/// Mean absolute difference normalised by `range`, clamped to `[0, 1]`.
fn mean_abs_diff(
    xs: impl Iterator<Item = f64>,
    ys: impl Iterator<Item = f64>,
    range: f64,
) -> f64 {
    let (sum, count) = xs
        .zip(ys)
        .fold((0.0, 0usize), |(sum, count), (x, y)| (sum + (x - y).abs(), count + 1));

    if count == 0 || range <= 0.0 {
        0.0
    } else {
        (sum / count as f64 / range).min(1.0)
    }
}

fn express_numeric(allele: &Allele) -> Value {
    match allele {
        Allele::Real(values) => Value::Sequence(values.iter().map(|&v| Value::from(v)).collect()),
        Allele::Integer(values) => {
            Value::Sequence(values.iter().map(|&v| Value::from(v)).collect())
        }
        Allele::Choice(index) => Value::from(*index as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(kind: &str, yaml: &str) -> GeneSpec {
        let params: BTreeMap<String, Value> = serde_yaml::from_str(yaml).unwrap();
        GeneSpec {
            name: "g".to_string(),
            kind: kind.to_string(),
            params,
        }
    }

    #[test]
    fn test_real_random_within_bounds() {
        let gene = RealGene::from_spec(&spec("real", "size: 4\nbounds: [-1.0, 1.0]")).unwrap();
        let mut rng = GenomeRng::new(42);
        match gene.random(&mut rng) {
            Allele::Real(values) => {
                assert_eq!(values.len(), 4);
                assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
            }
            other => panic!("unexpected allele {other:?}"),
        }
    }

    #[test]
    fn test_real_mutation_full_rate_changes_values() {
        let gene = RealGene::from_spec(&spec("real", "size: 3\nbounds: [0.0, 10.0]\nsigma: 1.0"))
            .unwrap();
        let mut rng = GenomeRng::new(42);
        let original = Allele::Real(vec![5.0, 5.0, 5.0]);
        let mut mutated = original.clone();
        gene.mutate(&mut mutated, 1.0, &mut rng);
        assert_ne!(mutated, original);

        let mut untouched = original.clone();
        gene.mutate(&mut untouched, 0.0, &mut rng);
        assert_eq!(untouched, original);
    }

    #[test]
    fn test_real_crossover_stays_between_parents() {
        let gene = RealGene::from_spec(&spec("real", "size: 2\nbounds: [0.0, 10.0]")).unwrap();
        let mut rng = GenomeRng::new(9);
        let mut a = Allele::Real(vec![1.0, 2.0]);
        let mut b = Allele::Real(vec![3.0, 8.0]);
        gene.crossover(&mut a, &mut b, &mut rng);

        for allele in [&a, &b] {
            let Allele::Real(values) = allele else {
                panic!("unexpected allele");
            };
            assert!((1.0..=3.0).contains(&values[0]));
            assert!((2.0..=8.0).contains(&values[1]));
        }
    }

    #[test]
    fn test_real_distance() {
        let gene = RealGene::from_spec(&spec("real", "size: 2\nbounds: [0.0, 10.0]")).unwrap();
        let a = Allele::Real(vec![0.0, 0.0]);
        let b = Allele::Real(vec![10.0, 0.0]);
        assert!((gene.distance(&a, &a)).abs() < 1e-12);
        assert!((gene.distance(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_real_invalid_bounds() {
        let result = RealGene::from_spec(&spec("real", "bounds: [1.0, 1.0]"));
        assert!(matches!(
            result,
            Err(PluginLoadError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn test_real_unbounded_rejected() {
        for yaml in [
            "bounds: [-1.0e308, 1.0e308]",
            "bounds: [0.0, .inf]",
            "bounds: [.nan, 1.0]",
        ] {
            let result = RealGene::from_spec(&spec("real", yaml));
            assert!(
                matches!(result, Err(PluginLoadError::InvalidComponent { .. })),
                "{yaml} accepted"
            );
        }
    }

    #[test]
    fn test_real_invalid_sigma_rejected() {
        for sigma in ["-1.0", ".nan", ".inf"] {
            let yaml = format!("bounds: [0.0, 1.0]\nsigma: {sigma}");
            let result = RealGene::from_spec(&spec("real", &yaml));
            assert!(
                matches!(result, Err(PluginLoadError::InvalidComponent { .. })),
                "sigma {sigma} accepted"
            );
        }
    }

    #[test]
    fn test_integer_distance_full_range() {
        let gene =
            IntegerGene::from_spec(&spec("integer", &format!("bounds: [{}, {}]", i64::MIN, i64::MAX)))
                .unwrap();
        let a = Allele::Integer(vec![i64::MIN]);
        let b = Allele::Integer(vec![i64::MAX]);
        assert!((gene.distance(&a, &b) - 1.0).abs() < 1e-9);
        assert_eq!(gene.distance(&a, &a), 0.0);

        let mut rng = GenomeRng::new(3);
        assert!(matches!(gene.random(&mut rng), Allele::Integer(v) if v.len() == 1));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let result = RealGene::from_spec(&spec("real", "bounds: [0.0, 1.0]\nwidth: 3"));
        assert!(matches!(
            result,
            Err(PluginLoadError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_integer_crossover_preserves_multiset() {
        let gene = IntegerGene::from_spec(&spec("integer", "size: 4\nbounds: [0, 9]")).unwrap();
        let mut rng = GenomeRng::new(5);
        let mut a = Allele::Integer(vec![0, 1, 2, 3]);
        let mut b = Allele::Integer(vec![9, 8, 7, 6]);
        gene.crossover(&mut a, &mut b, &mut rng);

        let (Allele::Integer(xs), Allele::Integer(ys)) = (&a, &b) else {
            panic!("unexpected alleles");
        };
        for i in 0..4 {
            let mut pair = [xs[i], ys[i]];
            pair.sort();
            assert_eq!(pair, [i as i64, 9 - i as i64]);
        }
    }

    #[test]
    fn test_choice_express_and_labels() {
        let gene = ChoiceGene::from_spec(&spec("choice", "options: [A, B, C]")).unwrap();
        assert_eq!(gene.express(&Allele::Choice(1)), Value::String("B".into()));
        assert_eq!(gene.labels().map(|l| l.len()), Some(3));
        assert_eq!(gene.distance(&Allele::Choice(0), &Allele::Choice(0)), 0.0);
        assert_eq!(gene.distance(&Allele::Choice(0), &Allele::Choice(2)), 1.0);
    }
}
