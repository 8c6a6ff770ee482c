// src/algorithms/perturbation.rs

use crate::core::{
    ColumnKind, Dataset, ExplainError, FeatureValue, FeatureVector, Result, Schema, Stage,
};
use crate::utils;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// How numeric features are perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericSampling {
    /// Instance value plus Gaussian noise scaled by the feature's standard deviation.
    Gaussian,
    /// Draw a quartile bin by its observed frequency, then a value inside the bin.
    Quartiles,
}

/// Configuration for perturbation sampling around a single instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Number of synthetic neighbours drawn in addition to the anchor instance.
    pub n_samples: usize,
    /// Kernel width; `None` means `0.75 * sqrt(n_features)`.
    pub kernel_width: Option<f64>,
    pub numeric: NumericSampling,
    pub seed: u64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        PerturbationConfig {
            n_samples: 5000,
            kernel_width: None,
            numeric: NumericSampling::Gaussian,
            seed: 0,
        }
    }
}

impl PerturbationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(ExplainError::Config(
                "perturbation n_samples must be at least 1".to_string(),
            ));
        }
        if let Some(width) = self.kernel_width {
            if !(width.is_finite() && width > 0.0) {
                return Err(ExplainError::Config(format!(
                    "kernel width must be positive, got {}",
                    width
                )));
            }
        }
        Ok(())
    }
}

/// Marginal distribution of one numeric feature over the full dataset.
#[derive(Debug, Clone)]
pub struct NumericStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Deduplicated quartile boundaries; bin `i` is `(b[i-1], b[i]]`.
    pub boundaries: Vec<f64>,
    bins: Option<WeightedIndex<f64>>,
}

impl NumericStats {
    fn from_values(values: &[f64]) -> Self {
        let sorted = utils::sorted(values);
        let ones = vec![1.0; values.len()];
        let mean = utils::weighted_mean(values, &ones).unwrap_or(0.0);
        let std = utils::std_dev(values);
        let min = sorted.first().copied().unwrap_or(0.0);
        let max = sorted.last().copied().unwrap_or(0.0);

        let mut boundaries: Vec<f64> = [0.25, 0.5, 0.75]
            .iter()
            .filter_map(|q| utils::quantile_sorted(&sorted, *q))
            .collect();
        boundaries.dedup();

        let mut counts = vec![0.0; boundaries.len() + 1];
        for v in values {
            counts[bin_index(&boundaries, *v)] += 1.0;
        }
        let bins = WeightedIndex::new(&counts).ok();

        NumericStats {
            mean,
            std,
            min,
            max,
            boundaries,
            bins,
        }
    }

    /// Index of the quartile bin containing `value`.
    pub fn bin_of(&self, value: f64) -> usize {
        bin_index(&self.boundaries, value)
    }

    /// Closed bounds used when drawing a value inside bin `bin`.
    fn bin_bounds(&self, bin: usize) -> (f64, f64) {
        let lo = if bin == 0 { self.min } else { self.boundaries[bin - 1] };
        let hi = if bin == self.boundaries.len() {
            self.max
        } else {
            self.boundaries[bin]
        };
        (lo.min(hi), hi.max(lo))
    }

    /// Human-readable condition for bin `bin` of feature `name`.
    pub fn describe_bin(&self, name: &str, bin: usize) -> String {
        let last = self.boundaries.len();
        if last == 0 {
            return format!("{} = {:.2}", name, self.mean);
        }
        if bin == 0 {
            format!("{} <= {:.2}", name, self.boundaries[0])
        } else if bin == last {
            format!("{} > {:.2}", name, self.boundaries[last - 1])
        } else {
            format!(
                "{:.2} < {} <= {:.2}",
                self.boundaries[bin - 1],
                name,
                self.boundaries[bin]
            )
        }
    }
}

fn bin_index(boundaries: &[f64], value: f64) -> usize {
    boundaries.iter().filter(|b| value > **b).count()
}

#[derive(Debug, Clone)]
pub struct CategoricalStats {
    pub levels: Vec<String>,
    pub frequencies: Vec<f64>,
    sampler: WeightedIndex<f64>,
}

#[derive(Debug, Clone)]
pub enum ColumnStats {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

/// Per-feature marginal distributions of a dataset, in schema order.
#[derive(Debug, Clone)]
pub struct FeatureStatistics {
    schema: Schema,
    columns: Vec<(String, ColumnStats)>,
}

impl FeatureStatistics {
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let n = dataset.len() as f64;
        let mut columns = Vec::with_capacity(dataset.schema().len());
        for column in dataset.schema().columns() {
            let stats = match &column.kind {
                ColumnKind::Numeric => {
                    let values = dataset.numeric_column(&column.name).ok_or_else(|| {
                        ExplainError::invalid(
                            Stage::Selection,
                            format!("numeric feature `{}` has non-numeric values", column.name),
                        )
                    })?;
                    ColumnStats::Numeric(NumericStats::from_values(&values))
                }
                ColumnKind::Categorical(levels) => {
                    let mut counts = vec![0.0; levels.len()];
                    for record in dataset.records() {
                        let level =
                            record.features.get(&column.name).and_then(FeatureValue::as_level);
                        if let Some(pos) = level.and_then(|l| levels.iter().position(|x| x == l)) {
                            counts[pos] += 1.0;
                        }
                    }
                    let sampler = WeightedIndex::new(&counts).map_err(|e| {
                        ExplainError::invalid(
                            Stage::Selection,
                            format!("cannot sample levels of `{}`: {}", column.name, e),
                        )
                    })?;
                    ColumnStats::Categorical(CategoricalStats {
                        levels: levels.clone(),
                        frequencies: counts.iter().map(|c| c / n).collect(),
                        sampler,
                    })
                }
            };
            columns.push((column.name.clone(), stats));
        }
        Ok(FeatureStatistics {
            schema: dataset.schema().clone(),
            columns,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[(String, ColumnStats)] {
        &self.columns
    }

    pub fn numeric(&self, name: &str) -> Option<&NumericStats> {
        self.columns.iter().find_map(|(n, s)| match s {
            ColumnStats::Numeric(stats) if n == name => Some(stats),
            _ => None,
        })
    }
}

/// One synthetic neighbour (or the anchor) with its proximity weight.
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbedSample {
    pub features: FeatureVector,
    pub distance: f64,
    pub weight: f64,
}

/// Draws neighbours around an instance from the dataset's marginals.
#[derive(Debug, Clone)]
pub struct PerturbationSampler<'a> {
    stats: &'a FeatureStatistics,
    config: PerturbationConfig,
    kernel_width: f64,
}

impl<'a> PerturbationSampler<'a> {
    pub fn new(stats: &'a FeatureStatistics, config: PerturbationConfig) -> Result<Self> {
        config.validate()?;
        let kernel_width = config
            .kernel_width
            .unwrap_or_else(|| 0.75 * (stats.columns.len().max(1) as f64).sqrt());
        Ok(PerturbationSampler {
            stats,
            config,
            kernel_width,
        })
    }

    pub fn kernel_width(&self) -> f64 {
        self.kernel_width
    }

    pub fn config(&self) -> &PerturbationConfig {
        &self.config
    }

    /// Samples with the configured seed.
    pub fn sample(&self, instance: &FeatureVector) -> Result<Vec<PerturbedSample>> {
        self.sample_with_seed(instance, self.config.seed)
    }

    /// Returns `n_samples + 1` samples; sample 0 is the instance itself with weight 1.
    pub fn sample_with_seed(
        &self,
        instance: &FeatureVector,
        seed: u64,
    ) -> Result<Vec<PerturbedSample>> {
        self.stats.schema.check(instance, Stage::Selection)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut samples = Vec::with_capacity(self.config.n_samples + 1);
        samples.push(PerturbedSample {
            features: self.reorder(instance),
            distance: 0.0,
            weight: 1.0,
        });

        for _ in 0..self.config.n_samples {
            let mut features = FeatureVector::new();
            for (name, stats) in &self.stats.columns {
                let value = match (stats, instance.get(name)) {
                    (ColumnStats::Numeric(num), Some(FeatureValue::Numeric(x0))) => {
                        FeatureValue::Numeric(self.draw_numeric(num, *x0, &mut rng))
                    }
                    (ColumnStats::Categorical(cat), _) => {
                        FeatureValue::Categorical(cat.levels[cat.sampler.sample(&mut rng)].clone())
                    }
                    // Kinds were validated by the schema check.
                    (_, Some(other)) => other.clone(),
                    (_, None) => continue,
                };
                features.set(name.clone(), value);
            }
            let distance = self.distance(instance, &features);
            samples.push(PerturbedSample {
                features,
                distance,
                weight: utils::exponential_kernel(distance, self.kernel_width),
            });
        }
        Ok(samples)
    }

    fn draw_numeric(&self, stats: &NumericStats, x0: f64, rng: &mut StdRng) -> f64 {
        match self.config.numeric {
            NumericSampling::Gaussian => {
                let z: f64 = StandardNormal.sample(rng);
                x0 + z * stats.std
            }
            NumericSampling::Quartiles => match &stats.bins {
                Some(bins) => {
                    let (lo, hi) = stats.bin_bounds(bins.sample(rng));
                    if hi > lo {
                        rng.gen_range(lo..=hi)
                    } else {
                        lo
                    }
                }
                None => x0,
            },
        }
    }

    /// Euclidean distance over per-feature normalized differences.
    pub fn distance(&self, instance: &FeatureVector, other: &FeatureVector) -> f64 {
        let mut sq = 0.0;
        for (name, stats) in &self.stats.columns {
            let (a, b) = match (instance.get(name), other.get(name)) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let term = match (stats, a, b) {
                (ColumnStats::Numeric(num), FeatureValue::Numeric(x), FeatureValue::Numeric(y)) => {
                    match self.config.numeric {
                        NumericSampling::Gaussian if num.std > 0.0 => (x - y) / num.std,
                        NumericSampling::Gaussian => 0.0,
                        NumericSampling::Quartiles => {
                            if num.bin_of(*x) == num.bin_of(*y) {
                                0.0
                            } else {
                                1.0
                            }
                        }
                    }
                }
                _ => {
                    if a == b {
                        0.0
                    } else {
                        1.0
                    }
                }
            };
            sq += term * term;
        }
        sq.sqrt()
    }

    fn reorder(&self, instance: &FeatureVector) -> FeatureVector {
        self.stats
            .columns
            .iter()
            .filter_map(|(name, _)| instance.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}
