// src/algorithms/region.rs

use crate::algorithms::perturbation::{FeatureStatistics, PerturbationConfig, PerturbationSampler};
use crate::core::{Dataset, ExplainError, FeatureValue, FeatureVector, Result, Stage};
use crate::traits::{predict_checked, PredictModel};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// What a quantile rule ranks records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantileBasis {
    Target,
    Prediction,
}

/// A rule carving the local neighbourhood out of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionRule {
    /// All records whose `feature` equals `value`.
    Equals { feature: String, value: FeatureValue },
    /// Records whose target or prediction lies within the `[lower, upper]` quantiles.
    Quantile {
        basis: QuantileBasis,
        lower: f64,
        upper: f64,
    },
    /// Synthetic neighbours drawn around `instance`, weighted by proximity.
    Perturbation { instance: FeatureVector },
}

impl RegionRule {
    pub fn equals(feature: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        RegionRule::Equals {
            feature: feature.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for RegionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionRule::Equals { feature, value } => write!(f, "{} == {}", feature, value),
            RegionRule::Quantile {
                basis,
                lower,
                upper,
            } => write!(f, "{:?} in quantiles [{}, {}]", basis, lower, upper),
            RegionRule::Perturbation { .. } => write!(f, "perturbation around instance"),
        }
    }
}

/// Where a region sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleSource {
    /// Index into the dataset's records.
    Record(usize),
    /// The instance a perturbation region was drawn around.
    Anchor,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSample<'a> {
    pub features: Cow<'a, FeatureVector>,
    pub weight: f64,
    pub source: SampleSource,
}

/// A weighted view over (or around) a dataset.
#[derive(Debug, Clone)]
pub struct Region<'a> {
    dataset: &'a Dataset,
    samples: Vec<RegionSample<'a>>,
}

impl<'a> Region<'a> {
    /// Builds a region over arbitrary record indices with unit weights.
    pub fn from_indices(dataset: &'a Dataset, indices: &[usize]) -> Result<Self> {
        let samples = indices
            .iter()
            .map(|&idx| {
                dataset
                    .records()
                    .get(idx)
                    .map(|record| RegionSample {
                        features: Cow::Borrowed(&record.features),
                        weight: 1.0,
                        source: SampleSource::Record(idx),
                    })
                    .ok_or_else(|| {
                        ExplainError::invalid(
                            Stage::Selection,
                            format!("record {} out of range", idx),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Region { dataset, samples })
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn samples(&self) -> &[RegionSample<'a>] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.weight).collect()
    }

    /// Feature vectors in sample order, ready for one batched `predict` call.
    pub fn feature_vectors(&self) -> Vec<FeatureVector> {
        self.samples.iter().map(|s| s.features.as_ref().clone()).collect()
    }

    /// Dataset indices of the samples that are real records.
    pub fn record_indices(&self) -> Vec<usize> {
        self.samples
            .iter()
            .filter_map(|s| match s.source {
                SampleSource::Record(idx) => Some(idx),
                _ => None,
            })
            .collect()
    }

    /// Values of a numeric feature across the region.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<f64>> {
        self.samples
            .iter()
            .map(|s| s.features.get(name).and_then(FeatureValue::as_numeric))
            .collect()
    }
}

/// Selects regions from a dataset.
#[derive(Debug, Clone)]
pub struct RegionSelector<'a> {
    dataset: &'a Dataset,
    perturbation: PerturbationConfig,
    stats: Option<FeatureStatistics>,
}

impl<'a> RegionSelector<'a> {
    pub fn new(dataset: &'a Dataset, perturbation: Option<PerturbationConfig>) -> Result<Self> {
        let perturbation = perturbation.unwrap_or_default();
        perturbation.validate()?;
        Ok(RegionSelector {
            dataset,
            perturbation,
            stats: None,
        })
    }

    /// Selects without a model; `Quantile { basis: Prediction }` requires
    /// [`Self::select_with_model`].
    pub fn select(&self, rule: &RegionRule) -> Result<Region<'a>> {
        self.select_inner(rule, None)
    }

    pub fn select_with_model(
        &self,
        rule: &RegionRule,
        model: &dyn PredictModel,
    ) -> Result<Region<'a>> {
        self.select_inner(rule, Some(model))
    }

    fn select_inner(
        &self,
        rule: &RegionRule,
        model: Option<&dyn PredictModel>,
    ) -> Result<Region<'a>> {
        let region = match rule {
            RegionRule::Equals { feature, value } => self.select_equals(feature, value)?,
            RegionRule::Quantile {
                basis,
                lower,
                upper,
            } => self.select_quantile(*basis, *lower, *upper, model)?,
            RegionRule::Perturbation { instance } => self.select_perturbation(instance)?,
        };
        if region.is_empty() {
            return Err(ExplainError::EmptyRegion {
                rule: rule.to_string(),
            });
        }
        log::debug!("region `{}` selected {} samples", rule, region.len());
        Ok(region)
    }

    fn select_equals(&self, feature: &str, value: &FeatureValue) -> Result<Region<'a>> {
        let column = self.dataset.schema().column(feature).ok_or_else(|| {
            ExplainError::mismatch(
                Stage::Selection,
                format!("dataset has no feature `{}`", feature),
            )
        })?;
        if column.is_numeric() != matches!(value, FeatureValue::Numeric(_)) {
            return Err(ExplainError::mismatch(
                Stage::Selection,
                format!("value {} has the wrong kind for feature `{}`", value, feature),
            ));
        }
        let indices: Vec<usize> = self
            .dataset
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.features.get(feature) == Some(value))
            .map(|(idx, _)| idx)
            .collect();
        Region::from_indices(self.dataset, &indices)
    }

    fn select_quantile(
        &self,
        basis: QuantileBasis,
        lower: f64,
        upper: f64,
        model: Option<&dyn PredictModel>,
    ) -> Result<Region<'a>> {
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower > upper {
            return Err(ExplainError::invalid(
                Stage::Selection,
                format!("quantile range [{}, {}] is not within [0, 1]", lower, upper),
            ));
        }
        let scores: Vec<f64> = match basis {
            QuantileBasis::Target => self
                .dataset
                .records()
                .iter()
                .map(|r| r.target.as_continuous())
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| {
                    ExplainError::invalid(
                        Stage::Selection,
                        "target quantiles require a continuous target",
                    )
                })?,
            QuantileBasis::Prediction => {
                let model = model.ok_or_else(|| {
                    ExplainError::invalid(
                        Stage::Selection,
                        "prediction quantiles require a model",
                    )
                })?;
                let batch: Vec<FeatureVector> =
                    self.dataset.records().iter().map(|r| r.features.clone()).collect();
                predict_checked(model, &batch, Stage::Selection)?.to_vec()
            }
        };

        let sorted = utils::sorted(&scores);
        let (lo, hi) = match (
            utils::quantile_sorted(&sorted, lower),
            utils::quantile_sorted(&sorted, upper),
        ) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Region::from_indices(self.dataset, &[]),
        };
        let indices: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| **s >= lo && **s <= hi)
            .map(|(idx, _)| idx)
            .collect();
        Region::from_indices(self.dataset, &indices)
    }

    fn select_perturbation(&self, instance: &FeatureVector) -> Result<Region<'a>> {
        let computed;
        let stats = match &self.stats {
            Some(stats) => stats,
            None => {
                computed = FeatureStatistics::from_dataset(self.dataset)?;
                &computed
            }
        };
        let sampler = PerturbationSampler::new(stats, self.perturbation.clone())?;
        let samples = sampler
            .sample(instance)?
            .into_iter()
            .enumerate()
            .map(|(idx, s)| RegionSample {
                features: Cow::Owned(s.features),
                weight: s.weight,
                source: if idx == 0 {
                    SampleSource::Anchor
                } else {
                    SampleSource::Synthetic
                },
            })
            .collect();
        Ok(Region {
            dataset: self.dataset,
            samples,
        })
    }

    /// Precomputes the dataset marginals so repeated perturbation rules reuse them.
    pub fn with_statistics(mut self) -> Result<Self> {
        self.stats = Some(FeatureStatistics::from_dataset(self.dataset)?);
        Ok(self)
    }
}
