// src/algorithms/lime.rs

//! Perturbation-based local explanations (LIME).
//!
//! Neighbours are drawn around one instance from the dataset's marginals,
//! weighted by proximity, mapped to an interpretable representation and
//! explained by a weighted linear model fitted to the black box's scores.

use crate::algorithms::linear::{self, LinearFit, Penalty};
use crate::algorithms::perturbation::{
    ColumnStats, FeatureStatistics, NumericSampling, PerturbationConfig, PerturbationSampler,
    PerturbedSample,
};
use crate::core::{Dataset, ExplainError, FeatureValue, FeatureVector, Result, Stage};
use crate::traits::{predict_checked, predict_proba_checked, PredictModel, ProbabilisticModel};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalModelKind {
    /// Weighted ridge regression on the raw score.
    Ridge,
    /// Weighted ridge-penalized logistic regression; scores must be probabilities.
    Logistic,
}

/// Configuration for the LimeExplainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimeConfig {
    /// Quartile sampling by default. An explicit `[lime.sampling]` table
    /// starts from `PerturbationConfig::default()` instead, so set `numeric`
    /// there too.
    pub sampling: PerturbationConfig,
    /// Number of features kept in an explanation.
    pub num_features: usize,
    pub local_model: LocalModelKind,
    /// L2 penalty of the local model.
    pub ridge: f64,
    /// Explanations scoring below this are flagged `Confidence::Low`.
    pub min_score: f64,
    /// Labels explained by `LabelSelection::Top` when none is given.
    pub n_labels: usize,
}

impl Default for LimeConfig {
    fn default() -> Self {
        LimeConfig {
            sampling: PerturbationConfig {
                numeric: NumericSampling::Quartiles,
                ..PerturbationConfig::default()
            },
            num_features: 10,
            local_model: LocalModelKind::Ridge,
            ridge: 1.0,
            min_score: 0.5,
            n_labels: 1,
        }
    }
}

impl LimeConfig {
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        if self.num_features == 0 {
            return Err(ExplainError::Config("num_features must be at least 1".to_string()));
        }
        if !(self.ridge.is_finite() && self.ridge >= 0.0) {
            return Err(ExplainError::Config(format!("ridge must be >= 0, got {}", self.ridge)));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ExplainError::Config(format!(
                "min_score must lie in [0, 1], got {}",
                self.min_score
            )));
        }
        if self.n_labels == 0 {
            return Err(ExplainError::Config("n_labels must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Which class labels `explain_labels` explains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSelection {
    /// The `n` labels with the highest predicted probability for the instance.
    Top(usize),
    Labels(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Normal,
    /// The local model explains the black box poorly around this instance.
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFeature {
    pub feature: String,
    /// Interpretable condition, e.g. `Def_Int <= 3.00` or `Pos=QB`.
    pub description: String,
    pub weight: f64,
}

/// A local explanation of one instance (and optionally one class label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub instance: FeatureVector,
    pub label: Option<String>,
    /// Black-box score of the instance.
    pub prediction: f64,
    /// Local model's score of the instance.
    pub local_prediction: f64,
    pub intercept: f64,
    /// Sorted by descending absolute weight.
    pub features: Vec<LocalFeature>,
    /// Weighted R² (deviance explained for logistic local models).
    pub score: f64,
    pub confidence: Confidence,
}

impl Explanation {
    pub fn weight_of(&self, feature: &str) -> Option<f64> {
        self.features.iter().find(|f| f.feature == feature).map(|f| f.weight)
    }

    pub fn is_confident(&self) -> bool {
        self.confidence == Confidence::Normal
    }
}

#[derive(Debug, Clone)]
enum Interpretable {
    /// 1 when the sample falls in the instance's quartile bin.
    SameBin { bin: usize },
    Standardized { mean: f64, std: f64 },
    /// 1 when the sample carries the instance's level.
    SameLevel { level: String },
}

#[derive(Debug, Clone)]
struct InterpretableColumn {
    feature: String,
    description: String,
    kind: Interpretable,
}

impl InterpretableColumn {
    fn value(&self, sample: &FeatureVector, stats: &FeatureStatistics) -> Option<f64> {
        let value = sample.get(&self.feature)?;
        match (&self.kind, value) {
            (Interpretable::SameBin { bin }, FeatureValue::Numeric(x)) => {
                let num = stats.numeric(&self.feature)?;
                Some(if num.bin_of(*x) == *bin { 1.0 } else { 0.0 })
            }
            (Interpretable::Standardized { mean, std }, FeatureValue::Numeric(x)) => {
                Some((x - mean) / std)
            }
            (Interpretable::SameLevel { level }, FeatureValue::Categorical(actual)) => {
                Some(if actual == level { 1.0 } else { 0.0 })
            }
            _ => None,
        }
    }
}

/// Explains single predictions by sampling around them.
#[derive(Debug, Clone)]
pub struct LimeExplainer {
    stats: FeatureStatistics,
    config: LimeConfig,
}

impl LimeExplainer {
    /// Precomputes the marginal statistics of `dataset` used for sampling.
    pub fn new(dataset: &Dataset, config: Option<LimeConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        config.validate()?;
        let stats = FeatureStatistics::from_dataset(dataset).map_err(|e| e.at(Stage::Explanation))?;
        Ok(LimeExplainer { stats, config })
    }

    pub fn config(&self) -> &LimeConfig {
        &self.config
    }

    pub fn statistics(&self) -> &FeatureStatistics {
        &self.stats
    }

    /// Explains the black-box score of `instance` with the configured seed.
    pub fn explain(
        &self,
        instance: &FeatureVector,
        model: &dyn PredictModel,
    ) -> Result<Explanation> {
        self.explain_with_seed(instance, model, self.config.sampling.seed)
    }

    pub fn explain_with_seed(
        &self,
        instance: &FeatureVector,
        model: &dyn PredictModel,
        seed: u64,
    ) -> Result<Explanation> {
        let samples = self.neighbourhood(instance, seed)?;
        let batch: Vec<FeatureVector> = samples.iter().map(|s| s.features.clone()).collect();
        let y = predict_checked(model, &batch, Stage::Explanation)?;
        let logistic = self.config.local_model == LocalModelKind::Logistic;
        if logistic && y.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(ExplainError::invalid(
                Stage::Explanation,
                "logistic local models need black-box probabilities in [0, 1]",
            ));
        }

        let (columns, x, w) = self.design(instance, &samples)?;
        self.explain_target(instance, None, &columns, &x, &y, &w)
    }

    /// Explains many instances in parallel; instance `i` is sampled with `seed + i`.
    pub fn explain_batch(
        &self,
        instances: &[FeatureVector],
        model: &dyn PredictModel,
    ) -> Vec<Result<Explanation>> {
        let seed = self.config.sampling.seed;
        instances
            .par_iter()
            .enumerate()
            .map(|(i, instance)| {
                self.explain_with_seed(instance, model, seed.wrapping_add(i as u64))
            })
            .collect()
    }

    /// One-vs-rest explanations of a classifier's class probabilities.
    ///
    /// The neighbourhood is sampled and predicted once and shared by every label.
    pub fn explain_labels(
        &self,
        instance: &FeatureVector,
        model: &dyn ProbabilisticModel,
        selection: &LabelSelection,
    ) -> Result<Vec<Explanation>> {
        let samples = self.neighbourhood(instance, self.config.sampling.seed)?;
        let batch: Vec<FeatureVector> = samples.iter().map(|s| s.features.clone()).collect();
        let proba = predict_proba_checked(model, &batch, Stage::Explanation)?;
        let labels = model.class_labels();

        let chosen: Vec<usize> = match selection {
            LabelSelection::Top(n) => {
                let mut order: Vec<usize> = (0..labels.len()).collect();
                order.sort_by(|a, b| {
                    proba[[0, *b]]
                        .partial_cmp(&proba[[0, *a]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                order.truncate(*n);
                order
            }
            LabelSelection::Labels(names) => names
                .iter()
                .map(|name| {
                    labels.iter().position(|l| l == name).ok_or_else(|| {
                        ExplainError::invalid(
                            Stage::Explanation,
                            format!("unknown class label `{}`", name),
                        )
                    })
                })
                .collect::<Result<_>>()?,
        };

        let (columns, x, w) = self.design(instance, &samples)?;
        chosen
            .into_iter()
            .map(|j| {
                let y = proba.column(j).to_owned();
                self.explain_target(instance, Some(labels[j].clone()), &columns, &x, &y, &w)
            })
            .collect()
    }

    /// `explain_labels` for the configured number of top labels.
    pub fn explain_top_labels(
        &self,
        instance: &FeatureVector,
        model: &dyn ProbabilisticModel,
    ) -> Result<Vec<Explanation>> {
        self.explain_labels(instance, model, &LabelSelection::Top(self.config.n_labels))
    }

    fn neighbourhood(&self, instance: &FeatureVector, seed: u64) -> Result<Vec<PerturbedSample>> {
        let sampler = PerturbationSampler::new(&self.stats, self.config.sampling.clone())?;
        sampler
            .sample_with_seed(instance, seed)
            .map_err(|e| e.at(Stage::Explanation))
    }

    fn interpretable_columns(&self, instance: &FeatureVector) -> Result<Vec<InterpretableColumn>> {
        let mut columns = Vec::new();
        for (name, stats) in self.stats.columns() {
            let value = instance.get(name).ok_or_else(|| {
                ExplainError::mismatch(Stage::Explanation, format!("instance lacks `{}`", name))
            })?;
            let column = match (stats, value) {
                // Never perturbed, so never informative.
                (ColumnStats::Numeric(num), _) if !(num.std > 0.0) => continue,
                (ColumnStats::Categorical(cat), _) if cat.levels.len() < 2 => continue,
                (ColumnStats::Numeric(num), FeatureValue::Numeric(x)) => {
                    match self.config.sampling.numeric {
                        NumericSampling::Quartiles => {
                            let bin = num.bin_of(*x);
                            InterpretableColumn {
                                feature: name.clone(),
                                description: num.describe_bin(name, bin),
                                kind: Interpretable::SameBin { bin },
                            }
                        }
                        NumericSampling::Gaussian => InterpretableColumn {
                            feature: name.clone(),
                            description: name.clone(),
                            kind: Interpretable::Standardized {
                                mean: num.mean,
                                std: num.std,
                            },
                        },
                    }
                }
                (ColumnStats::Categorical(_), FeatureValue::Categorical(level)) => {
                    InterpretableColumn {
                        feature: name.clone(),
                        description: format!("{}={}", name, level),
                        kind: Interpretable::SameLevel { level: level.clone() },
                    }
                }
                _ => {
                    return Err(ExplainError::mismatch(
                        Stage::Explanation,
                        format!("feature `{}` has the wrong kind", name),
                    ))
                }
            };
            columns.push(column);
        }
        Ok(columns)
    }

    fn design(
        &self,
        instance: &FeatureVector,
        samples: &[PerturbedSample],
    ) -> Result<(Vec<InterpretableColumn>, Array2<f64>, Array1<f64>)> {
        let columns = self.interpretable_columns(instance)?;
        let mut x = Array2::zeros((samples.len(), columns.len()));
        for (mut row, sample) in x.rows_mut().into_iter().zip(samples) {
            for (cell, column) in row.iter_mut().zip(&columns) {
                *cell = column.value(&sample.features, &self.stats).ok_or_else(|| {
                    ExplainError::mismatch(
                        Stage::Explanation,
                        format!("sample lacks feature `{}`", column.feature),
                    )
                })?;
            }
        }
        let w: Array1<f64> = samples.iter().map(|s| s.weight).collect();
        Ok((columns, x, w))
    }

    fn fit_local(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
    ) -> Result<(LinearFit, f64)> {
        let fitted = match self.config.local_model {
            LocalModelKind::Ridge => linear::weighted_least_squares(x, y, w, self.config.ridge)
                .map(|fit| {
                    let score = linear::weighted_r2(&fit, x, y, w);
                    (fit, score)
                }),
            LocalModelKind::Logistic => {
                // Penalties of the logistic solver act on weights normalised to sum to one.
                let penalty = Penalty {
                    lambda: self.config.ridge / w.sum(),
                    l1_ratio: 0.0,
                };
                linear::fit_logistic(x, y, w, penalty).map(|fit| {
                    let score = linear::deviance_explained(&fit, x, y, w);
                    (fit, score)
                })
            }
        };
        fitted.map_err(|e| e.at(Stage::Explanation))
    }

    fn explain_target(
        &self,
        instance: &FeatureVector,
        label: Option<String>,
        columns: &[InterpretableColumn],
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
    ) -> Result<Explanation> {
        let k = self.config.num_features;
        let keep: Vec<usize> = if columns.len() <= k {
            (0..columns.len()).collect()
        } else {
            let (full, _) = self.fit_local(x, y, w)?;
            let mut order: Vec<usize> = (0..columns.len()).collect();
            order.sort_by(|a, b| {
                full.coefficients[*b]
                    .abs()
                    .partial_cmp(&full.coefficients[*a].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            order.truncate(k);
            order.sort_unstable();
            order
        };

        let x_kept = x.select(Axis(1), &keep);
        let (fit, score) = self.fit_local(&x_kept, y, w)?;

        let eta = fit.predict_row(x_kept.row(0));
        let local_prediction = match self.config.local_model {
            LocalModelKind::Ridge => eta,
            LocalModelKind::Logistic => linear::sigmoid(eta),
        };

        let mut features: Vec<LocalFeature> = keep
            .iter()
            .zip(fit.coefficients.iter())
            .map(|(j, weight)| LocalFeature {
                feature: columns[*j].feature.clone(),
                description: columns[*j].description.clone(),
                weight: *weight,
            })
            .collect();
        features.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let confidence = if score < self.config.min_score {
            log::warn!(
                "low-confidence explanation{}: local score {:.3} below {:.3}",
                label.as_deref().map(|l| format!(" for label `{}`", l)).unwrap_or_default(),
                score,
                self.config.min_score
            );
            Confidence::Low
        } else {
            Confidence::Normal
        };

        Ok(Explanation {
            instance: instance.clone(),
            label,
            prediction: y[0],
            local_prediction,
            intercept: fit.intercept,
            features,
            score,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Record, Target};
    use approx::assert_abs_diff_eq;

    fn roster() -> Result<Dataset> {
        let positions = ["QB", "RB", "WR"];
        let records = (0..240)
            .map(|i| {
                Record::new(
                    FeatureVector::new()
                        .with("Yds", ((i * 37) % 200) as f64)
                        .with("Att", ((i * 11) % 50) as f64)
                        .with("Pos", positions[i % 3]),
                    Target::Continuous(i as f64),
                )
            })
            .collect();
        Dataset::new(records)
    }

    fn num(v: &FeatureVector, name: &str) -> f64 {
        v.get(name).and_then(FeatureValue::as_numeric).unwrap_or(0.0)
    }

    fn linear_box(batch: &[FeatureVector]) -> Result<Array1<f64>> {
        Ok(batch
            .iter()
            .map(|v| {
                let is_qb = v.get("Pos").and_then(FeatureValue::as_level) == Some("QB");
                let qb = if is_qb { 10.0 } else { 0.0 };
                3.0 * num(v, "Yds") + qb
            })
            .collect())
    }

    fn gaussian(n_samples: usize) -> LimeConfig {
        LimeConfig {
            sampling: PerturbationConfig {
                n_samples,
                numeric: NumericSampling::Gaussian,
                seed: 11,
                ..PerturbationConfig::default()
            },
            ridge: 0.0,
            ..LimeConfig::default()
        }
    }

    fn instance() -> FeatureVector {
        FeatureVector::new().with("Yds", 120.0).with("Att", 20.0).with("Pos", "QB")
    }

    #[test]
    fn recovers_a_locally_linear_model() -> Result<()> {
        let data = roster()?;
        let explainer = LimeExplainer::new(&data, Some(gaussian(500)))?;
        let explanation = explainer.explain(&instance(), &linear_box)?;

        let sigma = explainer.statistics().numeric("Yds").map(|s| s.std).unwrap_or(0.0);
        let yds = explanation.weight_of("Yds").unwrap_or(0.0);
        assert_abs_diff_eq!(yds, 3.0 * sigma, epsilon = 1e-6);
        assert_abs_diff_eq!(explanation.weight_of("Pos").unwrap_or(0.0), 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(explanation.weight_of("Att").unwrap_or(1.0), 0.0, epsilon = 1e-6);
        assert!(explanation.score > 0.999_999);
        assert!(explanation.is_confident());
        assert_abs_diff_eq!(explanation.prediction, 370.0, epsilon = 1e-9);
        assert_abs_diff_eq!(explanation.local_prediction, 370.0, epsilon = 1e-6);
        assert_eq!(explanation.features[0].feature, "Yds");
        Ok(())
    }

    #[test]
    fn keeps_only_the_strongest_features() -> Result<()> {
        let data = roster()?;
        let config = LimeConfig {
            num_features: 2,
            ..gaussian(500)
        };
        let explainer = LimeExplainer::new(&data, Some(config))?;
        let explanation = explainer.explain(&instance(), &linear_box)?;
        let kept: Vec<&str> = explanation.features.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(kept, vec!["Yds", "Pos"]);
        Ok(())
    }

    #[test]
    fn same_seed_same_explanation() -> Result<()> {
        let data = roster()?;
        let explainer = LimeExplainer::new(&data, None)?;
        let a = explainer.explain(&instance(), &linear_box)?;
        let b = explainer.explain(&instance(), &linear_box)?;
        assert_eq!(a, b);

        let others = vec![instance(), instance().with("Pos", "WR")];
        let batch = explainer.explain_batch(&others, &linear_box);
        let second = explainer.explain_with_seed(&others[1], &linear_box, 1)?;
        match &batch[1] {
            Ok(explanation) => assert_eq!(explanation, &second),
            Err(e) => panic!("batch explanation failed: {}", e),
        }
        Ok(())
    }

    #[test]
    fn quartile_mode_describes_bins() -> Result<()> {
        let data = roster()?;
        let config = LimeConfig {
            sampling: PerturbationConfig {
                n_samples: 800,
                ..LimeConfig::default().sampling
            },
            ..LimeConfig::default()
        };
        let explainer = LimeExplainer::new(&data, Some(config))?;
        let explanation = explainer.explain(&instance(), &linear_box)?;
        let yds = explanation.features.iter().find(|f| f.feature == "Yds");
        let description = yds.map(|f| f.description.clone()).unwrap_or_default();
        // Yds = 120 sits in the third quartile bin of 0..200.
        assert!(description.contains(" < Yds <= "));
        let pos = explanation.features.iter().find(|f| f.feature == "Pos");
        assert_eq!(pos.map(|f| f.description.as_str()), Some("Pos=QB"));
        Ok(())
    }

    #[test]
    fn erratic_models_are_flagged_low_confidence() -> Result<()> {
        let data = roster()?;
        let erratic = |batch: &[FeatureVector]| -> Result<Array1<f64>> {
            Ok(batch
                .iter()
                .map(|v| ((num(v, "Yds") * 1e4).sin() * 1e4).fract())
                .collect())
        };
        let explainer = LimeExplainer::new(&data, Some(gaussian(1000)))?;
        let explanation = explainer.explain(&instance(), &erratic)?;
        assert!(explanation.score < 0.5);
        assert_eq!(explanation.confidence, Confidence::Low);
        Ok(())
    }

    #[test]
    fn decision_boundaries_lower_the_local_score() -> Result<()> {
        let data = roster()?;
        // Steep in Yds, centred inside the (98.5, 148.25] quartile bin.
        let threshold_box = |batch: &[FeatureVector]| -> Result<Array1<f64>> {
            Ok(batch
                .iter()
                .map(|v| linear::sigmoid((num(v, "Yds") - 125.0) / 5.0))
                .collect())
        };
        let config = LimeConfig {
            sampling: PerturbationConfig {
                n_samples: 500,
                ..LimeConfig::default().sampling
            },
            ..LimeConfig::default()
        };
        let explainer = LimeExplainer::new(&data, Some(config))?;
        let player = |yds: f64, att: f64, pos: &str| {
            FeatureVector::new().with("Yds", yds).with("Att", att).with("Pos", pos)
        };
        let uncertain = [
            player(118.0, 5.0, "RB"),
            player(122.0, 30.0, "QB"),
            player(125.0, 20.0, "WR"),
            player(128.0, 45.0, "QB"),
            player(132.0, 10.0, "RB"),
        ];
        let settled = [
            player(10.0, 5.0, "RB"),
            player(30.0, 30.0, "QB"),
            player(170.0, 20.0, "WR"),
            player(190.0, 45.0, "QB"),
        ];

        let mut uncertain_scores = Vec::new();
        for instance in &uncertain {
            let explanation = explainer.explain(instance, &threshold_box)?;
            assert!((0.1..=0.9).contains(&explanation.prediction));
            assert_eq!(explanation.confidence, Confidence::Low);
            uncertain_scores.push(explanation.score);
        }
        let mut settled_scores = Vec::new();
        for instance in &settled {
            let explanation = explainer.explain(instance, &threshold_box)?;
            assert!(explanation.prediction < 0.01 || explanation.prediction > 0.99);
            settled_scores.push(explanation.score);
        }
        let worst_settled = settled_scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let best_uncertain = uncertain_scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(
            best_uncertain < worst_settled,
            "uncertain {:?} vs settled {:?}",
            uncertain_scores,
            settled_scores
        );
        Ok(())
    }

    struct PositionClassifier {
        labels: Vec<String>,
    }

    impl ProbabilisticModel for PositionClassifier {
        fn class_labels(&self) -> &[String] {
            &self.labels
        }

        fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Array2<f64>> {
            let mut proba = Array2::zeros((batch.len(), 3));
            for (i, v) in batch.iter().enumerate() {
                let scores = [num(v, "Yds") / 50.0, num(v, "Att") / 10.0, 1.5];
                let total: f64 = scores.iter().map(|s| s.exp()).sum();
                for (j, s) in scores.iter().enumerate() {
                    proba[[i, j]] = s.exp() / total;
                }
            }
            Ok(proba)
        }
    }

    #[test]
    fn explains_each_requested_label() -> Result<()> {
        let data = roster()?;
        let model = PositionClassifier {
            labels: vec!["QB".into(), "RB".into(), "WR".into()],
        };
        let config = LimeConfig {
            local_model: LocalModelKind::Logistic,
            ..gaussian(600)
        };
        let explainer = LimeExplainer::new(&data, Some(config))?;

        // Yds = 120 makes QB the most likely class, Att = 20 makes RB second.
        let top = explainer.explain_labels(&instance(), &model, &LabelSelection::Top(2))?;
        let labels: Vec<Option<&str>> = top.iter().map(|e| e.label.as_deref()).collect();
        assert_eq!(labels, vec![Some("QB"), Some("RB")]);
        assert!(top[0].weight_of("Yds").unwrap_or(0.0) > 0.0);
        assert!(top[1].weight_of("Att").unwrap_or(0.0) > 0.0);
        for explanation in &top {
            assert!((0.0..=1.0).contains(&explanation.local_prediction));
        }

        let err = explainer
            .explain_labels(&instance(), &model, &LabelSelection::Labels(vec!["K".into()]))
            .unwrap_err();
        assert!(matches!(err, ExplainError::InvalidInput { stage: Stage::Explanation, .. }));
        Ok(())
    }

    #[test]
    fn mismatched_instance_fails_in_explanation_stage() -> Result<()> {
        let data = roster()?;
        let explainer = LimeExplainer::new(&data, Some(gaussian(50)))?;
        let err = explainer
            .explain(&FeatureVector::new().with("Yds", 1.0), &linear_box)
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Explanation);
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() -> Result<()> {
        let data = roster()?;
        let config = LimeConfig {
            num_features: 0,
            ..LimeConfig::default()
        };
        assert!(matches!(LimeExplainer::new(&data, Some(config)), Err(ExplainError::Config(_))));
        Ok(())
    }
}
