// src/pipeline.rs

//! Region → correlation report → surrogate → reason codes, wired together.

use crate::algorithms::contribution::{ContributionEngine, ReasonCodes};
use crate::algorithms::correlation::{CorrelationFilter, CorrelationReport};
use crate::algorithms::lime::LimeExplainer;
use crate::algorithms::region::{RegionRule, RegionSelector};
use crate::algorithms::surrogate::{SurrogateFitter, SurrogateModel};
use crate::core::{Dataset, EngineConfig, ExplainError, FeatureVector, Result};
use crate::traits::PredictModel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything learned about one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionAnalysis {
    pub rule: RegionRule,
    pub region_size: usize,
    /// Report at the threshold that produced `model`.
    pub report: CorrelationReport,
    pub excluded: BTreeSet<String>,
    pub model: SurrogateModel,
}

impl RegionAnalysis {
    /// Correlation threshold the surrogate was finally fitted at.
    pub fn threshold(&self) -> f64 {
        self.report.threshold
    }
}

#[derive(Debug, Clone)]
pub struct SurrogatePipeline {
    config: EngineConfig,
    filter: CorrelationFilter,
    fitter: SurrogateFitter,
    contributions: ContributionEngine,
}

impl SurrogatePipeline {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(SurrogatePipeline {
            filter: CorrelationFilter::new(Some(config.correlation.clone()))?,
            fitter: SurrogateFitter::new(Some(config.surrogate.clone()))?,
            contributions: ContributionEngine::new(),
            config,
        })
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Self::new(EngineConfig::from_toml_str(input)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Selects the region, resolves collinear features and fits a surrogate.
    ///
    /// A singular fit is retried at each `fallback_thresholds` entry in turn;
    /// the last `SingularFit` is returned when they run out.
    pub fn analyze(
        &self,
        dataset: &Dataset,
        model: &dyn PredictModel,
        rule: &RegionRule,
    ) -> Result<RegionAnalysis> {
        let selector = RegionSelector::new(dataset, Some(self.config.perturbation.clone()))?;
        let region = selector.select_with_model(rule, model)?;
        let order = dataset.schema().names();

        let mut threshold = self.config.correlation.threshold;
        let mut fallbacks = self.config.fallback_thresholds.iter();
        loop {
            let report = self.filter.report_at(&region, threshold)?;
            let excluded = report.exclusions(&self.config.correlation.policy, &order)?;
            match self.fitter.fit(&region, model, &excluded) {
                Ok(surrogate) => {
                    log::info!(
                        "region `{}`: {} samples, {} correlated pairs at |r| > {}, excluded {:?}",
                        rule,
                        region.len(),
                        report.pairs.len(),
                        threshold,
                        excluded
                    );
                    return Ok(RegionAnalysis {
                        rule: rule.clone(),
                        region_size: region.len(),
                        report,
                        excluded,
                        model: surrogate,
                    });
                }
                Err(err @ ExplainError::SingularFit { .. }) => match fallbacks.next() {
                    Some(next) => {
                        log::warn!("{}; retrying with correlation threshold {}", err, next);
                        threshold = *next;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Analyzes several regions in parallel, in input order.
    pub fn analyze_many(
        &self,
        dataset: &Dataset,
        model: &dyn PredictModel,
        rules: &[RegionRule],
    ) -> Vec<Result<RegionAnalysis>> {
        rules
            .par_iter()
            .map(|rule| self.analyze(dataset, model, rule))
            .collect()
    }

    pub fn reason_codes(
        &self,
        analysis: &RegionAnalysis,
        instance: &FeatureVector,
    ) -> Result<ReasonCodes> {
        self.contributions.reason_codes(&analysis.model, instance)
    }

    /// A LIME explainer over `dataset` using the `[lime]` configuration.
    pub fn explainer(&self, dataset: &Dataset) -> Result<LimeExplainer> {
        LimeExplainer::new(dataset, Some(self.config.lime.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::encoding::EncodedFeature;
    use crate::core::{FeatureValue, Record, Stage, Target};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    // `c = a + b` with `a` and `b` uncorrelated: every pair sits at |r| <= 1/sqrt(2)
    // yet the three columns are collinear.
    fn hidden_collinearity() -> Result<Dataset> {
        let records = (0..100)
            .map(|i| {
                let a = (i % 10) as f64;
                let b = (i / 10) as f64;
                Record::new(
                    FeatureVector::new()
                        .with("Team", "A")
                        .with("a", a)
                        .with("b", b)
                        .with("c", a + b),
                    Target::Continuous(a),
                )
            })
            .collect();
        Dataset::new(records)
    }

    fn model(batch: &[FeatureVector]) -> Result<Array1<f64>> {
        let num = |v: &FeatureVector, name: &str| {
            v.get(name).and_then(FeatureValue::as_numeric).unwrap_or(0.0)
        };
        Ok(batch.iter().map(|v| 2.0 * num(v, "a") + 3.0 * num(v, "b")).collect())
    }

    #[test]
    fn singular_fit_without_fallback_is_reported() -> Result<()> {
        let data = hidden_collinearity()?;
        let pipeline = SurrogatePipeline::new(EngineConfig::default())?;
        let err = pipeline
            .analyze(&data, &model, &RegionRule::equals("Team", "A"))
            .unwrap_err();
        assert!(matches!(err, ExplainError::SingularFit { stage: Stage::Fitting, .. }));
        Ok(())
    }

    #[test]
    fn fallback_threshold_resolves_hidden_collinearity() -> Result<()> {
        let data = hidden_collinearity()?;
        let config = EngineConfig {
            fallback_thresholds: vec![0.6],
            ..EngineConfig::default()
        };
        let pipeline = SurrogatePipeline::new(config)?;
        let analysis = pipeline.analyze(&data, &model, &RegionRule::equals("Team", "A"))?;

        assert_eq!(analysis.threshold(), 0.6);
        assert_eq!(analysis.region_size, 100);
        assert_eq!(analysis.excluded.iter().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(analysis.model.constant_features(), &["Team".to_string()]);
        let a = analysis.model.coefficient(&EncodedFeature::Numeric { feature: "a".into() });
        assert_abs_diff_eq!(a.unwrap_or(0.0), 2.0, epsilon = 1e-6);

        let instance = data.records()[37].features.clone();
        let codes = pipeline.reason_codes(&analysis, &instance)?;
        assert_abs_diff_eq!(codes.reconstructed(), 2.0 * 7.0 + 3.0 * 3.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn unknown_explicit_drop_fails_in_filtering() -> Result<()> {
        let data = hidden_collinearity()?;
        let pipeline = SurrogatePipeline::from_toml_str(
            r#"
            [correlation]
            policy = { Explicit = ["c", "d"] }
            "#,
        )?;
        let err = pipeline
            .analyze(&data, &model, &RegionRule::equals("Team", "A"))
            .unwrap_err();
        assert!(matches!(err, ExplainError::FeatureMismatch { stage: Stage::Filtering, .. }));
        Ok(())
    }
}
