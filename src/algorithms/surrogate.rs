// src/algorithms/surrogate.rs

use crate::algorithms::encoding::{EncodedFeature, FeatureEncoder};
use crate::algorithms::linear::{self, Family, LambdaSelection, PathOptions};
use crate::algorithms::region::Region;
use crate::core::{ExplainError, FeatureVector, Result, Stage};
use crate::traits::{predict_checked, PredictModel};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which interpretable model approximates the black box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurrogateKind {
    /// Elastic-net linear regression on the black-box score.
    Linear,
    /// Elastic-net logistic regression on a black-box probability.
    Logistic,
}

/// Configuration for the SurrogateFitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    pub kind: SurrogateKind,
    /// Elastic-net mix: 1.0 is the lasso, 0.0 is ridge.
    pub l1_ratio: f64,
    /// Number of lambdas on the log-spaced regularization path.
    pub n_lambda: usize,
    /// Smallest lambda as a fraction of the smallest lambda that zeroes every coefficient.
    pub lambda_min_ratio: f64,
    pub selection: LambdaSelection,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        SurrogateConfig {
            kind: SurrogateKind::Linear,
            l1_ratio: 0.5,
            n_lambda: 50,
            lambda_min_ratio: 1e-4,
            selection: LambdaSelection::Bic,
            max_iter: 1000,
            tol: 1e-7,
        }
    }
}

impl SurrogateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(ExplainError::Config(format!(
                "l1_ratio must lie in [0, 1], got {}",
                self.l1_ratio
            )));
        }
        if self.n_lambda == 0 {
            return Err(ExplainError::Config("n_lambda must be at least 1".to_string()));
        }
        if !(self.lambda_min_ratio > 0.0 && self.lambda_min_ratio < 1.0) {
            return Err(ExplainError::Config(format!(
                "lambda_min_ratio must lie in (0, 1), got {}",
                self.lambda_min_ratio
            )));
        }
        if let LambdaSelection::HoldOut { fraction } = self.selection {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(ExplainError::Config(format!(
                    "hold-out fraction must lie in (0, 1), got {}",
                    fraction
                )));
            }
        }
        if self.max_iter == 0 || !(self.tol > 0.0) {
            return Err(ExplainError::Config(
                "max_iter and tol must both be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn path_options(&self) -> PathOptions {
        PathOptions {
            family: match self.kind {
                SurrogateKind::Linear => Family::Gaussian,
                SurrogateKind::Logistic => Family::Binomial,
            },
            l1_ratio: self.l1_ratio,
            n_lambda: self.n_lambda,
            lambda_min_ratio: self.lambda_min_ratio,
            selection: self.selection,
            max_iter: self.max_iter,
            tol: self.tol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub feature: EncodedFeature,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub n_samples: usize,
    pub lambda: f64,
    pub lambdas_evaluated: usize,
    pub nonzero: usize,
    /// Weighted R² for linear surrogates, deviance explained for logistic ones.
    pub fit_quality: f64,
}

/// A local interpretable approximation of a black-box model over one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateModel {
    kind: SurrogateKind,
    intercept: f64,
    coefficients: Vec<Coefficient>,
    encoder: FeatureEncoder,
    diagnostics: Option<FitDiagnostics>,
}

impl SurrogateModel {
    /// Assembles a surrogate from known coefficients. `input_features` is the
    /// full feature set instances must carry.
    pub fn from_parts(
        kind: SurrogateKind,
        intercept: f64,
        coefficients: Vec<(EncodedFeature, f64)>,
        input_features: Vec<String>,
    ) -> Result<Self> {
        let columns = coefficients.iter().map(|(f, _)| f.clone()).collect();
        let encoder = FeatureEncoder::from_columns(input_features, columns)?;
        Ok(SurrogateModel {
            kind,
            intercept,
            coefficients: coefficients
                .into_iter()
                .map(|(feature, value)| Coefficient { feature, value })
                .collect(),
            encoder,
            diagnostics: None,
        })
    }

    pub fn kind(&self) -> SurrogateKind {
        self.kind
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    pub fn coefficient(&self, feature: &EncodedFeature) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| &c.feature == feature)
            .map(|c| c.value)
    }

    pub fn nonzero(&self) -> impl Iterator<Item = &Coefficient> {
        self.coefficients.iter().filter(|c| c.value != 0.0)
    }

    pub fn input_features(&self) -> &[String] {
        self.encoder.input_features()
    }

    pub fn excluded_features(&self) -> &[String] {
        self.encoder.excluded_features()
    }

    /// Features constant over the fitting region, absorbed by the intercept.
    pub fn constant_features(&self) -> &[String] {
        self.encoder.constant_features()
    }

    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        self.diagnostics.as_ref()
    }

    pub(crate) fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Intercept plus coefficient-weighted encoded values (the logit for logistic surrogates).
    pub fn linear_predictor(&self, instance: &FeatureVector) -> Result<f64> {
        let encoded = self.encoder.encode(instance, Stage::Contribution)?;
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(encoded.iter())
                .map(|(c, x)| c.value * x)
                .sum::<f64>())
    }

    /// The surrogate's own prediction on the response scale.
    pub fn predict(&self, instance: &FeatureVector) -> Result<f64> {
        let eta = self.linear_predictor(instance)?;
        Ok(match self.kind {
            SurrogateKind::Linear => eta,
            SurrogateKind::Logistic => linear::sigmoid(eta),
        })
    }
}

/// Fits surrogates against the black box's own predictions on a region.
#[derive(Debug, Clone, Default)]
pub struct SurrogateFitter {
    config: SurrogateConfig,
}

impl SurrogateFitter {
    pub fn new(config: Option<SurrogateConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(SurrogateFitter { config })
    }

    pub fn config(&self) -> &SurrogateConfig {
        &self.config
    }

    /// Fits one surrogate. `excluded` features (typically from a correlation
    /// report) are left out of the design.
    pub fn fit(
        &self,
        region: &Region<'_>,
        model: &dyn PredictModel,
        excluded: &BTreeSet<String>,
    ) -> Result<SurrogateModel> {
        let samples: Vec<&FeatureVector> =
            region.samples().iter().map(|s| s.features.as_ref()).collect();
        let weights = region.weights();
        let encoder = FeatureEncoder::fit(region.dataset().schema(), &samples, &weights, excluded)?;
        let x = encoder.encode_all(&samples, Stage::Fitting)?;
        let w = Array1::from(weights);

        if let Err(j) = linear::check_full_rank(&x, &w)? {
            return Err(ExplainError::singular(
                Stage::Fitting,
                format!(
                    "`{}` is linearly dependent on earlier columns over {} samples; \
                     lower the correlation threshold or exclude it",
                    encoder.columns()[j],
                    samples.len()
                ),
            ));
        }

        let y = predict_checked(model, &region.feature_vectors(), Stage::Fitting)?;
        let logistic = self.config.kind == SurrogateKind::Logistic;
        if logistic && y.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(ExplainError::invalid(
                Stage::Fitting,
                "logistic surrogates need black-box probabilities in [0, 1]",
            ));
        }

        let selection = linear::fit_path(&x, &y, &w, &self.config.path_options())?;
        let fit = selection.chosen.fit;
        let fit_quality = match self.config.kind {
            SurrogateKind::Linear => linear::weighted_r2(&fit, &x, &y, &w),
            SurrogateKind::Logistic => linear::deviance_explained(&fit, &x, &y, &w),
        };
        let diagnostics = FitDiagnostics {
            n_samples: samples.len(),
            lambda: selection.chosen.lambda,
            lambdas_evaluated: selection.n_evaluated,
            nonzero: selection.chosen.nonzero,
            fit_quality,
        };
        log::info!(
            "fitted {:?} surrogate on {} samples: lambda {:.3e}, {}/{} nonzero, fit quality {:.4}",
            self.config.kind,
            diagnostics.n_samples,
            diagnostics.lambda,
            diagnostics.nonzero,
            encoder.columns().len(),
            diagnostics.fit_quality
        );
        if !encoder.constant_features().is_empty() {
            log::debug!("region-constant features: {:?}", encoder.constant_features());
        }

        let coefficients = encoder
            .columns()
            .iter()
            .zip(fit.coefficients.iter())
            .map(|(feature, value)| Coefficient {
                feature: feature.clone(),
                value: *value,
            })
            .collect();

        Ok(SurrogateModel {
            kind: self.config.kind,
            intercept: fit.intercept,
            coefficients,
            encoder,
            diagnostics: Some(diagnostics),
        })
    }

    /// Fits independent surrogates for several regions in parallel.
    pub fn fit_regions(
        &self,
        regions: &[Region<'_>],
        model: &dyn PredictModel,
        excluded: &BTreeSet<String>,
    ) -> Vec<Result<SurrogateModel>> {
        regions
            .par_iter()
            .map(|region| self.fit(region, model, excluded))
            .collect()
    }
}
