// src/traits.rs

//! The black-box seam. The engine only ever calls `predict` on whole batches
//! and never holds on to a model between calls.

use crate::core::{ExplainError, FeatureVector, Result, Stage};
use ndarray::{Array1, Array2};

/// A trained predictor seen only through its input -> score function.
///
/// Implementations must return exactly one score per input vector, aligned
/// positionally with `batch`.
pub trait PredictModel: Sync {
    fn predict(&self, batch: &[FeatureVector]) -> Result<Array1<f64>>;
}

impl<F> PredictModel for F
where
    F: Fn(&[FeatureVector]) -> Result<Array1<f64>> + Sync,
{
    fn predict(&self, batch: &[FeatureVector]) -> Result<Array1<f64>> {
        self(batch)
    }
}

/// A classifier exposing per-class probabilities.
pub trait ProbabilisticModel: Sync {
    /// Class labels, in the column order of `predict_proba`.
    fn class_labels(&self) -> &[String];

    /// One row per input vector, one column per class.
    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Array2<f64>>;
}

/// Calls the model and checks that the output lines up with the batch.
pub(crate) fn predict_checked<M: PredictModel + ?Sized>(
    model: &M,
    batch: &[FeatureVector],
    stage: Stage,
) -> Result<Array1<f64>> {
    let scores = model.predict(batch).map_err(|e| e.at(stage))?;
    if scores.len() != batch.len() {
        return Err(ExplainError::ModelPrediction {
            stage,
            detail: format!(
                "model returned {} scores for a batch of {}",
                scores.len(),
                batch.len()
            ),
        });
    }
    if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
        return Err(ExplainError::ModelPrediction {
            stage,
            detail: format!("model returned a non-finite score at position {}", pos),
        });
    }
    Ok(scores)
}

pub(crate) fn predict_proba_checked<M: ProbabilisticModel + ?Sized>(
    model: &M,
    batch: &[FeatureVector],
    stage: Stage,
) -> Result<Array2<f64>> {
    let proba = model.predict_proba(batch).map_err(|e| e.at(stage))?;
    if proba.nrows() != batch.len() || proba.ncols() != model.class_labels().len() {
        return Err(ExplainError::ModelPrediction {
            stage,
            detail: format!(
                "model returned a {}x{} probability matrix for {} inputs and {} classes",
                proba.nrows(),
                proba.ncols(),
                batch.len(),
                model.class_labels().len()
            ),
        });
    }
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
        return Err(ExplainError::ModelPrediction {
            stage,
            detail: "class probabilities must lie in [0, 1]".to_string(),
        });
    }
    Ok(proba)
}
