// src/core/errors.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Configuration,
    Selection,
    Filtering,
    Fitting,
    Contribution,
    Explanation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Selection => "selection",
            Stage::Filtering => "filtering",
            Stage::Fitting => "fitting",
            Stage::Contribution => "contribution",
            Stage::Explanation => "explanation",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ExplainError {
    /// The selection rule matched no records.
    #[error("[selection] region rule `{rule}` matched no records")]
    EmptyRegion { rule: String },

    /// The design matrix is rank-deficient after encoding and exclusions.
    #[error("[{stage}] design matrix is singular: {detail}")]
    SingularFit { stage: Stage, detail: String },

    /// An instance or record does not carry the expected feature set.
    #[error("[{stage}] feature mismatch: {detail}")]
    FeatureMismatch { stage: Stage, detail: String },

    #[error("[{stage}] invalid input: {detail}")]
    InvalidInput { stage: Stage, detail: String },

    /// The black-box model failed or returned a malformed batch.
    #[error("[{stage}] model prediction failed: {detail}")]
    ModelPrediction { stage: Stage, detail: String },

    #[error("[configuration] {0}")]
    Config(String),

    #[error("[{stage}] ndarray shape error: {source}")]
    Shape {
        stage: Stage,
        #[source]
        source: ndarray::ShapeError,
    },
}

impl ExplainError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            ExplainError::EmptyRegion { .. } => Stage::Selection,
            ExplainError::Config(_) => Stage::Configuration,
            ExplainError::SingularFit { stage, .. }
            | ExplainError::FeatureMismatch { stage, .. }
            | ExplainError::InvalidInput { stage, .. }
            | ExplainError::ModelPrediction { stage, .. }
            | ExplainError::Shape { stage, .. } => *stage,
        }
    }

    pub fn invalid(stage: Stage, detail: impl Into<String>) -> Self {
        ExplainError::InvalidInput {
            stage,
            detail: detail.into(),
        }
    }

    pub fn mismatch(stage: Stage, detail: impl Into<String>) -> Self {
        ExplainError::FeatureMismatch {
            stage,
            detail: detail.into(),
        }
    }

    pub fn singular(stage: Stage, detail: impl Into<String>) -> Self {
        ExplainError::SingularFit {
            stage,
            detail: detail.into(),
        }
    }

    /// Re-tags a stage-carrying error with the stage of the caller.
    pub(crate) fn at(self, new_stage: Stage) -> Self {
        match self {
            ExplainError::SingularFit { detail, .. } => ExplainError::SingularFit {
                stage: new_stage,
                detail,
            },
            ExplainError::FeatureMismatch { detail, .. } => ExplainError::FeatureMismatch {
                stage: new_stage,
                detail,
            },
            ExplainError::InvalidInput { detail, .. } => ExplainError::InvalidInput {
                stage: new_stage,
                detail,
            },
            ExplainError::ModelPrediction { detail, .. } => ExplainError::ModelPrediction {
                stage: new_stage,
                detail,
            },
            ExplainError::Shape { source, .. } => ExplainError::Shape {
                stage: new_stage,
                source,
            },
            other => other,
        }
    }
}

// Shape errors only arise while assembling design matrices.
impl From<ndarray::ShapeError> for ExplainError {
    fn from(err: ndarray::ShapeError) -> Self {
        ExplainError::Shape {
            stage: Stage::Fitting,
            source: err,
        }
    }
}

// Convenience type alias for Result
pub type Result<T> = std::result::Result<T, ExplainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_their_stage() {
        let err = ExplainError::EmptyRegion {
            rule: "Pos == XX".to_string(),
        };
        assert_eq!(err.stage(), Stage::Selection);
        assert!(err.to_string().starts_with("[selection]"));

        let err = ExplainError::singular(Stage::Fitting, "x1 is collinear");
        assert_eq!(err.stage(), Stage::Fitting);
        assert_eq!(err.at(Stage::Explanation).stage(), Stage::Explanation);

        let err = ExplainError::Config("threshold out of range".into());
        assert!(err.to_string().contains("threshold"));
        assert_eq!(err.stage(), Stage::Configuration);
    }
}
