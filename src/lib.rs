// src/lib.rs

//! `surrogate_rs` explains opaque predictive models locally.
//!
//! Given a black box (anything implementing [`PredictModel`]) and a region of
//! feature space, it fits an interpretable elastic-net surrogate to the black
//! box's own predictions and decomposes surrogate predictions into signed
//! per-feature reason codes. [`LimeExplainer`] explains single instances by
//! sampling around them instead.
//!
//! ```no_run
//! use ndarray::Array1;
//! use surrogate_rs::{Dataset, FeatureVector, RegionRule, Result, SurrogatePipeline};
//!
//! fn run(dataset: &Dataset, instance: &FeatureVector) -> Result<()> {
//!     let model = |batch: &[FeatureVector]| -> Result<Array1<f64>> {
//!         Ok(batch.iter().map(|_| 1.0).collect())
//!     };
//!     let pipeline = SurrogatePipeline::from_toml_str("[correlation]\nthreshold = 0.8")?;
//!     let analysis = pipeline.analyze(dataset, &model, &RegionRule::equals("Pos", "QB"))?;
//!     for code in pipeline.reason_codes(&analysis, instance)?.top(3) {
//!         println!("{}", code);
//!     }
//!     Ok(())
//! }
//! ```

// Declare the main modules of the crate
pub mod algorithms;
pub mod core;
pub mod pipeline;
pub mod traits;
pub mod utils;

// Re-export key components for easier use by library consumers
pub use crate::algorithms::{
    ContributionEngine, CorrelationFilter, CorrelationReport, DropPolicy, EncodedFeature,
    Explanation, LabelSelection, LimeConfig, LimeExplainer, ReasonCode, ReasonCodes, Region,
    RegionRule, RegionSelector, SurrogateConfig, SurrogateFitter, SurrogateKind, SurrogateModel,
};
pub use crate::core::{
    Dataset, EngineConfig, ExplainError, FeatureValue, FeatureVector, Record, Result, Stage, Target,
};
pub use crate::pipeline::{RegionAnalysis, SurrogatePipeline};
pub use crate::traits::{PredictModel, ProbabilisticModel};
