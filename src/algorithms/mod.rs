pub mod contribution;
pub mod correlation;
pub mod encoding;
pub mod lime;
pub mod linear;
pub mod perturbation;
pub mod region;
pub mod surrogate;

pub use contribution::{ContributionEngine, ReasonCode, ReasonCodes, Sign};
pub use correlation::{
    CorrelatedPair, CorrelationConfig, CorrelationFilter, CorrelationReport, DropPolicy,
};
pub use encoding::{EncodedFeature, FeatureEncoder};
pub use lime::{
    Confidence, Explanation, LabelSelection, LimeConfig, LimeExplainer, LocalFeature,
    LocalModelKind,
};
pub use linear::LambdaSelection;
pub use perturbation::{
    FeatureStatistics, NumericSampling, PerturbationConfig, PerturbationSampler, PerturbedSample,
};
pub use region::{QuantileBasis, Region, RegionRule, RegionSample, RegionSelector, SampleSource};
pub use surrogate::{
    Coefficient, FitDiagnostics, SurrogateConfig, SurrogateFitter, SurrogateKind, SurrogateModel,
};
