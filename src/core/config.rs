// src/core/config.rs

use crate::algorithms::correlation::CorrelationConfig;
use crate::algorithms::lime::LimeConfig;
use crate::algorithms::perturbation::PerturbationConfig;
use crate::algorithms::surrogate::SurrogateConfig;
use crate::core::errors::{ExplainError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the whole engine. Every section is optional in TOML and
/// falls back to its defaults.
///
/// ```toml
/// fallback_thresholds = [0.7, 0.6]
///
/// [correlation]
/// threshold = 0.8
/// policy = { Prefer = ["Pass_Yds"] }
///
/// [surrogate]
/// kind = "Linear"
/// l1_ratio = 0.5
/// selection = "Bic"
///
/// [lime]
/// num_features = 5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lower correlation thresholds retried, in order, when a fit is singular.
    pub fallback_thresholds: Vec<f64>,
    pub correlation: CorrelationConfig,
    /// Sampling used by `RegionRule::Perturbation` regions.
    pub perturbation: PerturbationConfig,
    pub surrogate: SurrogateConfig,
    pub lime: LimeConfig,
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(input)
            .map_err(|e| ExplainError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ExplainError::Config(format!("cannot serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.correlation.validate()?;
        self.perturbation.validate()?;
        self.surrogate.validate()?;
        self.lime.validate()?;

        let mut previous = self.correlation.threshold;
        for threshold in &self.fallback_thresholds {
            if !(0.0..previous).contains(threshold) {
                return Err(ExplainError::Config(format!(
                    "fallback thresholds must decrease from the correlation threshold {} \
                     towards 0, got {:?}",
                    self.correlation.threshold, self.fallback_thresholds
                )));
            }
            previous = *threshold;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::correlation::DropPolicy;
    use crate::algorithms::linear::LambdaSelection;
    use crate::algorithms::surrogate::SurrogateKind;

    #[test]
    fn empty_toml_gives_defaults() -> Result<()> {
        assert_eq!(EngineConfig::from_toml_str("")?, EngineConfig::default());
        Ok(())
    }

    #[test]
    fn sections_override_defaults() -> Result<()> {
        let config = EngineConfig::from_toml_str(
            r#"
            fallback_thresholds = [0.7, 0.5]

            [correlation]
            threshold = 0.9
            policy = { Prefer = ["Pass_Yds"] }

            [surrogate]
            kind = "Logistic"
            selection = { HoldOut = { fraction = 0.25 } }

            [lime]
            num_features = 4

            [lime.sampling]
            n_samples = 300
            seed = 42
            "#,
        )?;
        assert_eq!(config.correlation.threshold, 0.9);
        assert_eq!(config.correlation.policy, DropPolicy::Prefer(vec!["Pass_Yds".into()]));
        assert_eq!(config.surrogate.kind, SurrogateKind::Logistic);
        assert_eq!(config.surrogate.selection, LambdaSelection::HoldOut { fraction: 0.25 });
        assert_eq!(config.surrogate.l1_ratio, 0.5);
        assert_eq!(config.lime.num_features, 4);
        assert_eq!(config.lime.sampling.n_samples, 300);
        assert_eq!(config.lime.sampling.seed, 42);
        assert_eq!(config.fallback_thresholds, vec![0.7, 0.5]);
        Ok(())
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let cases = [
            "[correlation]\nthreshold = 1.5",
            "[surrogate]\nl1_ratio = -0.1",
            "[lime]\nmin_score = 2.0",
            "fallback_thresholds = [0.9]",
            "fallback_thresholds = [0.6, 0.7]",
            "[perturbation]\nn_samples = 0",
            "correlation = 3",
        ];
        for case in cases {
            assert!(
                matches!(EngineConfig::from_toml_str(case), Err(ExplainError::Config(_))),
                "accepted {:?}",
                case
            );
        }
    }

    #[test]
    fn config_survives_toml() -> Result<()> {
        let mut config = EngineConfig::default();
        config.fallback_thresholds = vec![0.6];
        config.correlation.policy = DropPolicy::Explicit(vec!["Rush_TD".into()]);
        let text = config.to_toml_string()?;
        assert_eq!(EngineConfig::from_toml_str(&text)?, config);
        Ok(())
    }
}
