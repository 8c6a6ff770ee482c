// src/algorithms/contribution.rs

use crate::algorithms::encoding::EncodedFeature;
use crate::algorithms::surrogate::SurrogateModel;
use crate::core::{ExplainError, FeatureValue, FeatureVector, Result, Stage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    fn of(value: f64) -> Self {
        if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

/// One feature's signed contribution to one instance's surrogate prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonCode {
    pub feature: EncodedFeature,
    /// The instance's raw value of the underlying feature.
    pub value: FeatureValue,
    pub coefficient: f64,
    /// `coefficient * encoded value`.
    pub strength: f64,
    pub sign: Sign,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}: {:+.4} ({:.4} x coefficient)",
            self.feature, self.value, self.strength, self.coefficient
        )
    }
}

/// Reason codes for one instance, ranked by descending absolute strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonCodes {
    pub intercept: f64,
    pub codes: Vec<ReasonCode>,
}

impl ReasonCodes {
    /// `intercept + sum(strength)`, i.e. the surrogate's linear predictor.
    pub fn reconstructed(&self) -> f64 {
        self.intercept + self.codes.iter().map(|c| c.strength).sum::<f64>()
    }

    pub fn top(&self, k: usize) -> &[ReasonCode] {
        &self.codes[..k.min(self.codes.len())]
    }

    pub fn positive(&self) -> impl Iterator<Item = &ReasonCode> {
        self.codes.iter().filter(|c| c.sign == Sign::Positive)
    }

    pub fn negative(&self) -> impl Iterator<Item = &ReasonCode> {
        self.codes.iter().filter(|c| c.sign == Sign::Negative)
    }

    pub fn get(&self, feature: &EncodedFeature) -> Option<&ReasonCode> {
        self.codes.iter().find(|c| &c.feature == feature)
    }
}

/// Decomposes surrogate predictions into per-feature reason codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContributionEngine;

impl ContributionEngine {
    pub fn new() -> Self {
        ContributionEngine
    }

    /// Every input feature of `instance` is validated, including features
    /// that ended up without a coefficient.
    pub fn reason_codes(
        &self,
        model: &SurrogateModel,
        instance: &FeatureVector,
    ) -> Result<ReasonCodes> {
        let encoded = model.encoder().encode(instance, Stage::Contribution)?;

        let mut codes = Vec::new();
        for (coefficient, x) in model.coefficients().iter().zip(encoded.iter()) {
            let strength = coefficient.value * x;
            // Zero coefficients, inactive levels and zero values carry no reason.
            if strength == 0.0 {
                continue;
            }
            let value = instance
                .get(coefficient.feature.feature())
                .cloned()
                .ok_or_else(|| {
                    ExplainError::mismatch(
                        Stage::Contribution,
                        format!("instance lacks `{}`", coefficient.feature.feature()),
                    )
                })?;
            codes.push(ReasonCode {
                feature: coefficient.feature.clone(),
                value,
                coefficient: coefficient.value,
                strength,
                sign: Sign::of(strength),
            });
        }

        codes.sort_by(|a, b| {
            b.strength
                .abs()
                .partial_cmp(&a.strength.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ReasonCodes {
            intercept: model.intercept(),
            codes,
        })
    }

    /// Reason codes for many instances against one surrogate, in input order.
    pub fn reason_codes_batch(
        &self,
        model: &SurrogateModel,
        instances: &[FeatureVector],
    ) -> Vec<Result<ReasonCodes>> {
        instances
            .par_iter()
            .map(|instance| self.reason_codes(model, instance))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::surrogate::SurrogateKind;
    use approx::assert_abs_diff_eq;

    fn names() -> Vec<String> {
        vec!["Def_Int".into(), "Pass_Yds".into(), "College".into()]
    }

    fn model() -> Result<SurrogateModel> {
        SurrogateModel::from_parts(
            SurrogateKind::Linear,
            -3.0,
            vec![
                (EncodedFeature::Numeric { feature: "Def_Int".into() }, 1.7),
                (EncodedFeature::Numeric { feature: "Pass_Yds".into() }, -0.002),
                (
                    EncodedFeature::Level {
                        feature: "College".into(),
                        level: "Alabama".into(),
                    },
                    0.9,
                ),
                (
                    EncodedFeature::Level {
                        feature: "College".into(),
                        level: "Ohio State".into(),
                    },
                    -1.1,
                ),
            ],
            names(),
        )
    }

    fn player(college: &str) -> FeatureVector {
        FeatureVector::new()
            .with("Def_Int", 10.0)
            .with("Pass_Yds", 250.0)
            .with("College", college)
    }

    #[test]
    fn strength_is_coefficient_times_value() -> Result<()> {
        let codes = ContributionEngine::new().reason_codes(&model()?, &player("Alabama"))?;
        let def_int = codes
            .get(&EncodedFeature::Numeric { feature: "Def_Int".into() })
            .cloned();
        let def_int = def_int
            .ok_or_else(|| ExplainError::invalid(Stage::Contribution, "missing Def_Int"))?;
        assert_abs_diff_eq!(def_int.strength, 17.0, epsilon = 1e-12);
        assert_eq!(def_int.sign, Sign::Positive);
        assert_eq!(def_int.value, FeatureValue::Numeric(10.0));
        // Ranked by absolute strength.
        assert_eq!(codes.codes[0].feature.feature(), "Def_Int");
        Ok(())
    }

    #[test]
    fn only_the_active_level_contributes() -> Result<()> {
        let codes = ContributionEngine::new().reason_codes(&model()?, &player("Ohio State"))?;
        let colleges: Vec<&ReasonCode> =
            codes.codes.iter().filter(|c| c.feature.feature() == "College").collect();
        assert_eq!(colleges.len(), 1);
        assert_eq!(colleges[0].sign, Sign::Negative);
        assert_abs_diff_eq!(colleges[0].strength, -1.1, epsilon = 1e-12);

        // A reference-level instance has no categorical reason at all.
        let codes = ContributionEngine::new().reason_codes(&model()?, &player("Clemson"))?;
        assert!(codes.codes.iter().all(|c| c.feature.feature() != "College"));
        Ok(())
    }

    #[test]
    fn reason_codes_reconstruct_the_surrogate_prediction() -> Result<()> {
        let model = model()?;
        for college in ["Alabama", "Ohio State", "Clemson"] {
            let instance = player(college);
            let codes = ContributionEngine::new().reason_codes(&model, &instance)?;
            assert_abs_diff_eq!(codes.reconstructed(), model.predict(&instance)?, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn out_of_range_values_extrapolate() -> Result<()> {
        let instance = player("Alabama").with("Def_Int", 1000.0);
        let codes = ContributionEngine::new().reason_codes(&model()?, &instance)?;
        assert_abs_diff_eq!(codes.codes[0].strength, 1700.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn mismatched_instance_is_rejected() -> Result<()> {
        let instance = FeatureVector::new().with("Def_Int", 1.0).with("Pass_Yds", 2.0);
        let err = ContributionEngine::new().reason_codes(&model()?, &instance).unwrap_err();
        assert!(matches!(err, ExplainError::FeatureMismatch { stage: Stage::Contribution, .. }));

        let extra = player("Alabama").with("Rush_Yds", 3.0);
        assert!(ContributionEngine::new().reason_codes(&model()?, &extra).is_err());
        Ok(())
    }

    #[test]
    fn malformed_values_are_rejected() -> Result<()> {
        let engine = ContributionEngine::new();
        let model = model()?;

        let numeric_college = player("Alabama").with("College", 3.0);
        let err = engine.reason_codes(&model, &numeric_college).unwrap_err();
        assert!(matches!(err, ExplainError::FeatureMismatch { stage: Stage::Contribution, .. }));

        // A NaN times a zero coefficient would otherwise vanish silently.
        let zero_weight = SurrogateModel::from_parts(
            SurrogateKind::Linear,
            0.0,
            vec![(EncodedFeature::Numeric { feature: "Def_Int".into() }, 0.0)],
            vec!["Def_Int".into()],
        )?;
        let nan = FeatureVector::new().with("Def_Int", f64::NAN);
        let err = engine.reason_codes(&zero_weight, &nan).unwrap_err();
        assert!(matches!(err, ExplainError::InvalidInput { stage: Stage::Contribution, .. }));

        let infinite = player("Clemson").with("Pass_Yds", f64::NEG_INFINITY);
        assert!(engine.reason_codes(&model, &infinite).is_err());
        Ok(())
    }

    #[test]
    fn batch_keeps_input_order() -> Result<()> {
        let model = model()?;
        let instances = vec![player("Alabama"), FeatureVector::new(), player("Ohio State")];
        let results = ContributionEngine::new().reason_codes_batch(&model, &instances);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        let third = results[2].as_ref().map(|c| c.codes.len()).unwrap_or(0);
        assert_eq!(third, 3);
        Ok(())
    }

    #[test]
    fn reason_codes_serialize() -> Result<()> {
        let codes = ContributionEngine::new().reason_codes(&model()?, &player("Alabama"))?;
        let json = serde_json::to_string(&codes)
            .map_err(|e| ExplainError::invalid(Stage::Contribution, e.to_string()))?;
        assert!(json.contains("Def_Int"));
        let back: ReasonCodes = serde_json::from_str(&json)
            .map_err(|e| ExplainError::invalid(Stage::Contribution, e.to_string()))?;
        assert_eq!(back, codes);
        Ok(())
    }
}
