// src/algorithms/encoding.rs

use crate::core::{
    ColumnKind, ExplainError, FeatureKind, FeatureValue, FeatureVector, Result, Schema, Stage,
};
use crate::utils;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One column of the linear design, keyed back to the feature it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EncodedFeature {
    Numeric { feature: String },
    /// Indicator for one categorical level (1 when present, 0 otherwise).
    Level { feature: String, level: String },
}

impl EncodedFeature {
    /// Name of the original, unexpanded feature.
    pub fn feature(&self) -> &str {
        match self {
            EncodedFeature::Numeric { feature } | EncodedFeature::Level { feature, .. } => {
                feature
            }
        }
    }

    /// Encoded value of this column for `instance`, or `None` if the feature
    /// is absent or of the other kind.
    pub fn encode(&self, instance: &FeatureVector) -> Option<f64> {
        match (self, instance.get(self.feature())?) {
            (EncodedFeature::Numeric { .. }, FeatureValue::Numeric(v)) => Some(*v),
            (EncodedFeature::Level { level, .. }, FeatureValue::Categorical(actual)) => {
                Some(if actual == level { 1.0 } else { 0.0 })
            }
            _ => None,
        }
    }
}

impl fmt::Display for EncodedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodedFeature::Numeric { feature } => f.write_str(feature),
            EncodedFeature::Level { feature, level } => write!(f, "{}={}", feature, level),
        }
    }
}

/// Treatment-coded one-hot design for a region.
///
/// The first observed level of each categorical is the reference level and
/// has no column. Features that are constant over the region carry no
/// information for a linear fit and are listed in `constant` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    input_features: Vec<String>,
    /// Kind of each input feature, `None` where a hand-built layout cannot tell.
    #[serde(default)]
    input_kinds: Vec<Option<FeatureKind>>,
    columns: Vec<EncodedFeature>,
    constant: Vec<String>,
    excluded: Vec<String>,
}

impl FeatureEncoder {
    /// Derives the design layout from the samples of a region.
    pub fn fit(
        schema: &Schema,
        samples: &[&FeatureVector],
        weights: &[f64],
        excluded: &BTreeSet<String>,
    ) -> Result<Self> {
        for name in excluded {
            if schema.column(name).is_none() {
                return Err(ExplainError::mismatch(
                    Stage::Fitting,
                    format!("excluded feature `{}` is not in the dataset", name),
                ));
            }
        }

        let mut columns = Vec::new();
        let mut constant = Vec::new();
        for column in schema.columns() {
            if excluded.contains(&column.name) {
                continue;
            }
            match &column.kind {
                ColumnKind::Numeric => {
                    let values: Vec<f64> = samples
                        .iter()
                        .map(|s| s.get(&column.name).and_then(FeatureValue::as_numeric))
                        .collect::<Option<_>>()
                        .ok_or_else(|| {
                            ExplainError::mismatch(
                                Stage::Fitting,
                                format!("sample lacks numeric feature `{}`", column.name),
                            )
                        })?;
                    let var = utils::weighted_variance(&values, weights).unwrap_or(0.0);
                    let mean = utils::weighted_mean(&values, weights).unwrap_or(0.0);
                    let tiny = mean.abs().max(1.0) * 1e-12;
                    if var <= tiny * tiny {
                        constant.push(column.name.clone());
                    } else {
                        columns.push(EncodedFeature::Numeric {
                            feature: column.name.clone(),
                        });
                    }
                }
                ColumnKind::Categorical(_) => {
                    let observed: BTreeSet<&str> = samples
                        .iter()
                        .zip(weights)
                        .filter(|(_, w)| **w > 0.0)
                        .filter_map(|(s, _)| {
                            s.get(&column.name).and_then(FeatureValue::as_level)
                        })
                        .collect();
                    if observed.len() < 2 {
                        constant.push(column.name.clone());
                        continue;
                    }
                    columns.extend(observed.into_iter().skip(1).map(|level| {
                        EncodedFeature::Level {
                            feature: column.name.clone(),
                            level: level.to_string(),
                        }
                    }));
                }
            }
        }

        let input_kinds = schema
            .columns()
            .iter()
            .map(|column| {
                Some(match column.kind {
                    ColumnKind::Numeric => FeatureKind::Numeric,
                    ColumnKind::Categorical(_) => FeatureKind::Categorical,
                })
            })
            .collect();
        Ok(FeatureEncoder {
            input_features: schema.names(),
            input_kinds,
            columns,
            constant,
            excluded: excluded.iter().cloned().collect(),
        })
    }

    /// Rebuilds a design layout from explicit columns, e.g. for a surrogate
    /// assembled outside the fitter.
    /// Kinds are taken from the columns; features without a column have no
    /// known kind.
    pub fn from_columns(
        input_features: Vec<String>,
        columns: Vec<EncodedFeature>,
    ) -> Result<Self> {
        let unknown = columns
            .iter()
            .find(|c| !input_features.iter().any(|f| f == c.feature()));
        if let Some(col) = unknown {
            return Err(ExplainError::mismatch(
                Stage::Fitting,
                format!("column `{}` refers to an unknown feature", col),
            ));
        }
        let mut input_kinds = Vec::with_capacity(input_features.len());
        for feature in &input_features {
            let mut kinds = columns
                .iter()
                .filter(|c| c.feature() == feature)
                .map(|c| match c {
                    EncodedFeature::Numeric { .. } => FeatureKind::Numeric,
                    EncodedFeature::Level { .. } => FeatureKind::Categorical,
                });
            let kind = kinds.next();
            if kind.is_some() && kinds.any(|k| Some(k) != kind) {
                return Err(ExplainError::mismatch(
                    Stage::Fitting,
                    format!("`{}` is encoded both as numeric and as levels", feature),
                ));
            }
            input_kinds.push(kind);
        }
        let used: BTreeSet<&str> = columns.iter().map(EncodedFeature::feature).collect();
        let constant = input_features
            .iter()
            .filter(|f| !used.contains(f.as_str()))
            .cloned()
            .collect();
        Ok(FeatureEncoder {
            input_features,
            input_kinds,
            columns,
            constant,
            excluded: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[EncodedFeature] {
        &self.columns
    }

    pub fn input_features(&self) -> &[String] {
        &self.input_features
    }

    pub fn constant_features(&self) -> &[String] {
        &self.constant
    }

    pub fn excluded_features(&self) -> &[String] {
        &self.excluded
    }

    /// Checks that `instance` carries exactly the features the design was
    /// built from, each of the fitted kind, with finite numeric values.
    ///
    /// Region-constant and excluded features are checked too, although they
    /// have no column.
    pub fn check(&self, instance: &FeatureVector, stage: Stage) -> Result<()> {
        if !instance.same_features(&self.input_features) {
            let expected: BTreeSet<&str> =
                self.input_features.iter().map(String::as_str).collect();
            let found: BTreeSet<&str> = instance.names().collect();
            let missing: Vec<&str> = expected.difference(&found).copied().collect();
            let extra: Vec<&str> = found.difference(&expected).copied().collect();
            return Err(ExplainError::mismatch(
                stage,
                format!("missing features {:?}, unexpected features {:?}", missing, extra),
            ));
        }
        for (name, kind) in self.input_features.iter().zip(&self.input_kinds) {
            let value = match instance.get(name) {
                Some(value) => value,
                None => continue,
            };
            if let Some(kind) = kind {
                if value.kind() != *kind {
                    return Err(ExplainError::mismatch(
                        stage,
                        format!("feature `{}` has the wrong kind ({})", name, value),
                    ));
                }
            }
            if let FeatureValue::Numeric(v) = value {
                if !v.is_finite() {
                    return Err(ExplainError::invalid(
                        stage,
                        format!("feature `{}` is not finite ({})", name, v),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn encode(&self, instance: &FeatureVector, stage: Stage) -> Result<Array1<f64>> {
        self.check(instance, stage)?;
        self.columns
            .iter()
            .map(|col| {
                col.encode(instance).ok_or_else(|| {
                    ExplainError::mismatch(
                        stage,
                        format!("feature `{}` has the wrong kind", col.feature()),
                    )
                })
            })
            .collect()
    }

    pub fn encode_all(&self, samples: &[&FeatureVector], stage: Stage) -> Result<Array2<f64>> {
        let mut flat = Vec::with_capacity(samples.len() * self.columns.len());
        for sample in samples {
            flat.extend(self.encode(sample, stage)?.iter().copied());
        }
        Array2::from_shape_vec((samples.len(), self.columns.len()), flat)
            .map_err(|e| ExplainError::from(e).at(stage))
    }
}
