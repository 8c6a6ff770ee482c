// src/core/data.rs
use crate::core::errors::{ExplainError, Result, Stage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single feature value: numeric, or one label out of a finite set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl FeatureValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FeatureValue::Numeric(v) => Some(*v),
            FeatureValue::Categorical(_) => None,
        }
    }

    pub fn as_level(&self) -> Option<&str> {
        match self {
            FeatureValue::Numeric(_) => None,
            FeatureValue::Categorical(level) => Some(level),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Numeric(_) => FeatureKind::Numeric,
            FeatureValue::Categorical(_) => FeatureKind::Categorical,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(v) => write!(f, "{}", v),
            FeatureValue::Categorical(level) => write!(f, "'{}'", level),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Numeric(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(level: &str) -> Self {
        FeatureValue::Categorical(level.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(level: String) -> Self {
        FeatureValue::Categorical(level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// An ordered mapping from feature name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. A repeated name overwrites the earlier value in place.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when both vectors carry exactly the same feature names, in any order.
    pub fn same_features(&self, names: &[String]) -> bool {
        self.len() == names.len() && names.iter().all(|n| self.get(n).is_some())
    }
}

impl<N: Into<String>, V: Into<FeatureValue>> FromIterator<(N, V)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        for (name, value) in iter {
            vector.set(name, value);
        }
        vector
    }
}

/// The supervised target attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Continuous(f64),
    Label(String),
}

impl Target {
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Target::Continuous(v) => Some(*v),
            Target::Label(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub features: FeatureVector,
    pub target: Target,
}

impl Record {
    pub fn new(features: FeatureVector, target: Target) -> Self {
        Self { features, target }
    }
}

/// Kind of a schema column, with the observed levels for categoricals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    /// Levels sorted lexicographically.
    Categorical(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ColumnKind::Numeric)
    }
}

/// Feature layout shared by every record of a dataset, in first-record order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn numeric_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Checks that `vector` carries exactly this schema's features with matching kinds.
    pub fn check(&self, vector: &FeatureVector, stage: Stage) -> Result<()> {
        if vector.len() != self.columns.len() {
            return Err(ExplainError::mismatch(
                stage,
                format!(
                    "expected {} features, found {}",
                    self.columns.len(),
                    vector.len()
                ),
            ));
        }
        for column in &self.columns {
            let value = vector.get(&column.name).ok_or_else(|| {
                ExplainError::mismatch(stage, format!("missing feature `{}`", column.name))
            })?;
            let kind_matches = matches!(
                (&column.kind, value),
                (ColumnKind::Numeric, FeatureValue::Numeric(_))
                    | (ColumnKind::Categorical(_), FeatureValue::Categorical(_))
            );
            if !kind_matches {
                return Err(ExplainError::mismatch(
                    stage,
                    format!("feature `{}` has the wrong kind ({})", column.name, value),
                ));
            }
        }
        Ok(())
    }
}

/// An immutable, validated sequence of labelled feature vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Result<Self> {
        let first = records.first().ok_or_else(|| {
            ExplainError::invalid(Stage::Selection, "dataset must contain at least one record")
        })?;

        let mut kinds: Vec<(String, FeatureKind)> = Vec::with_capacity(first.features.len());
        let mut levels: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, value) in first.features.iter() {
            kinds.push((name.to_string(), value.kind()));
        }
        let names: Vec<String> = kinds.iter().map(|(n, _)| n.clone()).collect();

        for (idx, record) in records.iter().enumerate() {
            if !record.features.same_features(&names) {
                return Err(ExplainError::mismatch(
                    Stage::Selection,
                    format!("record {} does not carry the dataset's feature set", idx),
                ));
            }
            for (name, kind) in &kinds {
                // Presence was checked above.
                let value = match record.features.get(name) {
                    Some(v) => v,
                    None => continue,
                };
                match (kind, value) {
                    (FeatureKind::Numeric, FeatureValue::Numeric(v)) => {
                        if !v.is_finite() {
                            return Err(ExplainError::invalid(
                                Stage::Selection,
                                format!("record {} has a non-finite value for `{}`", idx, name),
                            ));
                        }
                    }
                    (FeatureKind::Categorical, FeatureValue::Categorical(level)) => {
                        levels.entry(name.clone()).or_default().insert(level.clone());
                    }
                    _ => {
                        return Err(ExplainError::mismatch(
                            Stage::Selection,
                            format!("record {} changes the kind of feature `{}`", idx, name),
                        ));
                    }
                }
            }
        }

        let columns = kinds
            .into_iter()
            .map(|(name, kind)| {
                let kind = match kind {
                    FeatureKind::Numeric => ColumnKind::Numeric,
                    FeatureKind::Categorical => ColumnKind::Categorical(
                        levels.remove(&name).unwrap_or_default().into_iter().collect(),
                    ),
                };
                Column { name, kind }
            })
            .collect();

        Ok(Dataset {
            schema: Schema { columns },
            records,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        if !self.schema.column(name)?.is_numeric() {
            return None;
        }
        self.records
            .iter()
            .map(|r| r.features.get(name).and_then(FeatureValue::as_numeric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(pos: &str, yds: f64) -> Record {
        Record::new(
            FeatureVector::new().with("Pos", pos).with("Pass_Yds", yds),
            Target::Continuous(yds / 10.0),
        )
    }

    #[test]
    fn dataset_infers_schema() -> Result<()> {
        let data =
            Dataset::new(vec![player("QB", 4000.0), player("RB", 10.0), player("QB", 3000.0)])?;
        assert_eq!(data.len(), 3);
        assert_eq!(data.schema().names(), vec!["Pos".to_string(), "Pass_Yds".to_string()]);
        assert_eq!(
            data.schema().column("Pos").map(|c| c.kind.clone()),
            Some(ColumnKind::Categorical(vec!["QB".into(), "RB".into()]))
        );
        assert_eq!(data.numeric_column("Pass_Yds"), Some(vec![4000.0, 10.0, 3000.0]));
        assert_eq!(data.numeric_column("Pos"), None);
        Ok(())
    }

    #[test]
    fn dataset_rejects_inconsistent_records() {
        let odd = Record::new(FeatureVector::new().with("Pos", "QB"), Target::Continuous(1.0));
        let err = Dataset::new(vec![player("QB", 1.0), odd]).unwrap_err();
        assert!(matches!(err, ExplainError::FeatureMismatch { .. }));

        let wrong_kind = Record::new(
            FeatureVector::new().with("Pos", 3.0).with("Pass_Yds", 1.0),
            Target::Continuous(1.0),
        );
        let err = Dataset::new(vec![player("QB", 1.0), wrong_kind]).unwrap_err();
        assert!(matches!(err, ExplainError::FeatureMismatch { .. }));

        let missing = player("QB", f64::NAN);
        assert!(matches!(
            Dataset::new(vec![missing]).unwrap_err(),
            ExplainError::InvalidInput { .. }
        ));
    }

    #[test]
    fn schema_check_reports_missing_feature() -> Result<()> {
        let data = Dataset::new(vec![player("QB", 1.0)])?;
        let partial = FeatureVector::new().with("Pos", "QB").with("Rush_Yds", 1.0);
        let err = data.schema().check(&partial, Stage::Contribution).unwrap_err();
        assert_eq!(err.stage(), Stage::Contribution);
        assert!(data.schema().check(&player("RB", 2.0).features, Stage::Contribution).is_ok());
        Ok(())
    }

    #[test]
    fn feature_vector_set_overwrites() {
        let mut v = FeatureVector::new().with("a", 1.0).with("b", "x");
        v.set("a", 2.0);
        assert_eq!(v.len(), 2);
        assert_eq!(v.get("a"), Some(&FeatureValue::Numeric(2.0)));
        assert_eq!(v.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
