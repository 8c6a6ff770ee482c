// src/algorithms/correlation.rs

use crate::algorithms::region::Region;
use crate::core::{ExplainError, Result, Stage};
use crate::utils;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which feature of a correlated pair survives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropPolicy {
    /// Keep the feature that comes first in schema order.
    #[default]
    KeepFirst,
    /// Keep the feature that comes last in schema order.
    KeepLast,
    /// Features earlier in the list are kept over later ones; unlisted
    /// features lose against listed ones, and ties fall back to `KeepFirst`.
    Prefer(Vec<String>),
    /// Drop exactly these features, ignoring the report.
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Pairs with `|r|` strictly above this are reported.
    pub threshold: f64,
    pub policy: DropPolicy,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            threshold: 0.8,
            policy: DropPolicy::default(),
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ExplainError::Config(format!(
                "correlation threshold must lie in [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    /// Earlier of the two features in schema order.
    pub first: String,
    pub second: String,
    pub correlation: f64,
}

/// Numeric feature pairs whose absolute correlation exceeds a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub threshold: f64,
    /// Sorted by descending absolute correlation.
    pub pairs: Vec<CorrelatedPair>,
}

impl CorrelationReport {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.pairs
            .iter()
            .any(|p| (p.first == a && p.second == b) || (p.first == b && p.second == a))
    }

    /// Resolves the report into a set of features to exclude.
    ///
    /// `order` is the schema order used by the positional policies. Explicit
    /// names must all appear in it.
    pub fn exclusions(&self, policy: &DropPolicy, order: &[String]) -> Result<BTreeSet<String>> {
        if let DropPolicy::Explicit(names) = policy {
            if let Some(unknown) = names.iter().find(|name| !order.contains(name)) {
                return Err(ExplainError::mismatch(
                    Stage::Filtering,
                    format!("cannot drop `{}`: not a feature of the dataset", unknown),
                ));
            }
            return Ok(names.iter().cloned().collect());
        }
        let rank = |name: &str| -> usize {
            order.iter().position(|n| n == name).unwrap_or(usize::MAX)
        };

        let mut dropped = BTreeSet::new();
        for pair in &self.pairs {
            if dropped.contains(&pair.first) || dropped.contains(&pair.second) {
                continue;
            }
            let first_wins = match policy {
                DropPolicy::KeepFirst | DropPolicy::Explicit(_) => {
                    rank(&pair.first) <= rank(&pair.second)
                }
                DropPolicy::KeepLast => rank(&pair.first) > rank(&pair.second),
                DropPolicy::Prefer(preferred) => {
                    let pref = |name: &str| {
                        preferred.iter().position(|p| p == name).unwrap_or(usize::MAX)
                    };
                    match pref(&pair.first).cmp(&pref(&pair.second)) {
                        std::cmp::Ordering::Less => true,
                        std::cmp::Ordering::Greater => false,
                        std::cmp::Ordering::Equal => rank(&pair.first) <= rank(&pair.second),
                    }
                }
            };
            let loser = if first_wins { &pair.second } else { &pair.first };
            log::debug!(
                "dropping `{}` (|r| = {:.3} between `{}` and `{}`)",
                loser,
                pair.correlation.abs(),
                pair.first,
                pair.second
            );
            dropped.insert(loser.clone());
        }
        Ok(dropped)
    }
}

/// Reports collinear numeric features of a region. Never mutates its input.
#[derive(Debug, Clone, Default)]
pub struct CorrelationFilter {
    config: CorrelationConfig,
}

impl CorrelationFilter {
    pub fn new(config: Option<CorrelationConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(CorrelationFilter { config })
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    pub fn report(&self, region: &Region<'_>) -> Result<CorrelationReport> {
        self.report_at(region, self.config.threshold)
    }

    /// Same as [`Self::report`] with an overriding threshold.
    pub fn report_at(&self, region: &Region<'_>, threshold: f64) -> Result<CorrelationReport> {
        let names = region.dataset().schema().numeric_names();
        let columns: Vec<Vec<f64>> = names
            .iter()
            .map(|name| {
                region.numeric_values(name).ok_or_else(|| {
                    ExplainError::mismatch(
                        Stage::Filtering,
                        format!("region sample lacks numeric feature `{}`", name),
                    )
                })
            })
            .collect::<Result<_>>()?;
        let weights = region.weights();

        let index_pairs: Vec<(usize, usize)> = (0..names.len())
            .flat_map(|i| ((i + 1)..names.len()).map(move |j| (i, j)))
            .collect();

        let mut pairs: Vec<CorrelatedPair> = index_pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                let r = utils::weighted_pearson(&columns[i], &columns[j], &weights);
                if r.is_nan() || r.abs() <= threshold {
                    return None;
                }
                Some(CorrelatedPair {
                    first: names[i].to_string(),
                    second: names[j].to_string(),
                    correlation: r,
                })
            })
            .collect();

        pairs.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.first.cmp(&b.first))
                .then_with(|| a.second.cmp(&b.second))
        });

        Ok(CorrelationReport { threshold, pairs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::region::Region;
    use crate::core::{Dataset, FeatureVector, Record, Target};

    fn stats_dataset() -> Result<Dataset> {
        let records = (0..60)
            .map(|i| {
                let x = i as f64;
                let noise = ((i * 37) % 11) as f64 - 5.0;
                Record::new(
                    FeatureVector::new()
                        .with("Rush_Yds", x * 4.5 + noise * 0.1)
                        .with("Rush_TD", x * 0.3 + noise * 0.5)
                        .with("Rush_Att", x)
                        .with("Rec", ((i * 13) % 17) as f64)
                        .with("Games", 16.0)
                        .with("Pos", if i % 2 == 0 { "RB" } else { "WR" }),
                    Target::Continuous(x),
                )
            })
            .collect();
        Dataset::new(records)
    }

    fn whole(data: &Dataset) -> Result<Region<'_>> {
        let indices: Vec<usize> = (0..data.len()).collect();
        Region::from_indices(data, &indices)
    }

    #[test]
    fn report_is_canonical_and_sorted() -> Result<()> {
        let data = stats_dataset()?;
        let region = whole(&data)?;
        let report = CorrelationFilter::new(None)?.report(&region)?;
        assert!(!report.is_empty());
        assert!(report.contains("Rush_Yds", "Rush_Att"));
        for pair in &report.pairs {
            assert_ne!(pair.first, pair.second);
            assert!(pair.correlation.abs() > 0.8);
            assert!(!report.pairs.iter().any(|p| p.first == pair.second && p.second == pair.first));
        }
        for w in report.pairs.windows(2) {
            assert!(w[0].correlation.abs() >= w[1].correlation.abs());
        }
        Ok(())
    }

    #[test]
    fn zero_variance_pairs_are_excluded() -> Result<()> {
        let data = stats_dataset()?;
        let region = whole(&data)?;
        let report = CorrelationFilter::new(None)?.report_at(&region, 0.0)?;
        assert!(report.pairs.iter().all(|p| p.first != "Games" && p.second != "Games"));
        Ok(())
    }

    #[test]
    fn higher_threshold_gives_subset() -> Result<()> {
        let data = stats_dataset()?;
        let region = whole(&data)?;
        let filter = CorrelationFilter::new(None)?;
        let thresholds = [0.0, 0.3, 0.5, 0.8, 0.95, 0.999];
        for w in thresholds.windows(2) {
            let loose = filter.report_at(&region, w[0])?;
            let strict = filter.report_at(&region, w[1])?;
            for pair in &strict.pairs {
                assert!(loose.pairs.contains(pair));
            }
        }
        Ok(())
    }

    #[test]
    fn drop_policies_resolve_pairs() -> Result<()> {
        let data = stats_dataset()?;
        let region = whole(&data)?;
        let report = CorrelationFilter::new(None)?.report(&region)?;
        let order = data.schema().names();

        let keep_first = report.exclusions(&DropPolicy::KeepFirst, &order)?;
        assert!(!keep_first.contains("Rush_Yds"));
        assert!(keep_first.contains("Rush_Att"));

        let keep_last = report.exclusions(&DropPolicy::KeepLast, &order)?;
        assert!(keep_last.contains("Rush_Yds"));

        let prefer = report.exclusions(&DropPolicy::Prefer(vec!["Rush_Att".into()]), &order)?;
        assert!(!prefer.contains("Rush_Att"));
        assert!(prefer.contains("Rush_Yds"));

        let explicit = report.exclusions(&DropPolicy::Explicit(vec!["Rec".into()]), &order)?;
        assert_eq!(explicit.into_iter().collect::<Vec<_>>(), vec!["Rec".to_string()]);
        Ok(())
    }

    #[test]
    fn explicit_drops_must_name_dataset_features() -> Result<()> {
        let data = stats_dataset()?;
        let region = whole(&data)?;
        let report = CorrelationFilter::new(None)?.report(&region)?;
        let order = data.schema().names();

        let policy = DropPolicy::Explicit(vec!["Rec".into(), "Rush_Yards".into()]);
        let err = report.exclusions(&policy, &order).unwrap_err();
        assert!(matches!(err, ExplainError::FeatureMismatch { stage: Stage::Filtering, .. }));
        assert!(err.to_string().contains("Rush_Yards"));

        let categorical = DropPolicy::Explicit(vec!["Pos".into()]);
        assert_eq!(report.exclusions(&categorical, &order)?.len(), 1);
        Ok(())
    }

    #[test]
    fn threshold_out_of_range_is_config_error() {
        let config = CorrelationConfig {
            threshold: 1.5,
            ..CorrelationConfig::default()
        };
        assert!(matches!(CorrelationFilter::new(Some(config)), Err(ExplainError::Config(_))));
    }
}
