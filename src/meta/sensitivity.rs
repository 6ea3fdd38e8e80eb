//! Leave-one-out and cumulative meta-analysis.

use std::cmp::Ordering;

use super::pooling::pool;
use super::{validate_studies, MetaOptions, PooledResult, StudyEffect};
use crate::error::{Result, StatError};

/// Pooled result with one study removed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeaveOneOut {
    /// Name of the omitted study.
    pub omitted: String,
    /// Pooled result over the remaining studies.
    pub result: PooledResult,
}

/// Pooled result after adding one more study.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CumulativeStep {
    /// Name of the study added at this step.
    pub added: String,
    /// Number of studies pooled so far.
    pub k: usize,
    /// Pooled result over the first `k` studies.
    pub result: PooledResult,
}

/// Re-pools once per study with that study omitted, in input order.
///
/// # Errors
///
/// [`StatError::Data`](crate::StatError::Data) when the remaining studies
/// are too few for `options` (k − 1 < 2, or < 3 with HKSJ).
pub fn leave_one_out(studies: &[StudyEffect], options: &MetaOptions) -> Result<Vec<LeaveOneOut>> {
    validate_studies(studies, options.min_studies() + 1)?;

    let mut subset = Vec::with_capacity(studies.len() - 1);
    studies
        .iter()
        .enumerate()
        .map(|(i, omitted)| {
            subset.clear();
            subset.extend(
                studies
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, s)| s.clone()),
            );
            Ok(LeaveOneOut {
                omitted: omitted.name.clone(),
                result: pool(&subset, options)?,
            })
        })
        .collect()
}

/// Re-pools on growing prefixes of `studies` in input order. The first step
/// holds the smallest prefix `options` can pool (2, or 3 with HKSJ).
///
/// # Errors
///
/// [`StatError::Data`](crate::StatError::Data) when there are fewer studies
/// than that first prefix.
pub fn cumulative(studies: &[StudyEffect], options: &MetaOptions) -> Result<Vec<CumulativeStep>> {
    let start = options.min_studies();
    validate_studies(studies, start)?;

    (start..=studies.len())
        .map(|k| {
            Ok(CumulativeStep {
                added: studies[k - 1].name.clone(),
                k,
                result: pool(&studies[..k], options)?,
            })
        })
        .collect()
}

/// [`cumulative`] after a stable sort by `key`, e.g. publication year or
/// precision.
///
/// # Errors
///
/// [`StatError::Data`] when a key is not comparable with itself (a NaN
/// float), plus the errors of [`cumulative`].
pub fn cumulative_by_key<K, F>(
    studies: &[StudyEffect],
    mut key: F,
    options: &MetaOptions,
) -> Result<Vec<CumulativeStep>>
where
    K: PartialOrd,
    F: FnMut(&StudyEffect) -> K,
{
    let mut keyed: Vec<(K, &StudyEffect)> = studies.iter().map(|s| (key(s), s)).collect();
    if let Some((_, s)) = keyed.iter().find(|(k, _)| k.partial_cmp(k).is_none()) {
        return Err(StatError::data(format!(
            "study '{}' has an unordered sort key",
            s.name
        )));
    }
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let sorted: Vec<StudyEffect> = keyed.into_iter().map(|(_, s)| s.clone()).collect();
    cumulative(&sorted, options)
}
