//! Survival analysis: Kaplan-Meier estimation and the log-rank test.
//!
//! # Examples
//!
//! ```
//! use u_biostat::survival::{kaplan_meier, SurvivalObservation};
//!
//! let obs = vec![
//!     SurvivalObservation::event(2.0),
//!     SurvivalObservation::censored(3.0),
//!     SurvivalObservation::event(5.0),
//!     SurvivalObservation::event(8.0),
//! ];
//! let km = kaplan_meier(&obs, 0.95).unwrap();
//! assert_eq!(km.table[0].survival, 1.0);
//! assert_eq!(km.survival_at(4.0), 0.75);
//! assert_eq!(km.median, Some(5.0));
//! ```

mod kaplan_meier;
mod log_rank;

pub use kaplan_meier::{kaplan_meier, kaplan_meier_by_group, KmResult, KmRow, MedianCi};
pub use log_rank::{log_rank_by_group, log_rank_test, LogRankResult};

use crate::error::{Result, StatError};

/// One subject's follow-up.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurvivalObservation {
    /// Time to event or censoring, non-negative.
    pub time: f64,
    /// `true` for an event, `false` for censoring.
    pub event: bool,
    /// Optional group label (treatment arm, stratum).
    pub group: Option<String>,
}

impl SurvivalObservation {
    /// Ungrouped observation.
    pub fn new(time: f64, event: bool) -> Self {
        Self {
            time,
            event,
            group: None,
        }
    }

    /// Ungrouped event at `time`.
    pub fn event(time: f64) -> Self {
        Self::new(time, true)
    }

    /// Ungrouped censoring at `time`.
    pub fn censored(time: f64) -> Self {
        Self::new(time, false)
    }

    /// Sets the group label.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Rejects an empty cohort or an invalid time.
fn validate(obs: &[SurvivalObservation]) -> Result<()> {
    if obs.is_empty() {
        return Err(StatError::data("no survival observations"));
    }
    match obs.iter().find(|o| !(o.time.is_finite() && o.time >= 0.0)) {
        Some(o) => Err(StatError::domain(format!(
            "survival time must be finite and non-negative, got {}",
            o.time
        ))),
        None => Ok(()),
    }
}

/// Splits observations by group label, in first-appearance order.
fn split_by_group(obs: &[SurvivalObservation]) -> Vec<(Option<String>, Vec<SurvivalObservation>)> {
    let mut groups: Vec<(Option<String>, Vec<SurvivalObservation>)> = Vec::new();
    for o in obs {
        match groups.iter_mut().find(|(g, _)| *g == o.group) {
            Some((_, members)) => members.push(o.clone()),
            None => groups.push((o.group.clone(), vec![o.clone()])),
        }
    }
    groups
}

/// Distinct times in ascending order.
fn distinct_times(obs: &[SurvivalObservation]) -> Vec<f64> {
    let mut times: Vec<f64> = obs.iter().map(|o| o.time).collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    times.dedup();
    times
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::SurvivalObservation;

    /// Two-arm stroke cohort: endovascular therapy vs medical management.
    pub(crate) fn two_arm_cohort() -> Vec<SurvivalObservation> {
        let evt = [
            (2, 1), (4, 0), (5, 1), (6, 1), (8, 0), (10, 1), (12, 0), (12, 1),
            (15, 1), (18, 0), (20, 1), (24, 0), (24, 0), (30, 1), (36, 0),
        ];
        let medical = [
            (1, 1), (2, 1), (3, 1), (3, 1), (4, 1), (5, 0), (6, 1), (8, 1),
            (9, 1), (12, 1), (12, 0), (14, 1), (16, 1), (20, 0), (22, 1),
        ];
        let arm = |name: &'static str, rows: &[(i32, i32)]| -> Vec<SurvivalObservation> {
            rows.iter()
                .map(|&(t, e)| SurvivalObservation::new(f64::from(t), e == 1).in_group(name))
                .collect::<Vec<_>>()
        };
        let mut all = arm("EVT", &evt);
        all.extend(arm("Medical", &medical));
        all
    }
}
