//! Kaplan-Meier product-limit estimator.
//!
//! # Algorithm
//!
//! At each distinct time `tⱼ` with `nⱼ` subjects at risk and `dⱼ` events:
//!
//! ```text
//! S(tⱼ) = S(tⱼ₋₁) · (1 − dⱼ/nⱼ)
//! Var[S(t)] = S(t)² · Σ dⱼ / (nⱼ(nⱼ − dⱼ))          (Greenwood)
//! ```
//!
//! Subjects censored at `tⱼ` count as at risk at `tⱼ` and leave afterwards.
//! The pointwise CI uses the log-log transform, which keeps it in [0, 1]:
//!
//! ```text
//! θ = ln(−ln S),  s = sqrt(Σ dⱼ/(nⱼ(nⱼ − dⱼ))) / |ln S|
//! CI = [exp(−exp(θ + z·s)), exp(−exp(θ − z·s))]
//! ```
//!
//! # References
//!
//! - Kaplan, E.L. & Meier, P. (1958). "Nonparametric estimation from
//!   incomplete observations". JASA, 53, 457–481.
//! - Brookmeyer, R. & Crowley, J. (1982). "A confidence interval for the
//!   median survival time". Biometrics, 38, 29–41.

use super::{distinct_times, split_by_group, validate, SurvivalObservation};
use crate::error::Result;
use crate::interval::Interval;
use crate::special::z_critical;

/// One row of the survival table.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KmRow {
    /// Time point.
    pub time: f64,
    /// Subjects at risk just before `time`.
    pub n_risk: usize,
    /// Events at `time`.
    pub events: usize,
    /// Censorings at `time`.
    pub censored: usize,
    /// Survival probability after `time`.
    pub survival: f64,
    /// Greenwood standard error.
    pub se: f64,
    /// Log-log confidence interval.
    pub ci: Interval,
}

/// Median survival confidence limits. Each side is `None` when the
/// corresponding band never drops to 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MedianCi {
    /// First time the lower band reaches 0.5.
    pub lower: Option<f64>,
    /// First time the upper band reaches 0.5.
    pub upper: Option<f64>,
}

/// Kaplan-Meier estimate for one cohort.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KmResult {
    /// Group label, `None` for an ungrouped cohort.
    pub group: Option<String>,
    /// Number of subjects.
    pub n: usize,
    /// Number of events.
    pub events: usize,
    /// Baseline row at time 0 followed by one row per distinct time.
    pub table: Vec<KmRow>,
    /// Median survival, `None` when not reached.
    pub median: Option<f64>,
    /// Confidence limits of the median.
    pub median_ci: MedianCi,
}

impl KmResult {
    /// The row in force at `t`: the last row with `time ≤ t`, or the
    /// baseline row for `t` before it.
    pub fn row_at(&self, t: f64) -> &KmRow {
        let idx = self.table.partition_point(|r| r.time <= t);
        &self.table[idx.saturating_sub(1)]
    }

    /// Survival probability at `t` (landmark survival).
    pub fn survival_at(&self, t: f64) -> f64 {
        self.row_at(t).survival
    }
}

/// Kaplan-Meier estimate over all observations, ignoring group labels.
///
/// # Errors
///
/// [`StatError::Data`](crate::StatError::Data) for an empty cohort;
/// [`StatError::Domain`](crate::StatError::Domain) for a negative or
/// non-finite time, or an invalid confidence level.
pub fn kaplan_meier(obs: &[SurvivalObservation], confidence: f64) -> Result<KmResult> {
    validate(obs)?;
    let z = z_critical(confidence)?;

    let n = obs.len();
    let mut table = Vec::with_capacity(n + 1);
    table.push(KmRow {
        time: 0.0,
        n_risk: n,
        events: 0,
        censored: 0,
        survival: 1.0,
        se: 0.0,
        ci: Interval::new(1.0, 1.0),
    });

    let mut at_risk = n;
    let mut survival = 1.0;
    let mut greenwood = 0.0;
    for t in distinct_times(obs) {
        let (events, censored) = obs
            .iter()
            .filter(|o| o.time == t)
            .fold((0, 0), |(d, c), o| if o.event { (d + 1, c) } else { (d, c + 1) });

        if events > 0 {
            survival *= 1.0 - events as f64 / at_risk as f64;
            if at_risk > events {
                greenwood += events as f64 / (at_risk * (at_risk - events)) as f64;
            }
        }

        let (se, ci) = band(survival, greenwood, z);
        table.push(KmRow {
            time: t,
            n_risk: at_risk,
            events,
            censored,
            survival,
            se,
            ci,
        });
        at_risk -= events + censored;
    }

    let rows = &table[1..];
    let median = first_at_or_below_half(rows, |r| r.survival);
    let median_ci = MedianCi {
        lower: first_at_or_below_half(rows, |r| r.ci.lower),
        upper: first_at_or_below_half(rows, |r| r.ci.upper),
    };

    Ok(KmResult {
        group: None,
        n,
        events: obs.iter().filter(|o| o.event).count(),
        table,
        median,
        median_ci,
    })
}

/// One Kaplan-Meier estimate per group label, in first-appearance order.
/// Unlabelled observations form their own group with label `None`.
pub fn kaplan_meier_by_group(obs: &[SurvivalObservation], confidence: f64) -> Result<Vec<KmResult>> {
    validate(obs)?;
    split_by_group(obs)
        .into_iter()
        .map(|(group, members)| {
            let mut km = kaplan_meier(&members, confidence)?;
            km.group = group;
            Ok(km)
        })
        .collect()
}

/// First time at which `f(row)` is at most 0.5; no interpolation.
fn first_at_or_below_half(rows: &[KmRow], f: impl Fn(&KmRow) -> f64) -> Option<f64> {
    rows.iter().find(|r| f(r) <= 0.5).map(|r| r.time)
}

/// Greenwood SE and log-log CI; degenerate at S = 1 and S = 0.
fn band(survival: f64, greenwood: f64, z: f64) -> (f64, Interval) {
    if survival >= 1.0 || survival <= 0.0 {
        return (0.0, Interval::new(survival, survival));
    }
    let se = survival * greenwood.sqrt();
    let log_s = survival.ln();
    let theta = (-log_s).ln();
    let s = greenwood.sqrt() / log_s.abs();
    let ci = Interval::new(
        (-(theta + z * s).exp()).exp(),
        (-(theta - z * s).exp()).exp(),
    );
    (se, ci)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survival::fixtures::two_arm_cohort;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn arms() -> Vec<KmResult> {
        kaplan_meier_by_group(&two_arm_cohort(), 0.95).expect("valid")
    }

    #[test]
    fn test_groups_in_order() {
        let arms = arms();
        assert_eq!(arms.len(), 2);
        assert_eq!(arms[0].group.as_deref(), Some("EVT"));
        assert_eq!(arms[1].group.as_deref(), Some("Medical"));
        assert_eq!(arms[0].n, 15);
        assert_eq!(arms[0].events, 8);
        assert_eq!(arms[1].events, 12);
    }

    #[test]
    fn test_evt_table() {
        let arms = arms();
        let evt = &arms[0];
        // Baseline plus 13 distinct times.
        assert_eq!(evt.table.len(), 14);
        let base = evt.table[0];
        assert_eq!((base.time, base.n_risk, base.survival), (0.0, 15, 1.0));

        let t2 = evt.table[1];
        assert_eq!((t2.time, t2.n_risk, t2.events), (2.0, 15, 1));
        assert!(close(t2.survival, 0.933_333_333_333_333, 1e-12));
        assert!(close(t2.se, 0.064_406_118_871_953, 1e-12));
        assert!(close(t2.ci.lower, 0.612_641_243_774_872, 1e-8));
        assert!(close(t2.ci.upper, 0.990_332_236_650_017, 1e-8));

        // Censor-only row carries survival forward.
        let t4 = evt.table[2];
        assert_eq!((t4.time, t4.events, t4.censored), (4.0, 0, 1));
        assert_eq!(t4.survival, t2.survival);

        let t12 = evt.row_at(12.0);
        assert_eq!((t12.n_risk, t12.events, t12.censored), (9, 1, 1));
        assert!(close(t12.survival, 0.631_794_871_794_872, 1e-12));

        let t20 = evt.row_at(20.0);
        assert!(close(t20.survival, 0.433_230_769_230_769, 1e-12));
        assert!(close(t20.se, 0.148_540_321_161_828, 1e-12));
        assert!(close(t20.ci.lower, 0.154_445_552_360_034, 1e-8));
        assert!(close(t20.ci.upper, 0.687_569_306_311_558, 1e-8));
    }

    #[test]
    fn test_medians() {
        let arms = arms();
        assert_eq!(arms[0].median, Some(20.0));
        assert_eq!(arms[0].median_ci, MedianCi { lower: Some(6.0), upper: None });
        assert_eq!(arms[1].median, Some(9.0));
        assert_eq!(arms[1].median_ci, MedianCi { lower: Some(3.0), upper: Some(16.0) });
    }

    #[test]
    fn test_medical_reaches_zero() {
        let arms = arms();
        let medical = &arms[1];
        let t3 = medical.row_at(3.0);
        assert_eq!(t3.events, 2);
        assert!(close(t3.survival, 0.733_333_333_333_333, 1e-12));
        let t9 = medical.row_at(9.0);
        assert!(close(t9.ci.lower, 0.188_815_388_948_494, 1e-8));
        assert!(close(t9.ci.upper, 0.674_024_230_121_798, 1e-8));

        let last = medical.table.last().expect("non-empty");
        assert_eq!(last.time, 22.0);
        assert_eq!(last.survival, 0.0);
        assert_eq!(last.se, 0.0);
        assert_eq!(last.ci, Interval::new(0.0, 0.0));
    }

    #[test]
    fn test_survival_at_is_step_function() {
        let arms = arms();
        let evt = &arms[0];
        assert_eq!(evt.survival_at(-1.0), 1.0);
        assert_eq!(evt.survival_at(1.999), 1.0);
        assert!(close(evt.survival_at(2.0), 0.933_333_333_333_333, 1e-12));
        assert!(close(evt.survival_at(14.9), 0.631_794_871_794_872, 1e-12));
        assert!(close(evt.survival_at(1000.0), 0.216_615_384_615_385, 1e-12));
    }

    #[test]
    fn test_median_not_reached() {
        let obs: Vec<_> = (1..=10)
            .map(|t| SurvivalObservation::new(f64::from(t), t % 4 == 0))
            .collect();
        let km = kaplan_meier(&obs, 0.95).expect("valid");
        assert!(km.median.is_none());
    }

    #[test]
    fn test_invalid_input() {
        assert!(kaplan_meier(&[], 0.95).unwrap_err().is_data());
        assert!(kaplan_meier(&[SurvivalObservation::event(-2.0)], 0.95)
            .unwrap_err()
            .is_domain());
    }
}
