//! Two-sample log-rank test.
//!
//! # Algorithm
//!
//! At each distinct event time with `n = n₁ + n₂` at risk and `d` events:
//!
//! ```text
//! E₁ += d·n₁/n
//! V  += n₁·n₂·d·(n − d) / (n²·(n − 1))
//! χ² = (O₁ − E₁)² / V,  df = 1
//! ```
//!
//! The hazard ratio is the observed/expected ratio
//! `HR = (O₁/E₁)/(O₂/E₂)` with `SE(ln HR) = sqrt(1/E₁ + 1/E₂)`. This is
//! the Mantel-Haenszel style approximation, not a Cox model fit; it agrees
//! with Cox estimates when the HR is moderate.
//!
//! When either group has no observed events the ratio is 0 or ∞ and is
//! reported as absent; the χ² test is still returned.
//!
//! # References
//!
//! - Mantel, N. (1966). "Evaluation of survival data and two new rank order
//!   statistics arising in its consideration". Cancer Chemother Rep, 50,
//!   163–170.
//! - Peto, R. & Peto, J. (1972). "Asymptotically efficient rank invariant
//!   test procedures". JRSS A, 135, 185–207.

use super::{distinct_times, split_by_group, validate, SurvivalObservation};
use crate::error::{Result, StatError};
use crate::interval::{Estimate, Interval};
use crate::special::{chi_squared_sf, z_critical};

/// Log-rank comparison of two groups.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogRankResult {
    /// Group labels (first, second) as found on the observations.
    pub groups: [Option<String>; 2],
    /// Observed events per group.
    pub observed: [f64; 2],
    /// Expected events per group under H₀.
    pub expected: [f64; 2],
    /// Hypergeometric variance of `O₁ − E₁`.
    pub variance: f64,
    /// χ² statistic on one degree of freedom.
    pub chi_squared: f64,
    /// Degrees of freedom, always 1.
    pub df: f64,
    /// p-value of `chi_squared`.
    pub p_value: f64,
    /// Hazard ratio of the first group relative to the second; `None` when
    /// either group has no observed events.
    pub hazard_ratio: Option<Estimate>,
}

/// Log-rank test of `first` against `second`.
///
/// # Errors
///
/// - [`StatError::Data`] when a group is empty, there are no events, or a
///   group has nobody at risk at every event time.
/// - [`StatError::Domain`] for an invalid time or confidence level.
pub fn log_rank_test(
    first: &[SurvivalObservation],
    second: &[SurvivalObservation],
    confidence: f64,
) -> Result<LogRankResult> {
    validate(first)?;
    validate(second)?;
    let z = z_critical(confidence)?;

    let mut at_risk = [first.len(), second.len()];
    let mut observed = [0.0; 2];
    let mut expected = [0.0; 2];
    let mut variance = 0.0;

    let pooled: Vec<SurvivalObservation> = first.iter().chain(second).cloned().collect();
    for t in distinct_times(&pooled) {
        let mut events = [0_usize; 2];
        let mut leaving = [0_usize; 2];
        for (g, arm) in [first, second].into_iter().enumerate() {
            for o in arm.iter().filter(|o| o.time == t) {
                leaving[g] += 1;
                if o.event {
                    events[g] += 1;
                }
            }
        }

        let d = (events[0] + events[1]) as f64;
        if d > 0.0 {
            let n1 = at_risk[0] as f64;
            let n2 = at_risk[1] as f64;
            let n = n1 + n2;
            observed[0] += events[0] as f64;
            observed[1] += events[1] as f64;
            expected[0] += d * n1 / n;
            expected[1] += d * n2 / n;
            if n > 1.0 {
                variance += n1 * n2 * d * (n - d) / (n * n * (n - 1.0));
            }
        }
        at_risk[0] -= leaving[0];
        at_risk[1] -= leaving[1];
    }

    if observed[0] + observed[1] == 0.0 {
        return Err(StatError::data("log-rank test needs at least one event"));
    }
    if expected[0] <= 0.0 || expected[1] <= 0.0 || variance <= 0.0 {
        return Err(StatError::data(
            "groups never share a risk set at an event time",
        ));
    }

    let diff = observed[0] - expected[0];
    let chi_squared = diff * diff / variance;

    let hazard_ratio = if observed[0] > 0.0 && observed[1] > 0.0 {
        let log_hr = ((observed[0] / expected[0]) / (observed[1] / expected[1])).ln();
        let log_se = (1.0 / expected[0] + 1.0 / expected[1]).sqrt();
        Some(Estimate {
            value: log_hr.exp(),
            ci: Interval::symmetric(log_hr, z * log_se).exp(),
        })
    } else {
        tracing::debug!(?observed, "hazard ratio undefined: a group has no events");
        None
    };

    Ok(LogRankResult {
        groups: [first[0].group.clone(), second[0].group.clone()],
        observed,
        expected,
        variance,
        chi_squared,
        df: 1.0,
        p_value: chi_squared_sf(chi_squared, 1.0),
        hazard_ratio,
    })
}

/// Log-rank test over labelled observations; the first label to appear is
/// the first group.
///
/// # Errors
///
/// [`StatError::Data`] unless exactly two group labels are present, plus
/// the errors of [`log_rank_test`].
pub fn log_rank_by_group(obs: &[SurvivalObservation], confidence: f64) -> Result<LogRankResult> {
    validate(obs)?;
    let groups = split_by_group(obs);
    match groups.as_slice() {
        [(_, first), (_, second)] => log_rank_test(first, second, confidence),
        _ => Err(StatError::data(format!(
            "log-rank test needs exactly 2 groups, got {}",
            groups.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survival::fixtures::two_arm_cohort;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_two_arm_reference() {
        let r = log_rank_by_group(&two_arm_cohort(), 0.95).expect("valid");
        assert_eq!(r.groups[0].as_deref(), Some("EVT"));
        assert_eq!(r.groups[1].as_deref(), Some("Medical"));
        assert_eq!(r.observed, [8.0, 12.0]);
        assert!(close(r.expected[0], 12.349_093_009_673_934, 1e-10));
        assert!(close(r.expected[1], 7.650_906_990_326_066, 1e-10));
        assert!(close(r.variance, 4.362_912_058_895_614, 1e-10));
        assert!(close(r.chi_squared, 4.335_317_730_787_025, 1e-9));
        assert_eq!(r.df, 1.0);
        assert!(close(r.p_value, 0.037_329_448_066_220, 1e-5));

        let hr = r.hazard_ratio.expect("both arms have events");
        assert!(close(hr.value, 0.413_034_759_412_833, 1e-10));
        assert!(close(hr.ci.lower, 0.167_632_760_277_907, 1e-8));
        assert!(close(hr.ci.upper, 1.017_687_188_353_846, 1e-8));
    }

    #[test]
    fn test_swapping_groups_inverts_hr() {
        let cohort = two_arm_cohort();
        let (evt, medical): (Vec<_>, Vec<_>) = cohort
            .into_iter()
            .partition(|o| o.group.as_deref() == Some("EVT"));
        let ab = log_rank_test(&evt, &medical, 0.95).expect("valid");
        let ba = log_rank_test(&medical, &evt, 0.95).expect("valid");
        assert!(close(ab.chi_squared, ba.chi_squared, 1e-10));
        let (hr_ab, hr_ba) = (ab.hazard_ratio.expect("hr"), ba.hazard_ratio.expect("hr"));
        assert!(close(hr_ab.value * hr_ba.value, 1.0, 1e-12));
    }

    #[test]
    fn test_hazard_ratio_absent_when_arm_has_no_events() {
        let with_events: Vec<_> = (1..=6)
            .map(|t| SurvivalObservation::event(f64::from(t)))
            .collect();
        let event_free: Vec<_> = (1..=6)
            .map(|t| SurvivalObservation::censored(f64::from(t) + 0.5))
            .collect();

        let r = log_rank_test(&with_events, &event_free, 0.95).expect("valid");
        assert_eq!(r.hazard_ratio, None);
        assert_eq!(r.observed, [6.0, 0.0]);
        assert!(r.chi_squared.is_finite() && r.chi_squared > 0.0);
        assert!(r.p_value > 0.0 && r.p_value < 1.0);

        let swapped = log_rank_test(&event_free, &with_events, 0.95).expect("valid");
        assert_eq!(swapped.hazard_ratio, None);
        assert!(close(swapped.chi_squared, r.chi_squared, 1e-12));
    }

    #[test]
    fn test_group_count_errors() {
        let one: Vec<_> = (1..5)
            .map(|t| SurvivalObservation::event(f64::from(t)).in_group("A"))
            .collect();
        assert!(log_rank_by_group(&one, 0.95).unwrap_err().is_data());

        let mut three = two_arm_cohort();
        three.push(SurvivalObservation::event(3.0).in_group("Other"));
        assert!(log_rank_by_group(&three, 0.95).unwrap_err().is_data());
    }

    #[test]
    fn test_no_events() {
        let a = [SurvivalObservation::censored(1.0), SurvivalObservation::censored(2.0)];
        let b = [SurvivalObservation::censored(1.5)];
        assert!(log_rank_test(&a, &b, 0.95).unwrap_err().is_data());
        assert!(log_rank_test(&a, &[], 0.95).unwrap_err().is_data());
    }
}
