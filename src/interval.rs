//! Confidence-interval estimators.
//!
//! Binomial proportion intervals (Wald, Wilson score, Agresti-Coull,
//! Clopper-Pearson exact), the Newcombe hybrid-score interval for a
//! difference of proportions, and exact Poisson intervals for counts and
//! incidence rates.
//!
//! # Examples
//!
//! ```
//! use u_biostat::interval::{clopper_pearson_ci, wilson_ci};
//!
//! // Zero events out of 10: the score interval is asymmetric, not [0, 0].
//! let w = wilson_ci(0, 10, 1.959964).unwrap();
//! assert_eq!(w.ci.lower, 0.0);
//! assert!(w.ci.upper > 0.27 && w.ci.upper < 0.28);
//!
//! let cp = clopper_pearson_ci(0, 10, 0.05).unwrap();
//! assert!((cp.ci.upper - 0.308497).abs() < 1e-5);
//! ```

use crate::error::{Result, StatError};
use crate::special::{
    binomial_cdf, binomial_sf, bisect_decreasing, bisect_increasing, chi_squared_quantile,
    z_critical,
};

/// A two-sided interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Interval {
    /// Creates an interval.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// `upper - lower`.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether `x` lies in the closed interval.
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    /// Maps both bounds through `exp`, e.g. from log-OR to OR.
    pub fn exp(&self) -> Self {
        Self::new(self.lower.exp(), self.upper.exp())
    }

    /// Maps both bounds through `ln`.
    pub fn ln(&self) -> Self {
        Self::new(self.lower.ln(), self.upper.ln())
    }

    /// Symmetric interval `center ± half_width`.
    pub fn symmetric(center: f64, half_width: f64) -> Self {
        Self::new(center - half_width, center + half_width)
    }
}

/// A point estimate with its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Estimate {
    /// Point estimate.
    pub value: f64,
    /// Confidence interval.
    pub ci: Interval,
}

impl Estimate {
    /// Creates an estimate.
    pub fn new(value: f64, lower: f64, upper: f64) -> Self {
        Self {
            value,
            ci: Interval::new(lower, upper),
        }
    }

    /// Back-transforms a log-scale estimate (point and bounds).
    pub fn exp(&self) -> Self {
        Self {
            value: self.value.exp(),
            ci: self.ci.exp(),
        }
    }

    /// Log-transforms a ratio-scale estimate (point and bounds).
    pub fn ln(&self) -> Self {
        Self {
            value: self.value.ln(),
            ci: self.ci.ln(),
        }
    }
}

/// Binomial proportion interval method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProportionMethod {
    /// Normal approximation p ± z·sqrt(p(1-p)/n).
    Wald,
    /// Wilson score interval.
    #[default]
    Wilson,
    /// Agresti-Coull "add z²/2 successes and failures" interval.
    AgrestiCoull,
    /// Clopper-Pearson exact interval.
    ClopperPearson,
}

// ---------------------------------------------------------------------------
// Binomial proportion
// ---------------------------------------------------------------------------

fn check_counts(x: u64, n: u64) -> Result<()> {
    if n == 0 {
        return Err(StatError::data("proportion requires n >= 1"));
    }
    if x > n {
        return Err(StatError::domain(format!(
            "successes ({x}) exceed trials ({n})"
        )));
    }
    Ok(())
}

fn check_z(z: f64) -> Result<()> {
    if z > 0.0 && z.is_finite() {
        Ok(())
    } else {
        Err(StatError::domain(format!(
            "critical value must be positive and finite, got {z}"
        )))
    }
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(StatError::domain(format!("alpha must be in (0, 1), got {alpha}")))
    }
}

/// Wald (normal-approximation) interval for a proportion, clamped to [0, 1].
///
/// Collapses to a zero-width interval at `x = 0` and `x = n`; prefer
/// [`wilson_ci`] for small samples.
///
/// # Errors
///
/// [`StatError::Data`] when `n = 0`; [`StatError::Domain`] when `x > n`
/// or `z` is not positive.
pub fn wald_ci(x: u64, n: u64, z: f64) -> Result<Estimate> {
    check_counts(x, n)?;
    check_z(z)?;

    let nf = n as f64;
    let p = x as f64 / nf;
    let half = z * (p * (1.0 - p) / nf).sqrt();
    Ok(Estimate::new(
        p,
        (p - half).max(0.0),
        (p + half).min(1.0),
    ))
}

/// Wilson score interval for a proportion.
///
/// # Algorithm
///
/// ```text
/// center = (p + z²/2n) / (1 + z²/n)
/// half   = z·sqrt(p(1-p)/n + z²/4n²) / (1 + z²/n)
/// ```
///
/// Valid for any n ≥ 1. At `x = 0` the lower bound is exactly 0 and the
/// upper bound is strictly positive (and symmetrically at `x = n`).
///
/// # References
///
/// Wilson, E.B. (1927). "Probable inference, the law of succession, and
/// statistical inference". JASA, 22, 209–212.
pub fn wilson_ci(x: u64, n: u64, z: f64) -> Result<Estimate> {
    check_counts(x, n)?;
    check_z(z)?;
    let (lower, upper) = wilson_bounds(x, n, z);
    Ok(Estimate::new(x as f64 / n as f64, lower, upper))
}

fn wilson_bounds(x: u64, n: u64, z: f64) -> (f64, f64) {
    let nf = n as f64;
    let p = x as f64 / nf;
    let z2 = z * z;
    let denom = 1.0 + z2 / nf;
    let center = (p + z2 / (2.0 * nf)) / denom;
    let half = z * (p * (1.0 - p) / nf + z2 / (4.0 * nf * nf)).sqrt() / denom;

    let lower = if x == 0 { 0.0 } else { (center - half).max(0.0) };
    let upper = if x == n { 1.0 } else { (center + half).min(1.0) };
    (lower, upper)
}

/// Agresti-Coull interval for a proportion, clamped to [0, 1].
///
/// # References
///
/// Agresti, A. & Coull, B.A. (1998). "Approximate is better than 'exact'
/// for interval estimation of binomial proportions". Am. Stat., 52, 119–126.
pub fn agresti_coull_ci(x: u64, n: u64, z: f64) -> Result<Estimate> {
    check_counts(x, n)?;
    check_z(z)?;

    let z2 = z * z;
    let n_tilde = n as f64 + z2;
    let p_tilde = (x as f64 + z2 / 2.0) / n_tilde;
    let half = z * (p_tilde * (1.0 - p_tilde) / n_tilde).sqrt();
    Ok(Estimate::new(
        x as f64 / n as f64,
        (p_tilde - half).max(0.0),
        (p_tilde + half).min(1.0),
    ))
}

/// Clopper-Pearson exact interval for a proportion.
///
/// # Algorithm
///
/// The bounds are the beta quantiles `B(α/2; x, n-x+1)` and
/// `B(1-α/2; x+1, n-x)`, found here through the equivalent binomial tail
/// equations `P(X ≥ x | p_L) = α/2` and `P(X ≤ x | p_U) = α/2`, solved by
/// bisection. `p_L = 0` when `x = 0`, `p_U = 1` when `x = n`.
///
/// Coverage is at least `1 - alpha` for every true p.
///
/// # References
///
/// Clopper, C.J. & Pearson, E.S. (1934). "The use of confidence or fiducial
/// limits illustrated in the case of the binomial". Biometrika, 26, 404–413.
pub fn clopper_pearson_ci(x: u64, n: u64, alpha: f64) -> Result<Estimate> {
    check_counts(x, n)?;
    check_alpha(alpha)?;

    let half_alpha = alpha / 2.0;
    let lower = if x == 0 {
        0.0
    } else {
        bisect_increasing(|p| binomial_sf(x, n, p), half_alpha, 0.0, 1.0)
    };
    let upper = if x == n {
        1.0
    } else {
        bisect_decreasing(|p| binomial_cdf(x, n, p), half_alpha, 0.0, 1.0)
    };

    Ok(Estimate::new(x as f64 / n as f64, lower, upper))
}

/// Proportion interval at a confidence level using the selected method.
pub fn proportion_ci(
    x: u64,
    n: u64,
    confidence: f64,
    method: ProportionMethod,
) -> Result<Estimate> {
    let z = z_critical(confidence)?;
    match method {
        ProportionMethod::Wald => wald_ci(x, n, z),
        ProportionMethod::Wilson => wilson_ci(x, n, z),
        ProportionMethod::AgrestiCoull => agresti_coull_ci(x, n, z),
        ProportionMethod::ClopperPearson => clopper_pearson_ci(x, n, 1.0 - confidence),
    }
}

// ---------------------------------------------------------------------------
// Difference of proportions
// ---------------------------------------------------------------------------

/// Newcombe hybrid-score interval for `p1 - p2` (independent samples).
///
/// # Algorithm
///
/// With Wilson bounds `(l1, u1)` and `(l2, u2)`:
///
/// ```text
/// lower = d - sqrt((p1 - l1)² + (u2 - p2)²)
/// upper = d + sqrt((u1 - p1)² + (p2 - l2)²)
/// ```
///
/// Unlike the Wald interval it keeps nominal coverage near 0 and 1.
///
/// # References
///
/// Newcombe, R.G. (1998). "Interval estimation for the difference between
/// independent proportions: comparison of eleven methods". Stat. Med., 17,
/// 873–890 (method 10).
pub fn newcombe_ci(x1: u64, n1: u64, x2: u64, n2: u64, z: f64) -> Result<Estimate> {
    check_counts(x1, n1)?;
    check_counts(x2, n2)?;
    check_z(z)?;

    let p1 = x1 as f64 / n1 as f64;
    let p2 = x2 as f64 / n2 as f64;
    let (l1, u1) = wilson_bounds(x1, n1, z);
    let (l2, u2) = wilson_bounds(x2, n2, z);

    let d = p1 - p2;
    let lower = d - ((p1 - l1).powi(2) + (u2 - p2).powi(2)).sqrt();
    let upper = d + ((u1 - p1).powi(2) + (p2 - l2).powi(2)).sqrt();
    Ok(Estimate::new(d, lower, upper))
}

// ---------------------------------------------------------------------------
// Poisson counts and rates
// ---------------------------------------------------------------------------

/// Exact interval for a Poisson mean given an observed count.
///
/// ```text
/// lower = χ²(α/2; 2x) / 2        (0 when x = 0)
/// upper = χ²(1-α/2; 2x+2) / 2
/// ```
pub fn poisson_exact_ci(events: u64, alpha: f64) -> Result<Interval> {
    check_alpha(alpha)?;

    let x = events as f64;
    let lower = if events == 0 {
        0.0
    } else {
        chi_squared_quantile(alpha / 2.0, 2.0 * x)? / 2.0
    };
    let upper = chi_squared_quantile(1.0 - alpha / 2.0, 2.0 * x + 2.0)? / 2.0;
    Ok(Interval::new(lower, upper))
}

/// Incidence rate `events / person_time` with an exact Poisson interval.
///
/// # Errors
///
/// [`StatError::Data`] when person-time is not positive and finite.
pub fn incidence_rate(events: u64, person_time: f64, confidence: f64) -> Result<Estimate> {
    if !(person_time > 0.0 && person_time.is_finite()) {
        return Err(StatError::data(format!(
            "person-time must be positive, got {person_time}"
        )));
    }
    z_critical(confidence)?;

    let counts = poisson_exact_ci(events, 1.0 - confidence)?;
    Ok(Estimate::new(
        events as f64 / person_time,
        counts.lower / person_time,
        counts.upper / person_time,
    ))
}

/// Incidence-rate ratio `(e1/t1) / (e2/t2)` with a log-scale Wald interval,
/// SE = sqrt(1/e1 + 1/e2).
///
/// # Errors
///
/// [`StatError::Data`] when either count is zero or either person-time is
/// not positive.
pub fn incidence_rate_ratio(
    events1: u64,
    person_time1: f64,
    events2: u64,
    person_time2: f64,
    confidence: f64,
) -> Result<Estimate> {
    for t in [person_time1, person_time2] {
        if !(t > 0.0 && t.is_finite()) {
            return Err(StatError::data(format!(
                "person-time must be positive, got {t}"
            )));
        }
    }
    if events1 == 0 || events2 == 0 {
        return Err(StatError::data(
            "rate ratio requires at least one event in each group",
        ));
    }
    let z = z_critical(confidence)?;

    let irr = (events1 as f64 / person_time1) / (events2 as f64 / person_time2);
    let se = (1.0 / events1 as f64 + 1.0 / events2 as f64).sqrt();
    let log_ci = Interval::symmetric(irr.ln(), z * se);
    Ok(Estimate {
        value: irr,
        ci: log_ci.exp(),
    })
}
