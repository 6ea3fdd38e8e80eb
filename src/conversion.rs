//! Conversions between effect measures.
//!
//! Used to bring studies reporting different measures onto a common scale
//! before pooling.
//!
//! # Examples
//!
//! ```
//! use u_biostat::conversion::{or_to_rr, rr_to_or};
//!
//! // OR 2.0 at 20% baseline risk corresponds to RR ≈ 1.667.
//! let rr = or_to_rr(2.0, 0.2).unwrap();
//! assert!((rr - 2.0 / 1.2).abs() < 1e-12);
//! assert!((rr_to_or(rr, 0.2).unwrap() - 2.0).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! - Zhang, J. & Yu, K.F. (1998). "What's the relative risk?". JAMA, 280(19).
//! - Chinn, S. (2000). "A simple method for converting an odds ratio to
//!   effect size for use in meta-analysis". Stat Med, 19, 3127–3131.
//! - Hedges, L.V. & Olkin, I. (1985). *Statistical Methods for
//!   Meta-Analysis*. Academic Press.

use crate::error::{Result, StatError};
use crate::interval::{Estimate, Interval};
use crate::special::z_critical;

/// Conventional rounded value of `π/√3 ≈ 1.8138`, the ratio between the
/// logistic and standard normal SDs.
pub const LOGIT_PROBIT_SCALE: f64 = 1.81;

fn check_ratio(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(StatError::domain(format!("{name} must be positive and finite, got {value}")))
    }
}

fn check_baseline(p0: f64) -> Result<()> {
    if p0 > 0.0 && p0 < 1.0 {
        Ok(())
    } else {
        Err(StatError::domain(format!("baseline risk must be in (0, 1), got {p0}")))
    }
}

// ---------------------------------------------------------------------------
// Ratio measures
// ---------------------------------------------------------------------------

/// Odds ratio to risk ratio at baseline risk `p0`.
///
/// ```text
/// RR = OR / (1 − p0 + p0·OR)
/// ```
///
/// # Errors
///
/// [`StatError::Domain`] for a non-positive OR or `p0 ∉ (0, 1)`.
pub fn or_to_rr(or: f64, p0: f64) -> Result<f64> {
    check_ratio("odds ratio", or)?;
    check_baseline(p0)?;
    Ok(or / (1.0 - p0 + p0 * or))
}

/// Risk ratio to odds ratio at baseline risk `p0`.
///
/// ```text
/// OR = RR(1 − p0) / (1 − RR·p0)
/// ```
///
/// # Errors
///
/// [`StatError::Domain`] for a non-positive RR, `p0 ∉ (0, 1)`, or
/// `RR·p0 ≥ 1` (the implied exposed risk would reach 1).
pub fn rr_to_or(rr: f64, p0: f64) -> Result<f64> {
    check_ratio("risk ratio", rr)?;
    check_baseline(p0)?;
    if rr * p0 >= 1.0 {
        return Err(StatError::domain(format!(
            "RR·p0 must be below 1, got {}",
            rr * p0
        )));
    }
    Ok(rr * (1.0 - p0) / (1.0 - rr * p0))
}

// ---------------------------------------------------------------------------
// Standardized mean differences
// ---------------------------------------------------------------------------

/// Odds ratio to Cohen's d: `ln(OR) / 1.81`.
pub fn or_to_d(or: f64) -> Result<f64> {
    check_ratio("odds ratio", or)?;
    Ok(or.ln() / LOGIT_PROBIT_SCALE)
}

/// Cohen's d to odds ratio: `exp(1.81·d)`.
pub fn d_to_or(d: f64) -> Result<f64> {
    if !d.is_finite() {
        return Err(StatError::domain("d must be finite"));
    }
    Ok((LOGIT_PROBIT_SCALE * d).exp())
}

/// Hedges' small-sample correction factor `J = 1 − 3/(4(n1 + n2 − 2) − 1)`.
///
/// # Errors
///
/// [`StatError::Data`] when `n1 + n2 < 3`.
pub fn hedges_correction(n1: u64, n2: u64) -> Result<f64> {
    let n = n1 + n2;
    if n < 3 {
        return Err(StatError::data(format!(
            "Hedges' correction needs n1 + n2 ≥ 3, got {n}"
        )));
    }
    let df = (n - 2) as f64;
    Ok(1.0 - 3.0 / (4.0 * df - 1.0))
}

/// Cohen's d to Hedges' g.
pub fn d_to_hedges_g(d: f64, n1: u64, n2: u64) -> Result<f64> {
    Ok(d * hedges_correction(n1, n2)?)
}

/// Hedges' g back to Cohen's d.
pub fn hedges_g_to_d(g: f64, n1: u64, n2: u64) -> Result<f64> {
    Ok(g / hedges_correction(n1, n2)?)
}

/// Cohen's d to point-biserial r, equal group sizes: `d / sqrt(d² + 4)`.
pub fn d_to_r(d: f64) -> Result<f64> {
    if !d.is_finite() {
        return Err(StatError::domain("d must be finite"));
    }
    Ok(d / (d * d + 4.0).sqrt())
}

/// Point-biserial r to Cohen's d: `2r / sqrt(1 − r²)`.
///
/// # Errors
///
/// [`StatError::Domain`] unless `-1 < r < 1`.
pub fn r_to_d(r: f64) -> Result<f64> {
    if !(r > -1.0 && r < 1.0) {
        return Err(StatError::domain(format!("r must be in (-1, 1), got {r}")));
    }
    Ok(2.0 * r / (1.0 - r * r).sqrt())
}

// ---------------------------------------------------------------------------
// Scales and standard errors
// ---------------------------------------------------------------------------

/// Ratio estimate to the log scale used for pooling.
///
/// # Errors
///
/// [`StatError::Domain`] when the value or a bound is not positive.
pub fn to_log_scale(estimate: Estimate) -> Result<Estimate> {
    let Estimate { value, ci } = estimate;
    check_ratio("ratio", value)?;
    check_ratio("lower bound", ci.lower)?;
    check_ratio("upper bound", ci.upper)?;
    Ok(estimate.ln())
}

/// Log-scale estimate back to the ratio scale.
pub fn from_log_scale(estimate: Estimate) -> Estimate {
    estimate.exp()
}

/// Standard error implied by a symmetric (or log-symmetric) CI.
///
/// ```text
/// SE = (g(upper) − g(lower)) / (2·z)     g = ln if log_scale else identity
/// ```
///
/// # Errors
///
/// [`StatError::Domain`] for an invalid confidence level, `upper < lower`,
/// or non-positive bounds on the log scale.
pub fn se_from_ci(lower: f64, upper: f64, confidence: f64, log_scale: bool) -> Result<f64> {
    let z = z_critical(confidence)?;
    let Interval { lower, upper } = if log_scale {
        check_ratio("lower bound", lower)?;
        check_ratio("upper bound", upper)?;
        Interval::new(lower, upper).ln()
    } else {
        Interval::new(lower, upper)
    };
    if !(lower.is_finite() && upper.is_finite()) || upper < lower {
        return Err(StatError::domain(format!(
            "invalid interval [{lower}, {upper}]"
        )));
    }
    Ok((upper - lower) / (2.0 * z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logit_probit_scale_is_rounded_pi_over_sqrt3() {
        let exact = std::f64::consts::PI / 3.0_f64.sqrt();
        assert_eq!(LOGIT_PROBIT_SCALE, (exact * 100.0).round() / 100.0);
    }

    #[test]
    fn test_or_to_rr_rare_outcome() {
        // At low baseline risk the OR approximates the RR.
        let rr = or_to_rr(1.5, 0.001).expect("valid");
        assert!((rr - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_rr_to_or_rejects_impossible_risk() {
        assert!(rr_to_or(2.5, 0.4).unwrap_err().is_domain());
        assert!(rr_to_or(2.0, 0.5).unwrap_err().is_domain());
        assert!(rr_to_or(1.9, 0.5).is_ok());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(or_to_rr(0.0, 0.2).unwrap_err().is_domain());
        assert!(or_to_rr(2.0, 1.0).unwrap_err().is_domain());
        assert!(or_to_d(-1.0).unwrap_err().is_domain());
        assert!(r_to_d(1.0).unwrap_err().is_domain());
        assert!(hedges_correction(1, 1).unwrap_err().is_data());
    }

    #[test]
    fn test_or_to_d() {
        let d = or_to_d(std::f64::consts::E).expect("valid");
        assert!((d - 1.0 / 1.81).abs() < 1e-12);
        assert!((or_to_d(1.0).expect("valid")).abs() < 1e-15);
    }

    #[test]
    fn test_hedges_correction() {
        // n1 = n2 = 10: J = 1 − 3/71
        let j = hedges_correction(10, 10).expect("valid");
        assert!((j - (1.0 - 3.0 / 71.0)).abs() < 1e-15);
        let g = d_to_hedges_g(0.5, 10, 10).expect("valid");
        assert!(g < 0.5);
    }

    #[test]
    fn test_d_r_known_value() {
        // d = 0.5 ⇒ r = 0.5 / sqrt(4.25)
        let r = d_to_r(0.5).expect("valid");
        assert!((r - 0.242_535_625_036_333).abs() < 1e-12);
    }

    #[test]
    fn test_se_from_ci() {
        // OR 0.642857 with CI (0.440120, 0.938984) has log SE 0.193307.
        let se = se_from_ci(0.440_119_867_832_754, 0.938_983_527_731_792, 0.95, true)
            .expect("valid");
        assert!((se - 0.193_307_332_679_66).abs() < 1e-9);

        let se = se_from_ci(-1.959_963_984_540_054, 1.959_963_984_540_054, 0.95, false)
            .expect("valid");
        assert!((se - 1.0).abs() < 1e-9);

        assert!(se_from_ci(2.0, 1.0, 0.95, false).unwrap_err().is_domain());
        assert!(se_from_ci(0.0, 1.0, 0.95, true).unwrap_err().is_domain());
    }

    #[test]
    fn test_log_scale_roundtrip() {
        let e = Estimate::new(0.64, 0.44, 0.94);
        let back = from_log_scale(to_log_scale(e).expect("positive"));
        assert!((back.value - 0.64).abs() < 1e-12);
        assert!((back.ci.upper - 0.94).abs() < 1e-12);
        assert!(to_log_scale(Estimate::new(0.5, 0.0, 1.0))
            .unwrap_err()
            .is_domain());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rr_or_roundtrip(rr in 0.05_f64..5.0, p0 in 0.01_f64..0.99) {
            prop_assume!(rr * p0 < 0.99);
            let or = rr_to_or(rr, p0).expect("valid");
            let back = or_to_rr(or, p0).expect("valid");
            prop_assert!((back - rr).abs() < 1e-9, "rr={rr}, p0={p0}, back={back}");
        }

        #[test]
        fn d_conversions_roundtrip(d in -3.0_f64..3.0, n1 in 2_u64..200, n2 in 2_u64..200) {
            let or = d_to_or(d).expect("finite");
            prop_assert!((or_to_d(or).expect("positive") - d).abs() < 1e-9);

            let g = d_to_hedges_g(d, n1, n2).expect("n ≥ 3");
            prop_assert!((hedges_g_to_d(g, n1, n2).expect("n ≥ 3") - d).abs() < 1e-9);

            let r = d_to_r(d).expect("finite");
            prop_assert!((r_to_d(r).expect("|r| < 1") - d).abs() < 1e-9);
        }
    }
}
