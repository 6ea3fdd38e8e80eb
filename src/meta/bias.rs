//! Small-study effect (publication bias) tests.
//!
//! # References
//!
//! - Egger, M. et al. (1997). "Bias in meta-analysis detected by a simple,
//!   graphical test". BMJ, 315, 629–634.
//! - Begg, C.B. & Mazumdar, M. (1994). "Operating characteristics of a rank
//!   correlation test for publication bias". Biometrics, 50, 1088–1101.

use u_numflow::stats;

use super::{validate_studies, StudyEffect};
use crate::error::{Result, StatError};
use crate::special::{normal_two_sided_p, student_t_two_sided_p};

/// Egger's regression test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EggerResult {
    /// Regression intercept; zero under funnel symmetry.
    pub intercept: f64,
    /// Standard error of the intercept.
    pub se: f64,
    /// t statistic of the intercept.
    pub t: f64,
    /// Residual degrees of freedom, `k − 2`.
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Slope, an estimate of the effect in an infinitely precise study.
    pub slope: f64,
}

/// Begg and Mazumdar's rank-correlation test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeggResult {
    /// Kendall's τ_b between standardized effects and variances.
    pub tau: f64,
    /// Normal statistic of the concordance score.
    pub z: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Egger's test: OLS of the standard normal deviate `θᵢ/SEᵢ` on the
/// precision `1/SEᵢ`.
///
/// # Algorithm
///
/// ```text
/// yᵢ = θᵢ/SEᵢ,  xᵢ = 1/SEᵢ
/// yᵢ = β₀ + β₁xᵢ + εᵢ
/// SE(β₀) = sqrt(MSE·(1/k + x̄²/Sxx)),  t = β₀/SE(β₀) on k − 2 df
/// ```
///
/// # Errors
///
/// [`StatError::Data`] for fewer than 3 studies or when every study has the
/// same precision; [`StatError::Domain`] for an invalid study.
pub fn egger_test(studies: &[StudyEffect]) -> Result<EggerResult> {
    validate_studies(studies, 3)?;
    let x: Vec<f64> = studies.iter().map(|s| 1.0 / s.se()).collect();
    let y: Vec<f64> = studies.iter().map(|s| s.effect / s.se()).collect();

    let insufficient = || StatError::data("Egger regression needs at least 3 studies");
    let x_mean = stats::mean(&x).ok_or_else(insufficient)?;
    let y_mean = stats::mean(&y).ok_or_else(insufficient)?;
    let x_var = stats::variance(&x).ok_or_else(insufficient)?;
    let cov = stats::covariance(&x, &y).ok_or_else(insufficient)?;
    if x_var < 1e-300 {
        return Err(StatError::data(
            "Egger regression is undefined when all studies have the same precision",
        ));
    }

    let slope = cov / x_var;
    let intercept = y_mean - slope * x_mean;

    let ss_res: f64 = x
        .iter()
        .zip(&y)
        .map(|(&xi, &yi)| (yi - intercept - slope * xi).powi(2))
        .sum();
    let ss_x: f64 = x.iter().map(|&xi| (xi - x_mean).powi(2)).sum();
    let k = x.len() as f64;
    let df = k - 2.0;
    let mse = ss_res / df;
    let se = (mse * (1.0 / k + x_mean * x_mean / ss_x)).sqrt();

    let t = if se > 1e-300 {
        intercept / se
    } else if intercept == 0.0 {
        0.0
    } else {
        intercept.signum() * f64::INFINITY
    };

    Ok(EggerResult {
        intercept,
        se,
        t,
        df,
        p_value: student_t_two_sided_p(t, df),
        slope,
    })
}

/// Begg's test: Kendall's τ between the standardized deviates
/// `(θᵢ − θ_FE)/sqrt(vᵢ − 1/Σwⱼ)` and the variances `vᵢ`.
///
/// The p-value uses the normal approximation of the concordance score
/// `S = C − D` with tie-corrected variance.
///
/// # Errors
///
/// [`StatError::Data`] for fewer than 3 studies or when every study has the
/// same variance.
pub fn begg_test(studies: &[StudyEffect]) -> Result<BeggResult> {
    validate_studies(studies, 3)?;

    let sum_w: f64 = studies.iter().map(|s| 1.0 / s.variance).sum();
    let theta_fe = studies.iter().map(|s| s.effect / s.variance).sum::<f64>() / sum_w;
    let v_fe = 1.0 / sum_w;

    let deviates: Vec<f64> = studies
        .iter()
        .map(|s| (s.effect - theta_fe) / (s.variance - v_fe).sqrt())
        .collect();
    let variances: Vec<f64> = studies.iter().map(|s| s.variance).collect();

    let n = studies.len();
    let mut concordant: i64 = 0;
    let mut discordant: i64 = 0;
    let mut ties_x: i64 = 0;
    let mut ties_y: i64 = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = deviates[i] - deviates[j];
            let dy = variances[i] - variances[j];
            if dx == 0.0 {
                ties_x += 1;
            }
            if dy == 0.0 {
                ties_y += 1;
            }
            if dx != 0.0 && dy != 0.0 {
                if dx * dy > 0.0 {
                    concordant += 1;
                } else {
                    discordant += 1;
                }
            }
        }
    }

    let n0 = (n as i64) * (n as i64 - 1) / 2;
    let denom_sq = (n0 - ties_x) as f64 * (n0 - ties_y) as f64;
    if denom_sq <= 0.0 {
        return Err(StatError::data(
            "rank correlation is undefined when all deviates or variances are tied",
        ));
    }
    let s = (concordant - discordant) as f64;
    let tau = (s / denom_sq.sqrt()).clamp(-1.0, 1.0);

    let nf = n as f64;
    let var_s = (nf * (nf - 1.0) * (2.0 * nf + 5.0)
        - tie_variance_term(&deviates)
        - tie_variance_term(&variances))
        / 18.0;
    let z = if var_s > 0.0 { s / var_s.sqrt() } else { 0.0 };

    Ok(BeggResult {
        tau,
        z,
        p_value: normal_two_sided_p(z),
    })
}

/// `Σ t(t − 1)(2t + 5)` over groups of tied values.
fn tie_variance_term(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut result = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let t = (j - i) as f64;
        if t > 1.0 {
            result += t * (t - 1.0) * (2.0 * t + 5.0);
        }
        i = j;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::pooling::reference_studies;

    #[test]
    fn test_egger_reference() {
        let r = egger_test(&reference_studies()).expect("valid");
        assert!((r.intercept - -0.027_094_956_014_070).abs() < 1e-10);
        assert!((r.se - 2.600_806_584_581_541).abs() < 1e-9);
        assert!((r.t - -0.010_417_905_035_575).abs() < 1e-10);
        assert_eq!(r.df, 4.0);
        assert!((r.p_value - 0.992_186_747_887_634).abs() < 1e-5);
        assert!((r.slope - -0.303_935_538_606_276).abs() < 1e-10);
    }

    #[test]
    fn test_egger_perfect_fit() {
        // θᵢ/SEᵢ = 1 + 0.5/SEᵢ exactly: intercept 1, zero residual.
        let studies: Vec<_> = [0.25_f64, 0.5, 1.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &se)| {
                StudyEffect::new(format!("S{i}"), se + 0.5, se * se).expect("valid")
            })
            .collect();
        let r = egger_test(&studies).expect("valid");
        assert!((r.intercept - 1.0).abs() < 1e-9);
        assert!((r.slope - 0.5).abs() < 1e-9);
        assert!(r.p_value < 1e-6);
    }

    #[test]
    fn test_egger_errors() {
        let two = &reference_studies()[..2];
        assert!(egger_test(two).unwrap_err().is_data());

        let same_precision: Vec<_> = (0..4)
            .map(|i| StudyEffect::new(format!("S{i}"), i as f64, 0.1).expect("valid"))
            .collect();
        assert!(egger_test(&same_precision).unwrap_err().is_data());
    }

    #[test]
    fn test_begg_reference() {
        // 7 concordant, 8 discordant pairs.
        let r = begg_test(&reference_studies()).expect("valid");
        assert!((r.tau - -1.0 / 15.0).abs() < 1e-12);
        assert!((r.z - -0.187_867_287_325_545).abs() < 1e-10);
        assert!((r.p_value - 0.850_980_687_032_056).abs() < 1e-5);
    }

    #[test]
    fn test_begg_errors() {
        assert!(begg_test(&reference_studies()[..2]).unwrap_err().is_data());
        let same: Vec<_> = (0..4)
            .map(|i| StudyEffect::new(format!("S{i}"), i as f64, 0.1).expect("valid"))
            .collect();
        assert!(begg_test(&same).unwrap_err().is_data());
    }
}
