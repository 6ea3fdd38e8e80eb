//! Inverse-variance pooling.

use super::{validate_studies, EffectModel, MetaOptions, PooledResult, StudyEffect};
use crate::error::{Result, StatError};
use crate::interval::Interval;
use crate::special::{
    chi_squared_sf, normal_two_sided_p, student_t_two_sided_p, t_critical, z_critical,
};

/// Pools study effects under `options`.
///
/// # Algorithm
///
/// ```text
/// wᵢ = 1/vᵢ,  θ_FE = Σwᵢθᵢ / Σwᵢ
/// Q  = Σwᵢ(θᵢ − θ_FE)²,  df = k − 1
/// τ² = max(0, (Q − df) / (S₁ − S₂/S₁))      S₁ = Σwᵢ, S₂ = Σwᵢ²
/// wᵢ* = 1/(vᵢ + τ²)   (random effects; τ² taken as 0 for fixed effect)
/// θ̂ = Σwᵢ*θᵢ / Σwᵢ*,  Var(θ̂) = 1/Σwᵢ*
/// ```
///
/// With HKSJ the variance becomes `q*/Σwᵢ*` where
/// `q* = Σwᵢ*(θᵢ − θ̂)²/(k − 1)`, and the CI and test use t(k − 1).
///
/// The prediction interval `θ̂ ± t_{k−2}·sqrt(τ² + 1/Σwᵢ*)` is reported for
/// random effects with k ≥ 3. Heterogeneity statistics (Q, I², H², τ²) are
/// reported under both models.
///
/// # Errors
///
/// - [`StatError::Data`] for fewer than 2 studies, or fewer than 3 with HKSJ.
/// - [`StatError::Domain`] for an invalid study or confidence level.
pub fn pool(studies: &[StudyEffect], options: &MetaOptions) -> Result<PooledResult> {
    validate_studies(studies, 2)?;
    let k = studies.len();
    if options.hksj && k < 3 {
        return Err(StatError::data(format!(
            "HKSJ adjustment needs at least 3 studies, got {k}"
        )));
    }
    let z = z_critical(options.confidence)?;

    // Fixed-effect pass for Q and τ².
    let w: Vec<f64> = studies.iter().map(|s| 1.0 / s.variance).collect();
    let s1: f64 = w.iter().sum();
    let s2: f64 = w.iter().map(|wi| wi * wi).sum();
    let theta_fe = weighted_mean(studies, &w, s1);

    let q: f64 = studies
        .iter()
        .zip(&w)
        .map(|(s, wi)| wi * (s.effect - theta_fe).powi(2))
        .sum();
    let df = (k - 1) as f64;
    let c = s1 - s2 / s1;
    let raw_tau2 = if c > 0.0 { (q - df) / c } else { 0.0 };
    let tau2 = if raw_tau2 > 0.0 {
        raw_tau2
    } else {
        if raw_tau2 < 0.0 {
            tracing::debug!(q, df, raw_tau2, "negative tau² truncated to zero");
        }
        0.0
    };
    let i2 = if q > 0.0 { ((q - df) / q).max(0.0) } else { 0.0 };
    let h2 = q / df;
    let p_het = chi_squared_sf(q, df);

    // Model pass.
    let model_tau2 = match options.model {
        EffectModel::Fixed => 0.0,
        EffectModel::Random => tau2,
    };
    let w_star: Vec<f64> = studies
        .iter()
        .map(|s| 1.0 / (s.variance + model_tau2))
        .collect();
    let sw_star: f64 = w_star.iter().sum();
    let pooled = weighted_mean(studies, &w_star, sw_star);
    let model_var = 1.0 / sw_star;

    let (se, ci, statistic, p_value) = if options.hksj {
        let q_star = studies
            .iter()
            .zip(&w_star)
            .map(|(s, wi)| wi * (s.effect - pooled).powi(2))
            .sum::<f64>()
            / df;
        let se = (q_star / sw_star).sqrt();
        let t_crit = t_critical(options.confidence, df)?;
        if se > 0.0 {
            let t = pooled / se;
            (
                se,
                Interval::symmetric(pooled, t_crit * se),
                t,
                student_t_two_sided_p(t, df),
            )
        } else {
            // Every study sits on the pooled value.
            let p = if pooled == 0.0 { 1.0 } else { 0.0 };
            let t = if pooled == 0.0 {
                0.0
            } else {
                pooled.signum() * f64::INFINITY
            };
            (0.0, Interval::new(pooled, pooled), t, p)
        }
    } else {
        let se = model_var.sqrt();
        let stat = pooled / se;
        (
            se,
            Interval::symmetric(pooled, z * se),
            stat,
            normal_two_sided_p(stat),
        )
    };

    let prediction_interval = if options.prediction_interval
        && options.model == EffectModel::Random
        && k >= 3
    {
        let t_pi = t_critical(options.confidence, (k - 2) as f64)?;
        Some(Interval::symmetric(pooled, t_pi * (tau2 + model_var).sqrt()))
    } else {
        None
    };

    let weights = w_star.iter().map(|wi| 100.0 * wi / sw_star).collect();

    Ok(PooledResult {
        model: options.model,
        k,
        pooled,
        se,
        ci,
        statistic,
        p_value,
        q,
        df,
        p_het,
        i2,
        h2,
        tau2,
        tau: tau2.sqrt(),
        prediction_interval,
        weights,
        hksj: options.hksj,
    })
}

/// Fixed-effect (inverse-variance) pooling.
pub fn fixed_effect(studies: &[StudyEffect], confidence: f64) -> Result<PooledResult> {
    pool(studies, &MetaOptions::fixed(confidence))
}

/// DerSimonian-Laird random-effects pooling with a prediction interval.
pub fn random_effects(studies: &[StudyEffect], confidence: f64) -> Result<PooledResult> {
    pool(studies, &MetaOptions::random(confidence))
}

fn weighted_mean(studies: &[StudyEffect], w: &[f64], sum_w: f64) -> f64 {
    studies
        .iter()
        .zip(w)
        .map(|(s, wi)| wi * s.effect)
        .sum::<f64>()
        / sum_w
}

#[cfg(test)]
pub(super) fn reference_studies() -> Vec<StudyEffect> {
    let effects = [-0.5, -0.3, -0.1, -0.7, 0.1, -0.4];
    let variances = [0.04, 0.09, 0.05, 0.12, 0.08, 0.06];
    effects
        .iter()
        .zip(variances)
        .enumerate()
        .map(|(i, (&e, v))| StudyEffect::new(format!("S{}", i + 1), e, v).expect("valid"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_fixed_effect_reference() {
        let r = fixed_effect(&reference_studies(), 0.95).expect("valid");
        assert_eq!(r.model, EffectModel::Fixed);
        assert!(close(r.pooled, -0.310_682_492_581_602, 1e-12));
        assert!(close(r.se, 0.103_356_144_382_433, 1e-12));
        assert!(close(r.ci.lower, -0.513_256_813_152_093, 1e-8));
        assert!(close(r.ci.upper, -0.108_108_172_011_112, 1e-8));
        assert!(r.prediction_interval.is_none());
    }

    #[test]
    fn test_heterogeneity_reference() {
        let r = random_effects(&reference_studies(), 0.95).expect("valid");
        assert!(close(r.q, 5.289_317_507_418_398, 1e-10));
        assert_eq!(r.df, 5.0);
        assert!(close(r.p_het, 0.381_601_053_089_811, 1e-5));
        assert!(close(r.tau2, 0.003_808_593_75, 1e-12));
        assert!(close(r.i2, 0.054_698_457_223_001, 1e-10));
        assert!(close(r.h2, 1.057_863_501_483_680, 1e-10));
    }

    #[test]
    fn test_random_effects_reference() {
        let r = random_effects(&reference_studies(), 0.95).expect("valid");
        assert_eq!(r.model, EffectModel::Random);
        assert!(close(r.pooled, -0.309_955_766_932_005, 1e-10));
        assert!(close(r.se, 0.106_751_024_510_404, 1e-10));
        assert!(close(r.ci.lower, -0.519_183_930_285_149, 1e-8));
        assert!(close(r.ci.upper, -0.100_727_603_578_861, 1e-8));
        assert!(close(r.p_value, 0.003_689_709_689_531, 1e-5));

        let expected = [26.0126615774, 12.1479075407, 21.1783665765, 9.2043539861, 13.5973898667, 17.8593204525];
        for (w, e) in r.weights.iter().zip(expected) {
            assert!(close(*w, e, 1e-8), "{w} vs {e}");
        }

        let pi = r.prediction_interval.expect("k ≥ 3");
        assert!(close(pi.lower, -0.652_308_167_283_428, 1e-5));
        assert!(close(pi.upper, 0.032_396_633_419_418, 1e-5));
    }

    #[test]
    fn test_hksj_reference() {
        let opts = MetaOptions {
            hksj: true,
            ..MetaOptions::default()
        };
        let r = pool(&reference_studies(), &opts).expect("valid");
        assert!(r.hksj);
        assert!(close(r.se, 0.106_813_871_923_291, 1e-10));
        assert!(close(r.ci.lower, -0.584_529_565_892_002, 1e-5));
        assert!(close(r.ci.upper, -0.035_381_967_972_008, 1e-5));
        assert!(close(r.p_value, 0.033_718_746_753_796, 1e-5));
    }

    #[test]
    fn test_hksj_needs_three_studies() {
        let studies = &reference_studies()[..2];
        let opts = MetaOptions {
            hksj: true,
            ..MetaOptions::default()
        };
        assert!(pool(studies, &opts).unwrap_err().is_data());
        assert!(pool(studies, &MetaOptions::default()).is_ok());
    }

    #[test]
    fn test_identical_studies() {
        let studies: Vec<_> = (0..5)
            .map(|i| StudyEffect::new(format!("S{i}"), 0.5, 0.25).expect("valid"))
            .collect();
        let fe = fixed_effect(&studies, 0.95).expect("valid");
        let re = random_effects(&studies, 0.95).expect("valid");
        assert_eq!(re.tau2, 0.0);
        assert_eq!(re.i2, 0.0);
        assert_eq!(fe.pooled, 0.5);
        assert_eq!(re.pooled, 0.5);
        assert!(close(fe.se, re.se, 1e-15));

        let opts = MetaOptions {
            hksj: true,
            ..MetaOptions::default()
        };
        let h = pool(&studies, &opts).expect("valid");
        assert_eq!(h.se, 0.0);
        assert_eq!(h.p_value, 0.0);
    }

    #[test]
    fn test_too_few_or_invalid_studies() {
        let one = &reference_studies()[..1];
        assert!(random_effects(one, 0.95).unwrap_err().is_data());

        let mut bad = reference_studies();
        bad[2].variance = 0.0;
        assert!(random_effects(&bad, 0.95).unwrap_err().is_domain());
        assert!(random_effects(&reference_studies(), 1.5)
            .unwrap_err()
            .is_domain());
    }
}
