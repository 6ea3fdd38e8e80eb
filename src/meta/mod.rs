//! Meta-analysis of study effect estimates.
//!
//! Effects are pooled on an additive scale: log OR / log RR for ratio
//! measures, the raw difference for risk differences and mean differences.
//!
//! # Models
//!
//! - Fixed effect: inverse-variance weights `1/vᵢ`.
//! - Random effects: DerSimonian-Laird τ², weights `1/(vᵢ + τ²)`, with the
//!   optional Hartung-Knapp-Sidik-Jonkman (HKSJ) adjustment and a
//!   prediction interval.
//!
//! Every variant, including [`leave_one_out`] and [`cumulative`], runs
//! through the single routine [`pool`].
//!
//! # Examples
//!
//! ```
//! use u_biostat::meta::{pool, MetaOptions, StudyEffect};
//!
//! let studies = vec![
//!     StudyEffect::new("A", -0.5, 0.04).unwrap(),
//!     StudyEffect::new("B", -0.3, 0.09).unwrap(),
//!     StudyEffect::new("C", -0.1, 0.05).unwrap(),
//! ];
//! let r = pool(&studies, &MetaOptions::default()).unwrap();
//! assert_eq!(r.k, 3);
//! assert!(r.ci.lower < r.pooled && r.pooled < r.ci.upper);
//! let total: f64 = r.weights.iter().sum();
//! assert!((total - 100.0).abs() < 1e-9);
//! ```
//!
//! # References
//!
//! - DerSimonian, R. & Laird, N. (1986). "Meta-analysis in clinical
//!   trials". Controlled Clinical Trials, 7, 177–188.
//! - Higgins, J.P.T. & Thompson, S.G. (2002). "Quantifying heterogeneity in
//!   a meta-analysis". Stat Med, 21, 1539–1558.
//! - IntHout, J., Ioannidis, J.P.A. & Borm, G.F. (2014). "The
//!   Hartung-Knapp-Sidik-Jonkman method for random effects meta-analysis is
//!   straightforward and considerably outperforms the standard
//!   DerSimonian-Laird method". BMC Med Res Methodol, 14, 25.

mod bias;
mod pooling;
mod sensitivity;

pub use bias::{begg_test, egger_test, BeggResult, EggerResult};
pub use pooling::{fixed_effect, pool, random_effects};
pub use sensitivity::{cumulative, cumulative_by_key, leave_one_out, CumulativeStep, LeaveOneOut};

use crate::conversion::se_from_ci;
use crate::error::{Result, StatError};
use crate::interval::{Estimate, Interval};
use crate::table::{odds_ratio, risk_difference, risk_ratio, ContingencyTable};

/// One study's effect on the pooling scale.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StudyEffect {
    /// Study label, carried into sensitivity results.
    pub name: String,
    /// Effect estimate (log scale for ratio measures).
    pub effect: f64,
    /// Within-study variance, strictly positive.
    pub variance: f64,
}

/// Measure extracted from a 2x2 table by [`StudyEffect::from_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryMeasure {
    /// Log odds ratio, Woolf variance.
    OddsRatio,
    /// Log risk ratio.
    RiskRatio,
    /// Risk difference, Wald variance.
    RiskDifference,
}

impl StudyEffect {
    /// Creates a study effect.
    ///
    /// # Errors
    ///
    /// [`StatError::Domain`] for a non-finite effect or a non-positive or
    /// non-finite variance.
    pub fn new(name: impl Into<String>, effect: f64, variance: f64) -> Result<Self> {
        let study = Self {
            name: name.into(),
            effect,
            variance,
        };
        study.validate()?;
        Ok(study)
    }

    /// Extracts an effect from a 2x2 table. Ratio measures apply the usual
    /// zero-cell correction.
    ///
    /// # Errors
    ///
    /// [`StatError::Data`] when a row is empty; [`StatError::Domain`] when a
    /// risk difference has zero variance (both risks are 0 or 1).
    pub fn from_table(
        name: impl Into<String>,
        table: &ContingencyTable,
        measure: BinaryMeasure,
    ) -> Result<Self> {
        let (effect, se) = match measure {
            BinaryMeasure::OddsRatio => {
                let r = odds_ratio(table, 0.95)?;
                (r.estimate.value.ln(), r.log_se)
            }
            BinaryMeasure::RiskRatio => {
                let r = risk_ratio(table, 0.95)?;
                (r.estimate.value.ln(), r.log_se)
            }
            BinaryMeasure::RiskDifference => {
                let r = risk_difference(table, 0.95)?;
                (r.estimate.value, r.se)
            }
        };
        Self::new(name, effect, se * se)
    }

    /// Recovers an effect from a reported estimate and CI. With `log_scale`
    /// the estimate is a ratio and is pooled as its logarithm.
    ///
    /// # Errors
    ///
    /// [`StatError::Domain`] for an invalid interval or confidence level.
    pub fn from_ci(
        name: impl Into<String>,
        estimate: Estimate,
        confidence: f64,
        log_scale: bool,
    ) -> Result<Self> {
        let se = se_from_ci(estimate.ci.lower, estimate.ci.upper, confidence, log_scale)?;
        let effect = if log_scale {
            if !(estimate.value > 0.0) {
                return Err(StatError::domain(format!(
                    "ratio estimate must be positive, got {}",
                    estimate.value
                )));
            }
            estimate.value.ln()
        } else {
            estimate.value
        };
        Self::new(name, effect, se * se)
    }

    /// Within-study standard error.
    pub fn se(&self) -> f64 {
        self.variance.sqrt()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.effect.is_finite() {
            return Err(StatError::domain(format!(
                "study '{}': effect must be finite",
                self.name
            )));
        }
        if !(self.variance.is_finite() && self.variance > 0.0) {
            return Err(StatError::domain(format!(
                "study '{}': variance must be positive and finite, got {}",
                self.name, self.variance
            )));
        }
        Ok(())
    }
}

/// Weighting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectModel {
    /// Common-effect, inverse-variance weights.
    Fixed,
    /// DerSimonian-Laird random effects.
    #[default]
    Random,
}

/// Pooling options.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaOptions {
    /// Weighting model.
    pub model: EffectModel,
    /// Confidence level for the pooled CI and prediction interval.
    pub confidence: f64,
    /// Use the HKSJ variance and t(k − 1) reference distribution.
    pub hksj: bool,
    /// Report a prediction interval (random effects, k ≥ 3).
    pub prediction_interval: bool,
}

impl Default for MetaOptions {
    fn default() -> Self {
        Self {
            model: EffectModel::Random,
            confidence: 0.95,
            hksj: false,
            prediction_interval: true,
        }
    }
}

impl MetaOptions {
    /// Fixed-effect options at the given confidence level.
    pub fn fixed(confidence: f64) -> Self {
        Self {
            model: EffectModel::Fixed,
            confidence,
            hksj: false,
            prediction_interval: false,
        }
    }

    /// Random-effects options at the given confidence level.
    pub fn random(confidence: f64) -> Self {
        Self {
            confidence,
            ..Self::default()
        }
    }

    /// Smallest number of studies these options can pool.
    pub fn min_studies(&self) -> usize {
        if self.hksj {
            3
        } else {
            2
        }
    }
}

/// Pooled estimate with heterogeneity statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PooledResult {
    /// Weighting model used.
    pub model: EffectModel,
    /// Number of studies.
    pub k: usize,
    /// Pooled effect.
    pub pooled: f64,
    /// Standard error of the pooled effect (HKSJ-adjusted when requested).
    pub se: f64,
    /// Confidence interval of the pooled effect.
    pub ci: Interval,
    /// Test statistic for H₀: effect = 0; z, or t on k − 1 df under HKSJ.
    pub statistic: f64,
    /// Two-sided p-value of `statistic`.
    pub p_value: f64,
    /// Cochran's Q.
    pub q: f64,
    /// Degrees of freedom of Q, `k − 1`.
    pub df: f64,
    /// p-value of Q on χ²(df).
    pub p_het: f64,
    /// I² as a fraction in [0, 1].
    pub i2: f64,
    /// H² = Q / df.
    pub h2: f64,
    /// DerSimonian-Laird between-study variance.
    pub tau2: f64,
    /// `sqrt(tau2)`.
    pub tau: f64,
    /// Prediction interval for the effect in a new study.
    pub prediction_interval: Option<Interval>,
    /// Per-study weights in percent, in input order.
    pub weights: Vec<f64>,
    /// Whether the HKSJ adjustment was applied.
    pub hksj: bool,
}

impl PooledResult {
    /// Pooled effect with its CI.
    pub fn estimate(&self) -> Estimate {
        Estimate {
            value: self.pooled,
            ci: self.ci,
        }
    }
}

pub(crate) fn validate_studies(studies: &[StudyEffect], min: usize) -> Result<()> {
    if studies.len() < min {
        return Err(StatError::data(format!(
            "need at least {min} studies, got {}",
            studies.len()
        )));
    }
    studies.iter().try_for_each(StudyEffect::validate)
}
