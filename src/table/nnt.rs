//! Number needed to treat (NNT) and to harm (NNH).
//!
//! NNT is the reciprocal of the absolute risk reduction, rounded up. When
//! the ARR interval includes zero the NNT interval passes through infinity
//! and is reported in Altman's form, e.g. `NNTB 8 to ∞ to NNTH 8`.
//!
//! # References
//!
//! Altman, D.G. (1998). "Confidence intervals for the number needed to
//! treat". BMJ, 317, 1309–1312.

use std::fmt;

use super::ContingencyTable;
use crate::error::{Result, StatError};
use crate::interval::{newcombe_ci, Estimate};
use crate::special::z_critical;

/// Slack applied before rounding up, so that e.g. 1/0.25 computed as
/// 4.000000000000001 stays 4.
const CEIL_SLACK: f64 = 1e-9;

/// A point NNT.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumberNeeded {
    /// Patients treated for one additional patient to benefit (ARR > 0).
    Benefit(f64),
    /// Patients treated for one additional patient to be harmed (ARR < 0).
    Harm(f64),
    /// ARR is exactly zero.
    Infinite,
}

/// Confidence interval of an NNT.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NntInterval {
    /// The whole ARR interval lies above zero.
    Benefit {
        /// Smallest NNTB (from the upper ARR bound).
        lower: f64,
        /// Largest NNTB (from the lower ARR bound).
        upper: f64,
    },
    /// The whole ARR interval lies below zero.
    Harm {
        /// Smallest NNTH.
        lower: f64,
        /// Largest NNTH.
        upper: f64,
    },
    /// The ARR interval includes zero: `NNTB benefit to ∞ to NNTH harm`.
    /// A side is `None` when the corresponding ARR bound is exactly zero.
    SpansInfinity {
        /// NNTB at the benefit end of the interval.
        benefit: Option<f64>,
        /// NNTH at the harm end of the interval.
        harm: Option<f64>,
    },
}

/// NNT with the ARR it is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Nnt {
    /// Absolute risk reduction (unexposed risk − exposed risk) with its CI.
    pub arr: Estimate,
    /// Point NNT.
    pub value: NumberNeeded,
    /// NNT interval.
    pub ci: NntInterval,
}

fn patients(arr_magnitude: f64) -> f64 {
    (1.0 / arr_magnitude - CEIL_SLACK).ceil()
}

/// NNT for a table whose exposed row is the treatment arm.
///
/// ARR = `c/(c+d) - a/(a+b)` with the Newcombe hybrid-score interval.
///
/// # Errors
///
/// [`StatError::Data`] when a row is empty.
pub fn number_needed_to_treat(table: &ContingencyTable, confidence: f64) -> Result<Nnt> {
    table.require_rows()?;
    let z = z_critical(confidence)?;
    let arr = newcombe_ci(
        table.c(),
        table.unexposed_total(),
        table.a(),
        table.exposed_total(),
        z,
    )?;
    nnt_from_arr(arr)
}

/// NNT from an absolute risk reduction and its interval.
///
/// # Errors
///
/// [`StatError::Domain`] when the ARR is not finite, lies outside [-1, 1],
/// or is not bracketed by its interval.
pub fn nnt_from_arr(arr: Estimate) -> Result<Nnt> {
    let Estimate { value, ci } = arr;
    if ![value, ci.lower, ci.upper].iter().all(|v| v.is_finite()) {
        return Err(StatError::domain("ARR and its interval must be finite"));
    }
    if value.abs() > 1.0 {
        return Err(StatError::domain(format!(
            "ARR must lie in [-1, 1], got {value}"
        )));
    }
    if !ci.contains(value) {
        return Err(StatError::domain(format!(
            "ARR {value} lies outside its interval [{}, {}]",
            ci.lower, ci.upper
        )));
    }

    let point = if value > 0.0 {
        NumberNeeded::Benefit(patients(value))
    } else if value < 0.0 {
        NumberNeeded::Harm(patients(-value))
    } else {
        NumberNeeded::Infinite
    };

    let interval = if ci.lower > 0.0 {
        NntInterval::Benefit {
            lower: patients(ci.upper),
            upper: patients(ci.lower),
        }
    } else if ci.upper < 0.0 {
        NntInterval::Harm {
            lower: patients(-ci.lower),
            upper: patients(-ci.upper),
        }
    } else {
        NntInterval::SpansInfinity {
            benefit: (ci.upper > 0.0).then(|| patients(ci.upper)),
            harm: (ci.lower < 0.0).then(|| patients(-ci.lower)),
        }
    };

    Ok(Nnt {
        arr,
        value: point,
        ci: interval,
    })
}

impl fmt::Display for NumberNeeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benefit(n) => write!(f, "NNTB {n}"),
            Self::Harm(n) => write!(f, "NNTH {n}"),
            Self::Infinite => write!(f, "∞"),
        }
    }
}

impl fmt::Display for NntInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benefit { lower, upper } => write!(f, "NNTB {lower} to {upper}"),
            Self::Harm { lower, upper } => write!(f, "NNTH {lower} to {upper}"),
            Self::SpansInfinity { benefit, harm } => {
                match benefit {
                    Some(n) => write!(f, "NNTB {n} to ∞")?,
                    None => write!(f, "∞")?,
                }
                if let Some(n) = harm {
                    write!(f, " to NNTH {n}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_table_renders_altman_infinity() {
        let t = ContingencyTable::new(50, 50, 50, 50).expect("valid");
        let nnt = number_needed_to_treat(&t, 0.95).expect("valid");
        assert_eq!(nnt.arr.value, 0.0);
        assert_eq!(nnt.value, NumberNeeded::Infinite);
        assert_eq!(
            nnt.ci,
            NntInterval::SpansInfinity {
                benefit: Some(8.0),
                harm: Some(8.0)
            }
        );
        assert_eq!(nnt.value.to_string(), "∞");
        assert_eq!(nnt.ci.to_string(), "NNTB 8 to ∞ to NNTH 8");
    }

    #[test]
    fn test_benefit_reference() {
        // Exposed (treated) risk 0.20 vs unexposed 0.28.
        let t = ContingencyTable::new(60, 240, 84, 216).expect("valid");
        let nnt = number_needed_to_treat(&t, 0.95).expect("valid");
        assert!((nnt.arr.value - 0.08).abs() < 1e-12);
        assert_eq!(nnt.value, NumberNeeded::Benefit(13.0));
        assert_eq!(
            nnt.ci,
            NntInterval::Benefit {
                lower: 7.0,
                upper: 87.0
            }
        );
        assert_eq!(nnt.value.to_string(), "NNTB 13");
        assert_eq!(nnt.ci.to_string(), "NNTB 7 to 87");
    }

    #[test]
    fn test_harm_direction() {
        let t = ContingencyTable::new(84, 216, 60, 240).expect("valid");
        let nnt = number_needed_to_treat(&t, 0.95).expect("valid");
        assert_eq!(nnt.value, NumberNeeded::Harm(13.0));
        assert_eq!(
            nnt.ci,
            NntInterval::Harm {
                lower: 7.0,
                upper: 87.0
            }
        );
    }

    #[test]
    fn test_exact_reciprocal_not_bumped() {
        let nnt = nnt_from_arr(Estimate::new(0.25, 0.1, 0.5)).expect("valid");
        assert_eq!(nnt.value, NumberNeeded::Benefit(4.0));
        assert_eq!(
            nnt.ci,
            NntInterval::Benefit {
                lower: 2.0,
                upper: 10.0
            }
        );
    }

    #[test]
    fn test_one_sided_infinity() {
        let nnt = nnt_from_arr(Estimate::new(0.05, 0.0, 0.1)).expect("valid");
        assert_eq!(
            nnt.ci,
            NntInterval::SpansInfinity {
                benefit: Some(10.0),
                harm: None
            }
        );
        assert_eq!(nnt.ci.to_string(), "NNTB 10 to ∞");
    }

    #[test]
    fn test_invalid_arr() {
        assert!(nnt_from_arr(Estimate::new(f64::NAN, 0.0, 0.1))
            .unwrap_err()
            .is_domain());
        assert!(nnt_from_arr(Estimate::new(0.5, 0.6, 0.7))
            .unwrap_err()
            .is_domain());
    }
}
