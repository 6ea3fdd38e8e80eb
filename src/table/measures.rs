//! Effect measures of a 2x2 table: risk ratio, odds ratio, risk difference.

use super::hypothesis::{chi_squared_test, fisher_exact, FisherResult, TestResult};
use super::nnt::{number_needed_to_treat, Nnt};
use super::ContingencyTable;
use crate::error::Result;
use crate::interval::{newcombe_ci, Estimate, Interval};
use crate::special::z_critical;

/// A ratio measure with its log-scale standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RatioEstimate {
    /// Ratio and its back-transformed CI.
    pub estimate: Estimate,
    /// Standard error of the log ratio.
    pub log_se: f64,
    /// Whether the 0.5 continuity correction was applied.
    pub corrected: bool,
}

impl RatioEstimate {
    fn from_log(log_value: f64, log_se: f64, z: f64, corrected: bool) -> Self {
        let estimate = Estimate {
            value: log_value.exp(),
            ci: Interval::symmetric(log_value, z * log_se).exp(),
        };
        Self {
            estimate,
            log_se,
            corrected,
        }
    }

    /// Log-scale point estimate and interval.
    pub fn log_estimate(&self) -> Estimate {
        self.estimate.ln()
    }
}

/// Risk difference `p_exposed - p_unexposed`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskDifference {
    /// Difference with the Newcombe hybrid-score interval.
    pub estimate: Estimate,
    /// Wald interval, for comparison with software that reports it.
    pub wald: Interval,
    /// Wald standard error.
    pub se: f64,
}

/// Risk ratio `(a/(a+b)) / (c/(c+d))`.
///
/// # Algorithm
///
/// ```text
/// SE(ln RR) = sqrt(1/a - 1/(a+b) + 1/c - 1/(c+d))
/// CI = exp(ln RR ± z·SE)
/// ```
///
/// When any cell is zero, 0.5 is added to all four cells for both the
/// point estimate and the variance.
///
/// # Errors
///
/// [`StatError::Data`](crate::StatError::Data) when a row is empty;
/// [`StatError::Domain`](crate::StatError::Domain) for an invalid
/// confidence level.
pub fn risk_ratio(table: &ContingencyTable, confidence: f64) -> Result<RatioEstimate> {
    table.require_rows()?;
    let z = z_critical(confidence)?;

    let ([a, b, c, d], corrected) = table.corrected_cells();
    let n1 = a + b;
    let n2 = c + d;
    let log_rr = ((a / n1) / (c / n2)).ln();
    let log_se = (1.0 / a - 1.0 / n1 + 1.0 / c - 1.0 / n2).sqrt();
    Ok(RatioEstimate::from_log(log_rr, log_se, z, corrected))
}

/// Odds ratio `ad / bc`.
///
/// # Algorithm
///
/// ```text
/// SE(ln OR) = sqrt(1/a + 1/b + 1/c + 1/d)     (Woolf)
/// CI = exp(ln OR ± z·SE)
/// ```
///
/// Zero cells are handled as in [`risk_ratio`].
pub fn odds_ratio(table: &ContingencyTable, confidence: f64) -> Result<RatioEstimate> {
    table.require_rows()?;
    let z = z_critical(confidence)?;

    let ([a, b, c, d], corrected) = table.corrected_cells();
    let log_or = ((a * d) / (b * c)).ln();
    let log_se = (1.0 / a + 1.0 / b + 1.0 / c + 1.0 / d).sqrt();
    Ok(RatioEstimate::from_log(log_or, log_se, z, corrected))
}

/// Risk difference `a/(a+b) - c/(c+d)` on uncorrected counts.
pub fn risk_difference(table: &ContingencyTable, confidence: f64) -> Result<RiskDifference> {
    table.require_rows()?;
    let z = z_critical(confidence)?;

    let n1 = table.exposed_total();
    let n2 = table.unexposed_total();
    let p1 = table.a() as f64 / n1 as f64;
    let p2 = table.c() as f64 / n2 as f64;
    let se = (p1 * (1.0 - p1) / n1 as f64 + p2 * (1.0 - p2) / n2 as f64).sqrt();

    Ok(RiskDifference {
        estimate: newcombe_ci(table.a(), n1, table.c(), n2, z)?,
        wald: Interval::symmetric(p1 - p2, z * se),
        se,
    })
}

/// Everything a 2x2 calculator reports for one table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableAnalysis {
    /// Risk in the exposed row.
    pub risk_exposed: f64,
    /// Risk in the unexposed row.
    pub risk_unexposed: f64,
    /// Risk ratio.
    pub risk_ratio: RatioEstimate,
    /// Odds ratio.
    pub odds_ratio: RatioEstimate,
    /// Risk difference (exposed − unexposed).
    pub risk_difference: RiskDifference,
    /// Relative risk reduction `1 - RR` with the mirrored RR interval.
    pub relative_risk_reduction: Estimate,
    /// Number needed to treat / harm.
    pub nnt: Nnt,
    /// Pearson χ² without correction; `None` when an event margin is empty.
    pub chi_squared: Option<TestResult>,
    /// Fisher exact test.
    pub fisher: FisherResult,
}

/// Runs every measure and test on one table.
///
/// # Errors
///
/// [`StatError::Data`](crate::StatError::Data) when a row is empty.
pub fn analyze(table: &ContingencyTable, confidence: f64) -> Result<TableAnalysis> {
    let rr = risk_ratio(table, confidence)?;
    let or = odds_ratio(table, confidence)?;
    let rd = risk_difference(table, confidence)?;
    let nnt = number_needed_to_treat(table, confidence)?;

    let relative_risk_reduction = Estimate::new(
        1.0 - rr.estimate.value,
        1.0 - rr.estimate.ci.upper,
        1.0 - rr.estimate.ci.lower,
    );

    Ok(TableAnalysis {
        risk_exposed: table.risk_exposed()?,
        risk_unexposed: table.risk_unexposed()?,
        risk_ratio: rr,
        odds_ratio: or,
        risk_difference: rd,
        relative_risk_reduction,
        nnt,
        chi_squared: chi_squared_test(table, false).ok(),
        fisher: fisher_exact(table),
    })
}
