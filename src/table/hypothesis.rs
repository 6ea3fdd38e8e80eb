//! Significance tests on 2x2 tables.

use super::ContingencyTable;
use crate::error::{Result, StatError};
use crate::special::{binomial_cdf, chi_squared_sf, ln_factorial};

/// Result of a hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestResult {
    /// Test statistic (χ² for the tests in this module).
    pub statistic: f64,
    /// Degrees of freedom.
    pub df: f64,
    /// Two-tailed p-value.
    pub p_value: f64,
}

/// Result of Fisher's exact test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FisherResult {
    /// Two-sided p-value: total probability of tables no more likely than
    /// the observed one.
    pub p_value: f64,
    /// One-sided p-value for `a` at most its observed value.
    pub p_less: f64,
    /// One-sided p-value for `a` at least its observed value.
    pub p_greater: f64,
    /// Sample odds ratio `ad / bc`: infinite when `bc = 0` and `ad > 0`,
    /// `None` when both products are zero.
    pub odds_ratio: Option<f64>,
}

// ---------------------------------------------------------------------------
// Pearson chi-squared
// ---------------------------------------------------------------------------

/// Pearson χ² test of independence with 1 df.
///
/// # Algorithm
///
/// ```text
/// χ² = N (ad - bc)² / ((a+b)(c+d)(a+c)(b+d))
/// ```
///
/// With `yates = true`, `|ad - bc|` is reduced by `N/2` (floored at zero).
///
/// # Errors
///
/// [`StatError::Data`] when any marginal total is zero.
pub fn chi_squared_test(table: &ContingencyTable, yates: bool) -> Result<TestResult> {
    let margins = [
        table.exposed_total(),
        table.unexposed_total(),
        table.event_total(),
        table.non_event_total(),
    ];
    if margins.contains(&0) {
        return Err(StatError::data(
            "chi-squared test requires all marginal totals to be positive",
        ));
    }

    let [a, b, c, d] = table.cells().map(|v| v as f64);
    let n = table.total() as f64;
    let denom: f64 = margins.iter().map(|&m| m as f64).product();

    let mut diff = (a * d - b * c).abs();
    if yates {
        diff = (diff - n / 2.0).max(0.0);
    }
    let statistic = n * diff * diff / denom;

    Ok(TestResult {
        statistic,
        df: 1.0,
        p_value: chi_squared_sf(statistic, 1.0),
    })
}

// ---------------------------------------------------------------------------
// Fisher exact test
// ---------------------------------------------------------------------------

/// Fisher exact test for a 2×2 table.
///
/// # Algorithm
///
/// 1. With margins fixed, `a` is hypergeometric; table probabilities are
///    computed from log-factorials.
/// 2. Two-sided p-value = sum of probabilities ≤ P(observed), with a
///    relative tolerance of 1e-7 so that ties in probability are counted.
///
/// A table with an empty margin admits a single arrangement, so its
/// p-values are all 1.
///
/// # References
///
/// - Fisher (1922). "On the interpretation of χ² from contingency tables,
///   and the calculation of P". JRSS, 85(1), 87–94.
pub fn fisher_exact(table: &ContingencyTable) -> FisherResult {
    let [a, b, c, d] = table.cells();
    let row1 = table.exposed_total();
    let row2 = table.unexposed_total();
    let col1 = table.event_total();
    let col2 = table.non_event_total();
    let n = table.total();

    let (ad, bc) = (a as f64 * d as f64, b as f64 * c as f64);
    let odds_ratio = if ad == 0.0 && bc == 0.0 {
        None
    } else {
        Some(ad / bc)
    };

    if row1 == 0 || row2 == 0 || col1 == 0 || col2 == 0 {
        return FisherResult {
            p_value: 1.0,
            p_less: 1.0,
            p_greater: 1.0,
            odds_ratio,
        };
    }

    let ln_margins = ln_factorial(row1) + ln_factorial(row2) + ln_factorial(col1)
        + ln_factorial(col2)
        - ln_factorial(n);

    // Log-probability of the table whose top-left cell is a_i
    let log_prob = |a_i: u64| -> f64 {
        let b_i = row1 - a_i;
        let c_i = col1 - a_i;
        let d_i = row2 - c_i;
        ln_margins
            - ln_factorial(a_i)
            - ln_factorial(b_i)
            - ln_factorial(c_i)
            - ln_factorial(d_i)
    };

    // Range of valid values for cell a
    let a_min = col1.saturating_sub(row2);
    let a_max = row1.min(col1);

    let log_p_obs = log_prob(a);
    let threshold = log_p_obs + 1e-7;

    let mut p_value = 0.0;
    let mut p_less = 0.0;
    let mut p_greater = 0.0;
    for a_i in a_min..=a_max {
        let lp = log_prob(a_i);
        let p = lp.exp();
        if lp <= threshold {
            p_value += p;
        }
        if a_i <= a {
            p_less += p;
        }
        if a_i >= a {
            p_greater += p;
        }
    }

    FisherResult {
        p_value: p_value.min(1.0),
        p_less: p_less.min(1.0),
        p_greater: p_greater.min(1.0),
        odds_ratio,
    }
}

// ---------------------------------------------------------------------------
// McNemar
// ---------------------------------------------------------------------------

fn discordant_pairs(table: &ContingencyTable) -> Result<(u64, u64)> {
    let (b, c) = (table.b(), table.c());
    if b + c == 0 {
        return Err(StatError::data(
            "McNemar test requires at least one discordant pair",
        ));
    }
    Ok((b, c))
}

/// Asymptotic McNemar test on a paired table (discordant cells `b`, `c`).
///
/// ```text
/// χ² = (b - c)² / (b + c)              continuity = false
/// χ² = (|b - c| - 1)² / (b + c)        continuity = true (Edwards)
/// ```
///
/// # Errors
///
/// [`StatError::Data`] when `b + c = 0`.
pub fn mcnemar_test(table: &ContingencyTable, continuity: bool) -> Result<TestResult> {
    let (b, c) = discordant_pairs(table)?;
    let mut diff = (b as f64 - c as f64).abs();
    if continuity {
        diff = (diff - 1.0).max(0.0);
    }
    let statistic = diff * diff / (b + c) as f64;
    Ok(TestResult {
        statistic,
        df: 1.0,
        p_value: chi_squared_sf(statistic, 1.0),
    })
}

/// Exact McNemar test: two-sided binomial p-value of `min(b, c)` out of
/// `b + c` discordant pairs at p = 0.5.
///
/// # Errors
///
/// [`StatError::Data`] when `b + c = 0`.
pub fn mcnemar_exact(table: &ContingencyTable) -> Result<f64> {
    let (b, c) = discordant_pairs(table)?;
    let p = 2.0 * binomial_cdf(b.min(c), b + c, 0.5);
    Ok(p.min(1.0))
}
