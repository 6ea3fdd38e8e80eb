//! Fragility index of a 2x2 trial result.
//!
//! The fragility index is the minimum number of patients whose outcome
//! would have to change for a statistically significant result to lose
//! significance. The reverse fragility index applies the same search to a
//! non-significant result until it becomes significant.
//!
//! # References
//!
//! - Walsh, M. et al. (2014). "The statistical significance of randomized
//!   controlled trial results is frequently fragile". J Clin Epidemiol, 67,
//!   622–628.
//! - Khan, M.S. et al. (2020). "Application of the reverse fragility index
//!   to statistically nonsignificant randomized clinical trial results".
//!   JAMA Netw Open, 3(8).

use super::hypothesis::fisher_exact;
use super::ContingencyTable;
use crate::error::{Result, StatError};

/// Which way significance was flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FragilityDirection {
    /// Significant at `alpha`, made non-significant (fragility index).
    LosesSignificance,
    /// Non-significant, made significant (reverse fragility index).
    GainsSignificance,
}

/// Result of a fragility search.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragilityResult {
    /// Minimum number of single-patient outcome changes that flips
    /// significance.
    pub index: u64,
    /// Direction of the flip.
    pub direction: FragilityDirection,
    /// Fisher two-sided p-value of the original table.
    pub initial_p: f64,
    /// Fisher two-sided p-value after `index` changes.
    pub final_p: f64,
    /// Table after the changes.
    pub modified: ContingencyTable,
    /// Significance threshold used.
    pub alpha: f64,
}

/// Computes the (reverse) fragility index of a table using Fisher's exact
/// test.
///
/// # Algorithm
///
/// Patients are switched between event and non-event inside their arm, so
/// both arm sizes stay fixed and a table is identified by `(a', c')`. Its
/// distance from the observed table is `|a' - a| + |c' - c|`. Distances
/// `k = 1, 2, ...` are searched in turn, every reachable table at distance
/// `k` is tested, and the first `k` at which significance flips is the
/// index. Among the flipping tables at that distance, the one whose p-value
/// lies furthest past `alpha` is reported.
///
/// At most `(n₁ + 1)(n₂ + 1)` Fisher tests are run.
///
/// # Errors
///
/// [`StatError::Domain`] unless `0 < alpha < 1`; [`StatError::Data`] when
/// a row is empty or no reassignment flips significance.
pub fn fragility_index(table: &ContingencyTable, alpha: f64) -> Result<FragilityResult> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(StatError::domain(format!("alpha must be in (0, 1), got {alpha}")));
    }
    table.require_rows()?;

    let initial_p = fisher_exact(table).p_value;
    let direction = if initial_p < alpha {
        FragilityDirection::LosesSignificance
    } else {
        FragilityDirection::GainsSignificance
    };

    // The farthest reachable table is n₁ + n₂ reassignments away.
    let max_distance = table.exposed_total() + table.unexposed_total();
    for index in 1..=max_distance {
        if let Some((modified, final_p)) = best_at_distance(table, index, direction, alpha)? {
            tracing::debug!(index, initial_p, final_p, ?direction, "fragility search done");
            return Ok(FragilityResult {
                index,
                direction,
                initial_p,
                final_p,
                modified,
                alpha,
            });
        }
    }

    Err(StatError::data(format!(
        "significance at alpha = {alpha} cannot be flipped by reassigning outcomes"
    )))
}

/// The flipping table exactly `k` reassignments away whose p-value lies
/// furthest past `alpha`, or `None` when no table at that distance flips.
fn best_at_distance(
    table: &ContingencyTable,
    k: u64,
    direction: FragilityDirection,
    alpha: f64,
) -> Result<Option<(ContingencyTable, f64)>> {
    let [a, _, c, _] = table.cells();
    let n1 = table.exposed_total();
    let n2 = table.unexposed_total();

    let mut best: Option<(ContingencyTable, f64)> = None;
    // k1 reassignments in the exposed arm, the rest in the unexposed arm.
    for k1 in 0..=k {
        for a_new in shifted(a, k1, n1) {
            for c_new in shifted(c, k - k1, n2) {
                let next = ContingencyTable::new(a_new, n1 - a_new, c_new, n2 - c_new)?;
                let p = fisher_exact(&next).p_value;
                let (flips, better) = match (direction, best) {
                    (FragilityDirection::LosesSignificance, None) => (p >= alpha, true),
                    (FragilityDirection::LosesSignificance, Some((_, bp))) => (p >= alpha, p > bp),
                    (FragilityDirection::GainsSignificance, None) => (p < alpha, true),
                    (FragilityDirection::GainsSignificance, Some((_, bp))) => (p < alpha, p < bp),
                };
                if flips && better {
                    best = Some((next, p));
                }
            }
        }
    }
    Ok(best)
}

/// Values exactly `k` away from `x` that stay within `0..=n`.
fn shifted(x: u64, k: u64, n: u64) -> impl Iterator<Item = u64> {
    let down = x.checked_sub(k);
    let up = if k > 0 { Some(x + k).filter(|&v| v <= n) } else { None };
    down.into_iter().chain(up)
}
