//! 2x2 contingency-table analysis.
//!
//! Tables are laid out exposed/unexposed (rows) by event/no-event (columns):
//!
//! ```text
//!               Event   No event
//!   Exposed   |   a   |    b    |
//!   Unexposed |   c   |    d    |
//! ```
//!
//! # Measures
//!
//! - [`risk_ratio`], [`odds_ratio`] — log-scale CIs, 0.5 continuity
//!   correction when any cell is zero
//! - [`risk_difference`] — Wald and Newcombe intervals
//! - [`number_needed_to_treat`] — NNT/NNH with Altman's notation when the
//!   interval spans zero
//! - [`analyze`] — all of the above in one record
//!
//! # Tests
//!
//! - [`chi_squared_test`] — Pearson χ² with optional Yates correction
//! - [`fisher_exact`] — exact hypergeometric test
//! - [`mcnemar_test`], [`mcnemar_exact`] — paired tables
//! - [`fragility_index`] — event reassignments needed to flip significance
//!
//! # Examples
//!
//! ```
//! use u_biostat::table::{ContingencyTable, odds_ratio};
//!
//! let t = ContingencyTable::new(60, 240, 84, 216).unwrap();
//! let or = odds_ratio(&t, 0.95).unwrap();
//! assert!((or.estimate.value - 0.642857).abs() < 1e-6);
//! assert!(!or.corrected);
//! ```

mod fragility;
mod hypothesis;
mod measures;
mod nnt;

pub use fragility::{fragility_index, FragilityDirection, FragilityResult};
pub use hypothesis::{
    chi_squared_test, fisher_exact, mcnemar_exact, mcnemar_test, FisherResult, TestResult,
};
pub use measures::{
    analyze, odds_ratio, risk_difference, risk_ratio, RatioEstimate, RiskDifference,
    TableAnalysis,
};
pub use nnt::{nnt_from_arr, number_needed_to_treat, Nnt, NntInterval, NumberNeeded};

use crate::error::{Result, StatError};

/// Continuity correction added to every cell when any cell is zero.
pub const CONTINUITY_CORRECTION: f64 = 0.5;

/// A 2x2 table of non-negative counts with a positive total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContingencyTable {
    a: u64,
    b: u64,
    c: u64,
    d: u64,
}

impl ContingencyTable {
    /// Creates a table from its four cells.
    ///
    /// # Errors
    ///
    /// [`StatError::Data`] when all four cells are zero.
    pub fn new(a: u64, b: u64, c: u64, d: u64) -> Result<Self> {
        if a + b + c + d == 0 {
            return Err(StatError::data("contingency table is empty"));
        }
        Ok(Self { a, b, c, d })
    }

    /// Builds a table from events and group sizes, as reported in trials:
    /// `events_exposed / n_exposed` vs `events_unexposed / n_unexposed`.
    ///
    /// # Errors
    ///
    /// [`StatError::Domain`] when events exceed the group size;
    /// [`StatError::Data`] when both groups are empty.
    pub fn from_events(
        events_exposed: u64,
        n_exposed: u64,
        events_unexposed: u64,
        n_unexposed: u64,
    ) -> Result<Self> {
        if events_exposed > n_exposed || events_unexposed > n_unexposed {
            return Err(StatError::domain("events exceed group size"));
        }
        Self::new(
            events_exposed,
            n_exposed - events_exposed,
            events_unexposed,
            n_unexposed - events_unexposed,
        )
    }

    /// Exposed with event.
    pub fn a(&self) -> u64 {
        self.a
    }

    /// Exposed without event.
    pub fn b(&self) -> u64 {
        self.b
    }

    /// Unexposed with event.
    pub fn c(&self) -> u64 {
        self.c
    }

    /// Unexposed without event.
    pub fn d(&self) -> u64 {
        self.d
    }

    /// Cells as `[a, b, c, d]`.
    pub fn cells(&self) -> [u64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// `a + b`.
    pub fn exposed_total(&self) -> u64 {
        self.a + self.b
    }

    /// `c + d`.
    pub fn unexposed_total(&self) -> u64 {
        self.c + self.d
    }

    /// `a + c`.
    pub fn event_total(&self) -> u64 {
        self.a + self.c
    }

    /// `b + d`.
    pub fn non_event_total(&self) -> u64 {
        self.b + self.d
    }

    /// `a + b + c + d`.
    pub fn total(&self) -> u64 {
        self.a + self.b + self.c + self.d
    }

    /// Whether any cell is zero.
    pub fn has_zero_cell(&self) -> bool {
        self.cells().contains(&0)
    }

    /// Risk in the exposed row, `a / (a + b)`.
    ///
    /// # Errors
    ///
    /// [`StatError::Data`] when the exposed row is empty.
    pub fn risk_exposed(&self) -> Result<f64> {
        match self.exposed_total() {
            0 => Err(StatError::data("exposed group is empty")),
            n => Ok(self.a as f64 / n as f64),
        }
    }

    /// Risk in the unexposed row, `c / (c + d)`.
    ///
    /// # Errors
    ///
    /// [`StatError::Data`] when the unexposed row is empty.
    pub fn risk_unexposed(&self) -> Result<f64> {
        match self.unexposed_total() {
            0 => Err(StatError::data("unexposed group is empty")),
            n => Ok(self.c as f64 / n as f64),
        }
    }

    /// Cells as floats with [`CONTINUITY_CORRECTION`] added to all four when
    /// any is zero, plus whether the correction was applied.
    pub fn corrected_cells(&self) -> ([f64; 4], bool) {
        let cells = self.cells().map(|v| v as f64);
        if self.has_zero_cell() {
            tracing::debug!(
                a = self.a,
                b = self.b,
                c = self.c,
                d = self.d,
                "zero cell, applying continuity correction"
            );
            (cells.map(|v| v + CONTINUITY_CORRECTION), true)
        } else {
            (cells, false)
        }
    }

    /// Both rows must be non-empty for any risk-based measure.
    pub(crate) fn require_rows(&self) -> Result<()> {
        self.risk_exposed()?;
        self.risk_unexposed()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty() {
        assert!(ContingencyTable::new(0, 0, 0, 0).unwrap_err().is_data());
        assert!(ContingencyTable::new(0, 0, 0, 1).is_ok());
    }

    #[test]
    fn test_margins() {
        let t = ContingencyTable::new(60, 240, 84, 216).expect("valid");
        assert_eq!(t.exposed_total(), 300);
        assert_eq!(t.unexposed_total(), 300);
        assert_eq!(t.event_total(), 144);
        assert_eq!(t.non_event_total(), 456);
        assert_eq!(t.total(), 600);
        assert!((t.risk_exposed().expect("rows") - 0.2).abs() < 1e-12);
        assert!((t.risk_unexposed().expect("rows") - 0.28).abs() < 1e-12);
    }

    #[test]
    fn test_from_events() {
        let t = ContingencyTable::from_events(60, 300, 84, 300).expect("valid");
        assert_eq!(t.cells(), [60, 240, 84, 216]);
        assert!(ContingencyTable::from_events(301, 300, 84, 300)
            .unwrap_err()
            .is_domain());
    }

    #[test]
    fn test_corrected_cells() {
        let t = ContingencyTable::new(0, 10, 5, 5).expect("valid");
        let (cells, corrected) = t.corrected_cells();
        assert!(corrected);
        assert_eq!(cells, [0.5, 10.5, 5.5, 5.5]);

        let t = ContingencyTable::new(1, 10, 5, 5).expect("valid");
        let (cells, corrected) = t.corrected_cells();
        assert!(!corrected);
        assert_eq!(cells, [1.0, 10.0, 5.0, 5.0]);
    }

    #[test]
    fn test_empty_row() {
        let t = ContingencyTable::new(0, 0, 5, 5).expect("valid");
        assert!(t.risk_exposed().unwrap_err().is_data());
        assert!(t.require_rows().is_err());
    }
}
