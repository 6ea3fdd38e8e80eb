//! # u-biostat
//!
//! Statistics for clinical research: confidence intervals for proportions
//! and rates, 2x2 contingency-table analysis, effect-measure conversion,
//! meta-analysis, and Kaplan-Meier survival.
//!
//! All functions are pure and operate on plain counts, `f64` values, and
//! small record types. Formatting for display is left to the caller; the
//! only string output is the structural NNT notation.
//!
//! ## Modules
//!
//! - [`special`] — Normal, t, χ² and binomial distribution helpers and critical values
//! - [`interval`] — Wald, Wilson, Agresti-Coull, Clopper-Pearson, Newcombe and exact Poisson intervals
//! - [`table`] — RR, OR, RD, NNT, χ², Fisher, McNemar and the fragility index
//! - [`conversion`] — OR ↔ RR, OR ↔ d, Hedges' g, d ↔ r, SE from a CI
//! - [`meta`] — Fixed/random-effects pooling, HKSJ, prediction intervals, Egger and Begg tests, sensitivity analyses
//! - [`survival`] — Kaplan-Meier with Greenwood CIs, median survival, log-rank test
//!
//! ## Errors
//!
//! Every fallible function returns [`Result`]: [`StatError::Domain`] for an
//! argument outside its valid range, [`StatError::Data`] for data that
//! cannot support the computation. Degenerate but valid outcomes (an
//! infinite NNT, a median not reached) are values, not errors.
//!
//! ## Logging
//!
//! Notable adjustments (continuity correction, τ² truncation, fragility
//! search outcome) are emitted as `tracing` events at `debug` level. The
//! crate installs no subscriber.
//!
//! ## Design Philosophy
//!
//! - **Domain-agnostic numerics**: Leverages `u-numflow` for special functions
//! - **Typed outcomes**: Degenerate results are enum variants, not sentinels
//! - **Research-backed**: All algorithms reference the statistical literature

pub mod conversion;
pub mod error;
pub mod interval;
pub mod meta;
pub mod special;
pub mod survival;
pub mod table;

pub use error::{Result, StatError};
