//! Lagged causality engine for the weekly engagement panel.
//!
//! Answers one question: does engagement measured k weeks ago predict this
//! week's box office, beyond what show identity and week-of-year explain?
//! The tools are a fixed-effects panel regression (two-way demeaning,
//! cluster-robust errors), per-show Granger tests combined across shows
//! with Fisher's method, and a lag-sensitivity sweep. The distribution
//! machinery the tests need lives in [`dist`].

pub mod dist;
pub mod granger;
pub mod ols;
pub mod prepare;
pub mod sensitivity;
pub mod types;

pub use granger::{fisher_combine, granger_lag_summaries};
pub use ols::{fit_fe_ols, fit_panel_within};
pub use prepare::{prepare, PreparedPanel};
pub use sensitivity::lag_sensitivity;
pub use types::{
    GrangerLagSummary, GrangerShowResult, ModelError, ModelResult, ModelType, SensitivityRow,
    SensitivitySummary,
};
