use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("predictor column not found: {column}")]
    MissingPredictor { column: String },

    #[error("insufficient observations for {column}: {got} < {required}")]
    InsufficientObservations {
        column: String,
        got: usize,
        required: usize,
    },

    #[error("normal equations are singular for {column}")]
    Singular { column: String },

    #[error("no show has the {required} complete consecutive rows a Granger test needs")]
    NoEligibleShows { required: usize },
}

/// Which estimator family a result row came from. Both absorb show and
/// week effects and agree on the coefficient; they differ in the R²
/// diagnostics they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    FeOls,
    PanelWithin,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModelType::FeOls => "fe_ols",
            ModelType::PanelWithin => "panel_within",
        })
    }
}

/// One fit of `outcome ~ predictor` with show and week effects absorbed.
/// One row per (model type, predictor) pair; `r_squared` is the full
/// fixed-effects model R² (FE-OLS family), the `_within`/`_between`/
/// `_overall` trio belongs to the within estimator.
#[derive(Debug, Clone, Serialize)]
pub struct ModelResult {
    pub model_type: ModelType,
    pub predictor: String,
    pub outcome: String,
    pub lag: usize,
    pub coefficient: f64,
    pub std_error: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub r_squared: Option<f64>,
    pub r_squared_within: Option<f64>,
    pub r_squared_between: Option<f64>,
    pub r_squared_overall: Option<f64>,
    pub n_obs: usize,
    pub n_shows: usize,
}

impl ModelResult {
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.p_value < 0.05
    }
}

/// One show's Granger F-test at a given lag order.
#[derive(Debug, Clone, Serialize)]
pub struct GrangerShowResult {
    pub show: String,
    pub f_stat: f64,
    pub p_value: f64,
    pub n_obs: usize,
}

/// Cross-show Granger evidence at one lag order, combined with Fisher's
/// method.
#[derive(Debug, Clone, Serialize)]
pub struct GrangerLagSummary {
    pub lag: usize,
    pub shows: Vec<GrangerShowResult>,
    pub n_tested: usize,
    pub n_significant: usize,
    pub fraction_significant: f64,
    pub fisher_stat: f64,
    pub combined_p: f64,
}

/// One refit in the lag-sensitivity sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityRow {
    pub lag: usize,
    pub coefficient: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub n_obs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensitivitySummary {
    pub predictor: String,
    pub outcome: String,
    pub rows: Vec<SensitivityRow>,
    /// Lag with the largest |t| among significant fits, when any fit is
    /// significant at 0.05.
    pub best_lag: Option<usize>,
}
