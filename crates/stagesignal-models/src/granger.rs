//! Per-show Granger tests with Fisher combination across shows.
//!
//! For each show with enough complete history, an AR model of the outcome
//! is compared against the same model augmented with predictor lags via an
//! F-test on residual sums of squares. The per-show p-values at each lag
//! order are combined with Fisher's method, which is exact under
//! independence of shows.

use std::collections::BTreeMap;

use stagesignal_panel::Frame;

use crate::dist::{chi2_sf, f_sf};
use crate::ols::ols_rss;
use crate::types::{GrangerLagSummary, GrangerShowResult, ModelError};

/// A Granger test at lag order p needs at least `3 * p` complete rows.
pub const ELIGIBILITY_FACTOR: usize = 3;

/// Fisher's method: returns `(-2 Σ ln p, P(chi2_{2n} > stat))`.
#[must_use]
pub fn fisher_combine(p_values: &[f64]) -> (f64, f64) {
    let stat = -2.0 * p_values.iter().map(|p| p.max(1e-300).ln()).sum::<f64>();
    #[allow(clippy::cast_precision_loss)]
    let dof = 2.0 * p_values.len() as f64;
    (stat, chi2_sf(stat, dof))
}

/// Restricted-vs-unrestricted F-test for one show's series at one lag
/// order. `None` when the series is too short, the unrestricted fit is
/// degenerate, or either solve is singular.
fn granger_f_test(y: &[f64], x: &[f64], lag: usize) -> Option<(f64, f64, usize)> {
    let n = y.len();
    if n <= 2 * lag + 1 {
        return None;
    }
    let n_eff = n - lag;
    let dof_unrestricted = n_eff.checked_sub(2 * lag + 1)?;
    if dof_unrestricted == 0 {
        return None;
    }

    let target: Vec<f64> = y[lag..].to_vec();
    let mut restricted: Vec<Vec<f64>> = vec![vec![1.0; n_eff]];
    for k in 1..=lag {
        restricted.push(y[lag - k..n - k].to_vec());
    }
    let mut unrestricted = restricted.clone();
    for k in 1..=lag {
        unrestricted.push(x[lag - k..n - k].to_vec());
    }

    let rss_r = ols_rss(&restricted, &target)?;
    let rss_u = ols_rss(&unrestricted, &target)?;
    if rss_u < 1e-12 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let f_stat = (((rss_r - rss_u) / lag as f64) / (rss_u / dof_unrestricted as f64)).max(0.0);
    #[allow(clippy::cast_precision_loss)]
    let p_value = f_sf(f_stat, lag as f64, dof_unrestricted as f64);
    Some((f_stat, p_value, n_eff))
}

/// Run per-show Granger tests of `predictor -> outcome` at every lag order
/// `1..=max_lag`, combining show p-values per lag with Fisher's method.
/// Shows participate when they have at least `3 * max_lag` complete rows.
///
/// # Errors
///
/// Returns [`ModelError::MissingPredictor`] for unknown columns and
/// [`ModelError::NoEligibleShows`] when no show has enough history.
pub fn granger_lag_summaries(
    frame: &Frame,
    outcome: &str,
    predictor: &str,
    max_lag: usize,
) -> Result<Vec<GrangerLagSummary>, ModelError> {
    for column in [outcome, predictor] {
        if !frame.has_column(column) {
            return Err(ModelError::MissingPredictor {
                column: column.to_string(),
            });
        }
    }

    let y_col = frame.f64_column(outcome);
    let x_col = frame.f64_column(predictor);
    let mut series: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in 0..frame.len() {
        let (Some(show), Some(y), Some(x)) =
            (frame.get_str(row, "show"), y_col[row], x_col[row])
        else {
            continue;
        };
        let entry = series.entry(show.to_string()).or_default();
        entry.0.push(y);
        entry.1.push(x);
    }

    let required = ELIGIBILITY_FACTOR * max_lag;
    let eligible: Vec<(&String, &(Vec<f64>, Vec<f64>))> = series
        .iter()
        .filter(|(_, (y, _))| y.len() >= required)
        .collect();
    if eligible.is_empty() {
        return Err(ModelError::NoEligibleShows { required });
    }

    let mut summaries = Vec::with_capacity(max_lag);
    for lag in 1..=max_lag {
        let mut shows = Vec::new();
        for (show, (y, x)) in &eligible {
            let Some((f_stat, p_value, n_obs)) = granger_f_test(y, x, lag) else {
                tracing::debug!(show = %show, lag, "granger test skipped (degenerate fit)");
                continue;
            };
            shows.push(GrangerShowResult {
                show: (*show).clone(),
                f_stat,
                p_value,
                n_obs,
            });
        }
        let p_values: Vec<f64> = shows.iter().map(|s| s.p_value).collect();
        let (fisher_stat, combined_p) = fisher_combine(&p_values);
        let n_tested = shows.len();
        let n_significant = shows.iter().filter(|s| s.p_value < 0.05).count();
        #[allow(clippy::cast_precision_loss)]
        let fraction_significant = if n_tested == 0 {
            0.0
        } else {
            n_significant as f64 / n_tested as f64
        };
        tracing::info!(
            predictor,
            lag,
            n_tested,
            n_significant,
            combined_p,
            "granger lag summary"
        );
        summaries.push(GrangerLagSummary {
            lag,
            shows,
            n_tested,
            n_significant,
            fraction_significant,
            fisher_stat,
            combined_p,
        });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use stagesignal_panel::{DType, Value};

    fn panel_frame(shows: usize, weeks: usize, coupled: bool, seed: u64) -> Frame {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut frame = Frame::with_columns(&[
            ("show", DType::Str),
            ("week_start", DType::Str),
            ("gross", DType::Float),
            ("signal", DType::Float),
        ]);
        for s in 0..shows {
            let mut xs: Vec<f64> = Vec::with_capacity(weeks);
            for _ in 0..weeks {
                xs.push(rng.random_range(-1.0..1.0));
            }
            for w in 0..weeks {
                let noise: f64 = rng.random_range(-0.05..0.05);
                let y = if coupled && w > 0 {
                    0.9 * xs[w - 1] + noise
                } else {
                    rng.random_range(-1.0..1.0)
                };
                frame
                    .push_row(vec![
                        Some(Value::Str(format!("show-{s}"))),
                        Some(Value::Str(format!("2024-W{w:02}"))),
                        Some(Value::Float(y)),
                        Some(Value::Float(xs[w])),
                    ])
                    .unwrap();
            }
        }
        frame
    }

    #[test]
    fn fisher_of_uniform_halves_is_not_significant() {
        let (stat, p) = fisher_combine(&vec![0.5; 10]);
        assert!((stat - 13.862_943_611_198_906).abs() < 1e-9);
        assert!(p > 0.05);
    }

    #[test]
    fn fisher_of_tiny_ps_is_significant() {
        let (_, p) = fisher_combine(&[1e-6, 1e-5, 1e-4]);
        assert!(p < 1e-9);
    }

    #[test]
    fn coupled_series_show_strong_evidence_at_lag_one() {
        let frame = panel_frame(4, 60, true, 42);
        let summaries = granger_lag_summaries(&frame, "gross", "signal", 2).unwrap();
        assert_eq!(summaries.len(), 2);
        let lag1 = &summaries[0];
        assert_eq!(lag1.lag, 1);
        assert_eq!(lag1.n_tested, 4);
        assert!(lag1.combined_p < 1e-6);
        assert!(lag1.fraction_significant > 0.9);
    }

    #[test]
    fn independent_series_show_weak_evidence() {
        let frame = panel_frame(4, 60, false, 9);
        let summaries = granger_lag_summaries(&frame, "gross", "signal", 1).unwrap();
        assert!(summaries[0].combined_p > 0.001);
    }

    #[test]
    fn short_histories_are_ineligible() {
        let frame = panel_frame(3, 5, true, 1);
        let err = granger_lag_summaries(&frame, "gross", "signal", 4).unwrap_err();
        assert!(matches!(err, ModelError::NoEligibleShows { required: 12 }));
    }

    #[test]
    fn missing_column_is_reported() {
        let frame = panel_frame(2, 20, true, 1);
        let err = granger_lag_summaries(&frame, "gross", "absent", 2).unwrap_err();
        assert!(matches!(err, ModelError::MissingPredictor { .. }));
    }
}
