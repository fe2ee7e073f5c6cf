//! Lag-sensitivity sweep: refit the fixed-effects model across a set of
//! lag orders and report how the estimate moves.

use stagesignal_panel::Frame;

use crate::ols::fit_fe_ols;
use crate::prepare::prepare;
use crate::types::{SensitivityRow, SensitivitySummary};

/// Refit `outcome ~ {predictor_base}_lag{k}` for every `k` in `lags`.
/// Lags whose column is missing or whose fit fails are skipped; the sweep
/// always returns, possibly with no rows. The best lag is the one with the
/// largest |t| among fits significant at 0.05, or none.
#[must_use]
pub fn lag_sensitivity(
    frame: &Frame,
    outcome: &str,
    predictor_base: &str,
    lags: &[usize],
    min_obs: usize,
) -> SensitivitySummary {
    let mut rows = Vec::new();
    for &lag in lags {
        let column = format!("{predictor_base}_lag{lag}");
        let fit = prepare(frame, outcome, &column, &[], min_obs)
            .and_then(|panel| fit_fe_ols(&panel, outcome, &column, lag));
        match fit {
            Ok(result) => rows.push(SensitivityRow {
                lag,
                coefficient: result.coefficient,
                t_stat: result.t_stat,
                p_value: result.p_value,
                n_obs: result.n_obs,
            }),
            Err(e) => {
                tracing::warn!(predictor = predictor_base, lag, error = %e, "sensitivity fit skipped");
            }
        }
    }

    let best_lag = rows
        .iter()
        .filter(|r| r.p_value < 0.05)
        .max_by(|a, b| {
            a.t_stat
                .abs()
                .partial_cmp(&b.t_stat.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|r| r.lag);

    SensitivitySummary {
        predictor: predictor_base.to_string(),
        outcome: outcome.to_string(),
        rows,
        best_lag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use stagesignal_panel::features::add_lags;
    use stagesignal_panel::{DType, Value};

    /// Panel where the outcome responds to the signal four weeks back.
    fn lagged_frame() -> Frame {
        let mut rng = StdRng::seed_from_u64(5);
        let mut frame = Frame::with_columns(&[
            ("show", DType::Str),
            ("week_start", DType::Str),
            ("gross", DType::Float),
            ("signal", DType::Float),
        ]);
        for s in 0..6 {
            let xs: Vec<f64> = (0..40).map(|_| rng.random_range(-2.0..2.0)).collect();
            for w in 0..40 {
                let noise: f64 = rng.random_range(-0.1..0.1);
                #[allow(clippy::cast_precision_loss)]
                let effect = (s as f64) * 4.0;
                let y = if w >= 4 {
                    3.0 * xs[w - 4] + effect + noise
                } else {
                    effect + noise
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
        add_lags(&mut frame, &["signal"], &[1, 2, 4, 6]).unwrap();
        frame
    }

    #[test]
    fn sweep_finds_the_true_lag() {
        let frame = lagged_frame();
        let summary = lag_sensitivity(&frame, "gross", "signal", &[1, 2, 4, 6], 30);
        assert_eq!(summary.rows.len(), 4);
        assert_eq!(summary.best_lag, Some(4));
        let lag4 = summary.rows.iter().find(|r| r.lag == 4).unwrap();
        assert!((lag4.coefficient - 3.0).abs() < 0.1);
    }

    #[test]
    fn missing_lag_columns_are_skipped_not_fatal() {
        let frame = lagged_frame();
        let summary = lag_sensitivity(&frame, "gross", "signal", &[4, 9], 30);
        assert_eq!(summary.rows.len(), 1);
        assert_eq!(summary.rows[0].lag, 4);
    }

    #[test]
    fn no_significant_fit_means_no_best_lag() {
        let frame = lagged_frame();
        // The lead-like lag1 column is noise for this process; min_obs too
        // high filters everything out instead.
        let summary = lag_sensitivity(&frame, "gross", "signal", &[1], 100_000);
        assert!(summary.rows.is_empty());
        assert!(summary.best_lag.is_none());
    }
}
