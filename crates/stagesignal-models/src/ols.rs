//! Fixed-effects OLS on the weekly panel.
//!
//! Show and week effects are absorbed by two-way demeaning (alternating
//! projections, which converges on unbalanced panels) rather than dummy
//! columns, then the slope comes from a small normal-equations solve.
//! Standard errors are cluster-robust by show (CR1), with inference on
//! G - 1 degrees of freedom. [`fit_fe_ols`] and [`fit_panel_within`] share
//! that demeaned fit and differ only in the R² family they report.

use crate::dist::{student_t_critical, student_t_two_sided};
use crate::prepare::PreparedPanel;
use crate::types::{ModelError, ModelResult, ModelType};

const DEMEAN_TOL: f64 = 1e-10;
const DEMEAN_MAX_ITERS: usize = 100;
const PIVOT_TOL: f64 = 1e-12;

/// Subtract show means and week means alternately until both are gone.
pub(crate) fn two_way_demean(
    values: &mut [f64],
    show_idx: &[usize],
    week_idx: &[usize],
    n_shows: usize,
    n_weeks: usize,
) {
    for _ in 0..DEMEAN_MAX_ITERS {
        let mut max_shift = 0.0_f64;
        for (idx_set, n_groups) in [(show_idx, n_shows), (week_idx, n_weeks)] {
            let mut sums = vec![0.0; n_groups];
            let mut counts = vec![0usize; n_groups];
            for (v, &g) in values.iter().zip(idx_set.iter()) {
                sums[g] += *v;
                counts[g] += 1;
            }
            for (v, &g) in values.iter_mut().zip(idx_set.iter()) {
                if counts[g] > 0 {
                    #[allow(clippy::cast_precision_loss)]
                    let mean = sums[g] / counts[g] as f64;
                    *v -= mean;
                    max_shift = max_shift.max(mean.abs());
                }
            }
        }
        if max_shift < DEMEAN_TOL {
            break;
        }
    }
}

/// Gauss-Jordan inverse of a small symmetric matrix; `None` when a pivot
/// collapses.
pub(crate) fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let k = m.len();
    let mut inv: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| f64::from(u8::from(i == j))).collect())
        .collect();
    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&a, &b| {
                m[a][col]
                    .abs()
                    .partial_cmp(&m[b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
        if m[pivot_row][col].abs() < PIVOT_TOL {
            return None;
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);
        let pivot = m[col][col];
        for j in 0..k {
            m[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..k {
                m[row][j] -= factor * m[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Plain OLS residual sum of squares for `y ~ design` (columns given),
/// used by the Granger F-tests. `None` when the system is singular.
pub(crate) fn ols_rss(design: &[Vec<f64>], y: &[f64]) -> Option<f64> {
    let k = design.len();
    let n = y.len();
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for i in 0..k {
        for j in i..k {
            let mut acc = 0.0;
            for row in 0..n {
                acc += design[i][row] * design[j][row];
            }
            xtx[i][j] = acc;
            xtx[j][i] = acc;
        }
        for row in 0..n {
            xty[i] += design[i][row] * y[row];
        }
    }
    let inv = invert(xtx)?;
    let beta: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| inv[i][j] * xty[j]).sum())
        .collect();
    let mut rss = 0.0;
    for row in 0..n {
        let fitted: f64 = (0..k).map(|i| beta[i] * design[i][row]).sum();
        let e = y[row] - fitted;
        rss += e * e;
    }
    Some(rss)
}

fn corr_squared(a: &[f64], b: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let ma = a.iter().sum::<f64>() / n;
    let mb = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va <= 0.0 || vb <= 0.0 {
        return 0.0;
    }
    (cov * cov) / (va * vb)
}

/// Fit the fixed-effects model, reporting the R² of the full two-way FE
/// model (fixed effects counted as part of the fit). `lag` is carried into
/// the result for reporting only; the predictor column is already the
/// lagged feature.
///
/// # Errors
///
/// Returns [`ModelError::Singular`] when the demeaned design has no
/// remaining variation.
pub fn fit_fe_ols(
    panel: &PreparedPanel,
    outcome: &str,
    predictor: &str,
    lag: usize,
) -> Result<ModelResult, ModelError> {
    fit_absorbed(panel, outcome, predictor, lag, ModelType::FeOls)
}

/// The within estimator: same demeaned fit, reporting the within, between,
/// and overall R² trio instead of the full-model R².
///
/// # Errors
///
/// Returns [`ModelError::Singular`] when the demeaned design has no
/// remaining variation.
pub fn fit_panel_within(
    panel: &PreparedPanel,
    outcome: &str,
    predictor: &str,
    lag: usize,
) -> Result<ModelResult, ModelError> {
    fit_absorbed(panel, outcome, predictor, lag, ModelType::PanelWithin)
}

fn fit_absorbed(
    panel: &PreparedPanel,
    outcome: &str,
    predictor: &str,
    lag: usize,
    model_type: ModelType,
) -> Result<ModelResult, ModelError> {
    let n = panel.y.len();
    let k = 1 + panel.controls.len();

    let mut yd = panel.y.clone();
    two_way_demean(
        &mut yd,
        &panel.show_idx,
        &panel.week_idx,
        panel.n_shows,
        panel.n_weeks,
    );

    let mut raw_design: Vec<Vec<f64>> = Vec::with_capacity(k);
    raw_design.push(panel.x.clone());
    for c in &panel.controls {
        raw_design.push(c.clone());
    }
    let mut design = raw_design.clone();
    for column in &mut design {
        two_way_demean(
            column,
            &panel.show_idx,
            &panel.week_idx,
            panel.n_shows,
            panel.n_weeks,
        );
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for i in 0..k {
        for j in i..k {
            let mut acc = 0.0;
            for row in 0..n {
                acc += design[i][row] * design[j][row];
            }
            xtx[i][j] = acc;
            xtx[j][i] = acc;
        }
        for row in 0..n {
            xty[i] += design[i][row] * yd[row];
        }
    }

    let bread = invert(xtx).ok_or_else(|| ModelError::Singular {
        column: predictor.to_string(),
    })?;
    let beta: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| bread[i][j] * xty[j]).sum())
        .collect();

    let residuals: Vec<f64> = (0..n)
        .map(|row| {
            let fitted: f64 = (0..k).map(|i| beta[i] * design[i][row]).sum();
            yd[row] - fitted
        })
        .collect();

    // CR1 cluster-robust covariance, clustered on show.
    let g = panel.n_shows;
    let mut scores = vec![vec![0.0; k]; g];
    for row in 0..n {
        let cluster = panel.show_idx[row];
        for i in 0..k {
            scores[cluster][i] += design[i][row] * residuals[row];
        }
    }
    let mut meat = vec![vec![0.0; k]; k];
    for score in &scores {
        for i in 0..k {
            for j in 0..k {
                meat[i][j] += score[i] * score[j];
            }
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let adjustment = {
        let gf = g as f64;
        let nf = n as f64;
        let absorbed = (k + panel.n_shows + panel.n_weeks).saturating_sub(1) as f64;
        let dof_resid = (nf - absorbed).max(1.0);
        (gf / (gf - 1.0).max(1.0)) * ((nf - 1.0) / dof_resid)
    };
    // V = adj * bread * meat * bread; only the predictor's own variance is
    // reported.
    let mut bm = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in 0..k {
            for l in 0..k {
                bm[i][j] += bread[i][l] * meat[l][j];
            }
        }
    }
    let mut var00 = 0.0;
    for l in 0..k {
        var00 += bm[0][l] * bread[l][0];
    }
    let variance = adjustment * var00;
    let std_error = variance.max(0.0).sqrt();

    #[allow(clippy::cast_precision_loss)]
    let dof = ((g as f64) - 1.0).max(1.0);
    let t_stat = if std_error > 0.0 {
        beta[0] / std_error
    } else {
        f64::INFINITY
    };
    let p_value = student_t_two_sided(t_stat, dof);
    let crit = student_t_critical(0.05, dof);

    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let tss_within: f64 = yd.iter().map(|v| v * v).sum();
    let r_squared_within = if tss_within > 0.0 {
        1.0 - ssr / tss_within
    } else {
        0.0
    };

    // Full FE model R²: residuals already absorb both effect sets, so only
    // the total sum of squares changes to the grand-mean-centered one.
    #[allow(clippy::cast_precision_loss)]
    let grand_mean = panel.y.iter().sum::<f64>() / n as f64;
    let tss_full: f64 = panel.y.iter().map(|v| (v - grand_mean).powi(2)).sum();
    let r_squared_full = if tss_full > 0.0 { 1.0 - ssr / tss_full } else { 0.0 };

    let fitted_raw: Vec<f64> = (0..n)
        .map(|row| (0..k).map(|i| beta[i] * raw_design[i][row]).sum())
        .collect();
    let r_squared_overall = corr_squared(&panel.y, &fitted_raw);

    let mut y_means = vec![0.0; g];
    let mut f_means = vec![0.0; g];
    let mut counts = vec![0usize; g];
    for row in 0..n {
        let cluster = panel.show_idx[row];
        y_means[cluster] += panel.y[row];
        f_means[cluster] += fitted_raw[row];
        counts[cluster] += 1;
    }
    for cluster in 0..g {
        if counts[cluster] > 0 {
            #[allow(clippy::cast_precision_loss)]
            let c = counts[cluster] as f64;
            y_means[cluster] /= c;
            f_means[cluster] /= c;
        }
    }
    let r_squared_between = corr_squared(&y_means, &f_means);

    tracing::debug!(
        model_type = %model_type,
        predictor,
        outcome,
        lag,
        coefficient = beta[0],
        std_error,
        p_value,
        n,
        "fitted fixed-effects model"
    );

    let (r_squared, within, between, overall) = match model_type {
        ModelType::FeOls => (Some(r_squared_full), None, None, None),
        ModelType::PanelWithin => (
            None,
            Some(r_squared_within),
            Some(r_squared_between),
            Some(r_squared_overall),
        ),
    };

    Ok(ModelResult {
        model_type,
        predictor: predictor.to_string(),
        outcome: outcome.to_string(),
        lag,
        coefficient: beta[0],
        std_error,
        t_stat,
        p_value,
        ci_low: beta[0] - crit * std_error,
        ci_high: beta[0] + crit * std_error,
        r_squared,
        r_squared_within: within,
        r_squared_between: between,
        r_squared_overall: overall,
        n_obs: n,
        n_shows: panel.n_shows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn synthetic_panel(beta: f64, noise: f64, seed: u64) -> PreparedPanel {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_shows = 12;
        let n_weeks = 30;
        let mut y = Vec::new();
        let mut x = Vec::new();
        let mut show_idx = Vec::new();
        let mut week_idx = Vec::new();
        for s in 0..n_shows {
            for w in 0..n_weeks {
                let xv: f64 = rng.random_range(-5.0..5.0);
                #[allow(clippy::cast_precision_loss)]
                let effects = (s as f64) * 10.0 + (w as f64) * 2.0;
                let e: f64 = rng.random_range(-noise..noise);
                y.push(beta * xv + effects + e);
                x.push(xv);
                show_idx.push(s);
                week_idx.push(w);
            }
        }
        PreparedPanel {
            y,
            x,
            controls: Vec::new(),
            show_idx,
            week_idx,
            n_shows,
            n_weeks,
            shows: (0..n_shows).map(|s| format!("show-{s}")).collect(),
        }
    }

    #[test]
    fn recovers_the_true_slope_through_fixed_effects() {
        let panel = synthetic_panel(3.0, 0.5, 7);
        let result = fit_fe_ols(&panel, "gross", "tt_sum_views_lag4", 4).unwrap();
        assert_eq!(result.model_type, ModelType::FeOls);
        assert!(
            (result.coefficient - 3.0).abs() < 0.05,
            "coefficient {} too far from 3",
            result.coefficient
        );
        assert!(result.p_value < 1e-6);
        // Effects dominate the outcome, so the full FE model explains
        // nearly everything.
        assert!(result.r_squared.unwrap() > 0.99);
        assert!(result.r_squared_within.is_none());
        assert!(result.ci_low < 3.0 && 3.0 < result.ci_high);
        assert_eq!(result.n_obs, 360);
        assert_eq!(result.n_shows, 12);
    }

    #[test]
    fn within_estimator_agrees_on_the_slope_with_its_own_diagnostics() {
        let panel = synthetic_panel(3.0, 0.5, 7);
        let fe = fit_fe_ols(&panel, "gross", "tt_sum_views_lag4", 4).unwrap();
        let within = fit_panel_within(&panel, "gross", "tt_sum_views_lag4", 4).unwrap();
        assert_eq!(within.model_type, ModelType::PanelWithin);
        assert!((within.coefficient - fe.coefficient).abs() < 1e-12);
        assert!((within.std_error - fe.std_error).abs() < 1e-12);
        assert!(within.r_squared.is_none());
        assert!(within.r_squared_within.unwrap() > 0.95);
        assert!(within.r_squared_overall.unwrap() <= 1.0);
        assert!(within.r_squared_between.is_some());
    }

    #[test]
    fn pure_noise_is_not_significant() {
        let mut panel = synthetic_panel(0.0, 1.0, 11);
        // Break any accidental structure: y is noise around effects only.
        panel.x.rotate_left(17);
        let result = fit_fe_ols(&panel, "gross", "noise", 1).unwrap();
        assert!(result.coefficient.abs() < 0.1);
        assert!(result.p_value > 0.01);
    }

    #[test]
    fn constant_predictor_is_singular() {
        let mut panel = synthetic_panel(1.0, 0.5, 3);
        panel.x = vec![2.0; panel.y.len()];
        let err = fit_fe_ols(&panel, "gross", "flat", 1).unwrap_err();
        assert!(matches!(err, ModelError::Singular { .. }));
    }

    #[test]
    fn demeaning_zeroes_group_means() {
        let mut values = vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let show_idx = vec![0, 0, 0, 1, 1, 1];
        let week_idx = vec![0, 1, 2, 0, 1, 2];
        two_way_demean(&mut values, &show_idx, &week_idx, 2, 3);
        let show0: f64 = values[..3].iter().sum();
        let week0 = values[0] + values[3];
        assert!(show0.abs() < 1e-9);
        assert!(week0.abs() < 1e-9);
    }
}
