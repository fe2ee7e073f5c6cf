//! Regression data preparation: complete-case selection and group index
//! construction from a weekly panel frame.

use std::collections::BTreeMap;

use stagesignal_panel::Frame;

use crate::types::ModelError;

/// Complete-case regression arrays with show/week group indices.
#[derive(Debug, Clone)]
pub struct PreparedPanel {
    pub y: Vec<f64>,
    /// Main predictor.
    pub x: Vec<f64>,
    /// Control columns, same row order.
    pub controls: Vec<Vec<f64>>,
    pub show_idx: Vec<usize>,
    pub week_idx: Vec<usize>,
    pub n_shows: usize,
    pub n_weeks: usize,
    pub shows: Vec<String>,
}

/// Select rows where the outcome, the predictor, and every control are all
/// present, and index shows and weeks for the fixed-effects projections.
///
/// # Errors
///
/// Returns [`ModelError::MissingPredictor`] when a named column does not
/// exist and [`ModelError::InsufficientObservations`] when fewer than
/// `min_obs` complete rows remain.
pub fn prepare(
    frame: &Frame,
    outcome: &str,
    predictor: &str,
    controls: &[&str],
    min_obs: usize,
) -> Result<PreparedPanel, ModelError> {
    for column in [outcome, predictor].iter().chain(controls.iter()) {
        if !frame.has_column(column) {
            return Err(ModelError::MissingPredictor {
                column: (*column).to_string(),
            });
        }
    }

    let y_col = frame.f64_column(outcome);
    let x_col = frame.f64_column(predictor);
    let control_cols: Vec<Vec<Option<f64>>> =
        controls.iter().map(|c| frame.f64_column(c)).collect();

    let mut show_ids: BTreeMap<String, usize> = BTreeMap::new();
    let mut week_ids: BTreeMap<String, usize> = BTreeMap::new();

    let mut y = Vec::new();
    let mut x = Vec::new();
    let mut ctrl: Vec<Vec<f64>> = vec![Vec::new(); controls.len()];
    let mut show_idx = Vec::new();
    let mut week_idx = Vec::new();

    for row in 0..frame.len() {
        let (Some(yv), Some(xv)) = (y_col[row], x_col[row]) else {
            continue;
        };
        let control_vals: Option<Vec<f64>> = control_cols.iter().map(|c| c[row]).collect();
        let Some(control_vals) = control_vals else {
            continue;
        };
        let (Some(show), Some(week)) =
            (frame.get_str(row, "show"), frame.get_str(row, "week_start"))
        else {
            continue;
        };

        let next_show = show_ids.len();
        let si = *show_ids.entry(show.to_string()).or_insert(next_show);
        let next_week = week_ids.len();
        let wi = *week_ids.entry(week.to_string()).or_insert(next_week);

        y.push(yv);
        x.push(xv);
        for (slot, v) in ctrl.iter_mut().zip(control_vals) {
            slot.push(v);
        }
        show_idx.push(si);
        week_idx.push(wi);
    }

    if y.len() < min_obs {
        return Err(ModelError::InsufficientObservations {
            column: predictor.to_string(),
            got: y.len(),
            required: min_obs,
        });
    }

    let mut shows: Vec<String> = vec![String::new(); show_ids.len()];
    for (name, idx) in &show_ids {
        shows[*idx].clone_from(name);
    }

    tracing::debug!(
        predictor,
        outcome,
        rows = y.len(),
        shows = show_ids.len(),
        weeks = week_ids.len(),
        "prepared regression panel"
    );

    Ok(PreparedPanel {
        y,
        x,
        controls: ctrl,
        show_idx,
        week_idx,
        n_shows: show_ids.len(),
        n_weeks: week_ids.len(),
        shows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagesignal_panel::{DType, Value};

    fn frame() -> Frame {
        let mut frame = Frame::with_columns(&[
            ("show", DType::Str),
            ("week_start", DType::Str),
            ("gross", DType::Float),
            ("tt_sum_views_lag4", DType::Float),
        ]);
        let rows = [
            ("a", "2024-01-01", Some(10.0), Some(1.0)),
            ("a", "2024-01-08", Some(11.0), None),
            ("b", "2024-01-01", None, Some(3.0)),
            ("b", "2024-01-08", Some(14.0), Some(4.0)),
        ];
        for (show, week, y, x) in rows {
            frame
                .push_row(vec![
                    Some(Value::Str(show.into())),
                    Some(Value::Str(week.into())),
                    y.map(Value::Float),
                    x.map(Value::Float),
                ])
                .unwrap();
        }
        frame
    }

    #[test]
    fn keeps_only_complete_rows() {
        let panel = prepare(&frame(), "gross", "tt_sum_views_lag4", &[], 1).unwrap();
        assert_eq!(panel.y, vec![10.0, 14.0]);
        assert_eq!(panel.x, vec![1.0, 4.0]);
        assert_eq!(panel.n_shows, 2);
        assert_eq!(panel.show_idx, vec![0, 1]);
        assert_eq!(panel.shows, vec!["a", "b"]);
    }

    #[test]
    fn missing_column_is_named() {
        let err = prepare(&frame(), "gross", "nope", &[], 1).unwrap_err();
        assert!(matches!(err, ModelError::MissingPredictor { column } if column == "nope"));
    }

    #[test]
    fn too_few_rows_is_an_error() {
        let err = prepare(&frame(), "gross", "tt_sum_views_lag4", &[], 30).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InsufficientObservations { got: 2, required: 30, .. }
        ));
    }
}
