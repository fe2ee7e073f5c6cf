//! Per-show feature engineering over a sorted weekly panel.
//!
//! Every transform respects show boundaries: a lag never reaches across
//! two different shows, so the first weeks of each show are absent rather
//! than contaminated by the previous show's tail. Inputs must be sorted by
//! (show, week_start); the panel builder guarantees that.

use crate::frame::{DType, Frame, Value};
use crate::PanelError;

pub const DEFAULT_LAGS: [usize; 4] = [1, 2, 4, 6];
pub const DEFAULT_LEADS: [usize; 1] = [4];
pub const DEFAULT_ROLLING_WINDOW: usize = 3;

/// Contiguous row ranges sharing one show value, in row order.
fn show_groups(frame: &Frame) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    for row in 1..frame.len() {
        if frame.get_str(row, "show") != frame.get_str(row - 1, "show") {
            groups.push((start, row));
            start = row;
        }
    }
    if !frame.is_empty() {
        groups.push((start, frame.len()));
    }
    groups
}

fn shifted(values: &[Option<f64>], groups: &[(usize, usize)], offset: isize) -> Vec<Option<Value>> {
    let mut out = vec![None; values.len()];
    for &(start, end) in groups {
        for row in start..end {
            #[allow(clippy::cast_possible_wrap)]
            let source = row as isize - offset;
            #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
            if source >= start as isize && source < end as isize {
                out[row] = values[source as usize].map(Value::Float);
            }
        }
    }
    out
}

/// Add `{col}_lag{k}` columns: the value k weeks earlier for the same show.
///
/// # Errors
///
/// Returns [`PanelError::ColumnNotFound`] for an unknown source column or
/// [`PanelError::DuplicateColumn`] if a lag column already exists.
pub fn add_lags(frame: &mut Frame, columns: &[&str], lags: &[usize]) -> Result<(), PanelError> {
    let groups = show_groups(frame);
    for column in columns {
        if !frame.has_column(column) {
            return Err(PanelError::ColumnNotFound {
                name: (*column).to_string(),
            });
        }
        let values = frame.f64_column(column);
        for &lag in lags {
            #[allow(clippy::cast_possible_wrap)]
            let cells = shifted(&values, &groups, lag as isize);
            frame.add_column_values(&format!("{column}_lag{lag}"), DType::Float, cells)?;
        }
    }
    Ok(())
}

/// Add `{col}_lead{k}` columns (future values, used as placebo checks).
///
/// # Errors
///
/// Same conditions as [`add_lags`].
pub fn add_leads(frame: &mut Frame, columns: &[&str], leads: &[usize]) -> Result<(), PanelError> {
    let groups = show_groups(frame);
    for column in columns {
        if !frame.has_column(column) {
            return Err(PanelError::ColumnNotFound {
                name: (*column).to_string(),
            });
        }
        let values = frame.f64_column(column);
        for &lead in leads {
            #[allow(clippy::cast_possible_wrap)]
            let cells = shifted(&values, &groups, -(lead as isize));
            frame.add_column_values(&format!("{column}_lead{lead}"), DType::Float, cells)?;
        }
    }
    Ok(())
}

/// Add week-over-week `{col}_wow` (difference) and `{col}_pct` (fractional
/// change; absent when the prior week is absent or zero).
///
/// # Errors
///
/// Same conditions as [`add_lags`].
pub fn add_deltas(frame: &mut Frame, columns: &[&str]) -> Result<(), PanelError> {
    let groups = show_groups(frame);
    for column in columns {
        if !frame.has_column(column) {
            return Err(PanelError::ColumnNotFound {
                name: (*column).to_string(),
            });
        }
        let values = frame.f64_column(column);
        let mut wow = vec![None; values.len()];
        let mut pct = vec![None; values.len()];
        for &(start, end) in &groups {
            for row in (start + 1)..end {
                if let (Some(current), Some(prior)) = (values[row], values[row - 1]) {
                    wow[row] = Some(Value::Float(current - prior));
                    if prior != 0.0 {
                        pct[row] = Some(Value::Float((current - prior) / prior));
                    }
                }
            }
        }
        frame.add_column_values(&format!("{column}_wow"), DType::Float, wow)?;
        frame.add_column_values(&format!("{column}_pct"), DType::Float, pct)?;
    }
    Ok(())
}

/// Add trailing `{col}_roll{w}_sum` and `{col}_roll{w}_mean` over the last
/// `window` weeks including the current one; absent until the window is
/// fully populated.
///
/// # Errors
///
/// Same conditions as [`add_lags`].
pub fn add_rolling(
    frame: &mut Frame,
    columns: &[&str],
    window: usize,
) -> Result<(), PanelError> {
    let groups = show_groups(frame);
    for column in columns {
        if !frame.has_column(column) {
            return Err(PanelError::ColumnNotFound {
                name: (*column).to_string(),
            });
        }
        let values = frame.f64_column(column);
        let mut sums = vec![None; values.len()];
        let mut means = vec![None; values.len()];
        for &(start, end) in &groups {
            for row in start..end {
                if row + 1 < start + window {
                    continue;
                }
                let slice = &values[row + 1 - window..=row];
                if slice.iter().all(Option::is_some) {
                    let sum: f64 = slice.iter().flatten().sum();
                    sums[row] = Some(Value::Float(sum));
                    #[allow(clippy::cast_precision_loss)]
                    {
                        means[row] = Some(Value::Float(sum / window as f64));
                    }
                }
            }
        }
        frame.add_column_values(&format!("{column}_roll{window}_sum"), DType::Float, sums)?;
        frame.add_column_values(&format!("{column}_roll{window}_mean"), DType::Float, means)?;
    }
    Ok(())
}

/// Add `{col}_z`: the cell standardized against its own show's mean and
/// standard deviation. Absent when the show has fewer than two observed
/// values or zero variance.
///
/// # Errors
///
/// Same conditions as [`add_lags`].
pub fn add_zscores(frame: &mut Frame, columns: &[&str]) -> Result<(), PanelError> {
    let groups = show_groups(frame);
    for column in columns {
        if !frame.has_column(column) {
            return Err(PanelError::ColumnNotFound {
                name: (*column).to_string(),
            });
        }
        let values = frame.f64_column(column);
        let mut zs = vec![None; values.len()];
        for &(start, end) in &groups {
            let observed: Vec<f64> = values[start..end].iter().flatten().copied().collect();
            if observed.len() < 2 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let sd = variance.sqrt();
            if sd == 0.0 {
                continue;
            }
            for row in start..end {
                if let Some(value) = values[row] {
                    zs[row] = Some(Value::Float((value - mean) / sd));
                }
            }
        }
        frame.add_column_values(&format!("{column}_z"), DType::Float, zs)?;
    }
    Ok(())
}
