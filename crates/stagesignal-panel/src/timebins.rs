//! Deterministic weekly binning.
//!
//! Every source is aggregated into weeks identified by their start date
//! under one configured week-start day, so cross-source joins line up by
//! construction. `fill_missing_weeks` makes collection gaps explicit:
//! a show with no activity in a week still gets a row, with absent metrics,
//! so sparse activity is never conflated with sparse collection.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::frame::{Frame, Value};
use crate::PanelError;

/// Floor `date` to the start of its containing week.
///
/// The result is always `<= date` and within the prior six days, and is a
/// fixed point: `week_start(week_start(d)) == week_start(d)`.
#[must_use]
pub fn week_start(date: NaiveDate, start_day: Weekday) -> NaiveDate {
    let offset = (7 + date.weekday().num_days_from_monday()
        - start_day.num_days_from_monday())
        % 7;
    date - Days::new(u64::from(offset))
}

/// Every week-start date from the floor of `start` through `end`, inclusive.
/// Strictly ascending, no gaps, no duplicates.
#[must_use]
pub fn week_range(start: NaiveDate, end: NaiveDate, start_day: Weekday) -> Vec<NaiveDate> {
    let mut weeks = Vec::new();
    let mut current = week_start(start, start_day);
    while current <= end {
        weeks.push(current);
        current = current + Days::new(7);
    }
    weeks
}

/// ISO rendering used in the `week_start` panel column.
#[must_use]
pub fn format_week(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Expand a weekly panel to the full Cartesian product of distinct keys and
/// the week range, left-joining existing rows. Keys are the values of
/// `key_col` (the show slug); the week column must be named `week_start`.
///
/// # Errors
///
/// Returns [`PanelError::ColumnNotFound`] when `key_col` or `week_start` is
/// missing.
pub fn fill_missing_weeks(
    frame: &Frame,
    start: NaiveDate,
    end: NaiveDate,
    key_col: &str,
    start_day: Weekday,
) -> Result<Frame, PanelError> {
    for required in [key_col, "week_start"] {
        if !frame.has_column(required) {
            return Err(PanelError::ColumnNotFound {
                name: required.to_string(),
            });
        }
    }

    // Distinct keys in first-seen order.
    let mut keys: Vec<String> = Vec::new();
    for row in 0..frame.len() {
        if let Some(key) = frame.get_str(row, key_col) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }

    // Index existing rows by (key, week).
    let mut index = std::collections::HashMap::new();
    for row in 0..frame.len() {
        if let (Some(key), Some(week)) = (frame.get_str(row, key_col), frame.get_str(row, "week_start")) {
            index.insert((key.to_string(), week.to_string()), row);
        }
    }

    let weeks: Vec<String> = week_range(start, end, start_day)
        .into_iter()
        .map(format_week)
        .collect();

    let mut filled = Frame::new();
    for column in frame.columns() {
        filled.add_column(&column.name, column.dtype)?;
    }

    let mut missing = 0usize;
    for key in &keys {
        for week in &weeks {
            if let Some(&row) = index.get(&(key.clone(), week.clone())) {
                filled.push_row(frame.row(row))?;
            } else {
                let cells = frame
                    .columns()
                    .iter()
                    .map(|c| {
                        if c.name == key_col {
                            Some(Value::Str(key.clone()))
                        } else if c.name == "week_start" {
                            Some(Value::Str(week.clone()))
                        } else {
                            None
                        }
                    })
                    .collect();
                filled.push_row(cells)?;
                missing += 1;
            }
        }
    }

    tracing::debug!(
        keys = keys.len(),
        weeks = weeks.len(),
        filled_rows = filled.len(),
        inserted = missing,
        "filled missing panel weeks"
    );

    Ok(filled)
}
