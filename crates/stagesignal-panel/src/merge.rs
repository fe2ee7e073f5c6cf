//! Outer-union merge of per-source weekly frames into one panel.
//!
//! Every (show, week_start) pair seen in any input appears exactly once in
//! the output; metrics a source never observed for that pair stay absent.
//! Each source also contributes a `has_<source>` flag derived from its
//! declared presence metric, so downstream code can tell "source ran but
//! saw nothing" apart from "source absent entirely".

use std::collections::HashMap;

use crate::frame::{DType, Frame, Value};
use crate::PanelError;

/// Declares how one source's frame participates in the merge.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    /// Short source name, used for collision suffixes and the flag column.
    pub name: &'static str,
    /// Column prefix this source's metrics carry (`tt`, `ig`, ...).
    pub prefix: &'static str,
    /// Metric whose presence marks the source as available for a row.
    pub presence_metric: &'static str,
}

/// The five sources of the canonical panel, in canonical order.
#[must_use]
pub fn default_source_specs() -> Vec<SourceSpec> {
    vec![
        SourceSpec {
            name: "tiktok",
            prefix: "tt",
            presence_metric: "tt_posts",
        },
        SourceSpec {
            name: "instagram",
            prefix: "ig",
            presence_metric: "ig_posts",
        },
        SourceSpec {
            name: "trends",
            prefix: "gt",
            presence_metric: "gt_index",
        },
        SourceSpec {
            name: "wikipedia",
            prefix: "wiki",
            presence_metric: "wiki_views",
        },
        SourceSpec {
            name: "reddit",
            prefix: "rd",
            presence_metric: "rd_posts",
        },
    ]
}

const KEY_COLS: [&str; 2] = ["show", "week_start"];

/// Merge per-source frames keyed on (show, week_start) into one panel.
///
/// Non-key column names that collide with an earlier source's column are
/// suffixed `_<source>`. Rows are sorted by show then week. Each source
/// gets a `has_<source>` column: true where its presence metric is
/// non-absent, false elsewhere (including rows the source never emitted).
///
/// # Errors
///
/// Returns [`PanelError::ColumnNotFound`] when an input frame lacks a key
/// column.
pub fn merge_panels(inputs: &[(SourceSpec, Frame)]) -> Result<Frame, PanelError> {
    for (spec, frame) in inputs {
        for key in KEY_COLS {
            if !frame.has_column(key) {
                tracing::error!(source = spec.name, column = key, "merge input missing key");
                return Err(PanelError::ColumnNotFound {
                    name: key.to_string(),
                });
            }
        }
    }

    // Union of keys, first-seen order; sorted at the end.
    let mut key_index: HashMap<(String, String), usize> = HashMap::new();
    let mut keys: Vec<(String, String)> = Vec::new();
    for (_, frame) in inputs {
        for row in 0..frame.len() {
            let (Some(show), Some(week)) =
                (frame.get_str(row, "show"), frame.get_str(row, "week_start"))
            else {
                continue;
            };
            let key = (show.to_string(), week.to_string());
            if !key_index.contains_key(&key) {
                key_index.insert(key.clone(), keys.len());
                keys.push(key);
            }
        }
    }

    let mut merged = Frame::new();
    merged.add_column("show", DType::Str)?;
    merged.add_column("week_start", DType::Str)?;
    for (show, week) in &keys {
        merged.push_row(vec![
            Some(Value::Str(show.clone())),
            Some(Value::Str(week.clone())),
        ])?;
    }

    for (spec, frame) in inputs {
        // Row index of each key within this source's frame.
        let mut owned_keys: Vec<((String, String), usize)> = Vec::with_capacity(frame.len());
        for row in 0..frame.len() {
            let (Some(show), Some(week)) =
                (frame.get_str(row, "show"), frame.get_str(row, "week_start"))
            else {
                continue;
            };
            owned_keys.push(((show.to_string(), week.to_string()), row));
        }
        let mut rows_by_key: HashMap<&(String, String), usize> = HashMap::new();
        for (key, row) in &owned_keys {
            rows_by_key.insert(key, *row);
        }

        let mut presence = vec![Some(Value::Bool(false)); keys.len()];

        for column in frame.columns() {
            if KEY_COLS.contains(&column.name.as_str()) {
                continue;
            }
            let out_name = if merged.has_column(&column.name) {
                let suffixed = format!("{}_{}", column.name, spec.name);
                tracing::warn!(
                    source = spec.name,
                    column = %column.name,
                    renamed = %suffixed,
                    "column collision during merge"
                );
                suffixed
            } else {
                column.name.clone()
            };

            let mut values: Vec<Option<Value>> = vec![None; keys.len()];
            for (key, &source_row) in &rows_by_key {
                let target = key_index[key];
                values[target] = column.values.get(source_row).cloned().flatten();
                if column.name == spec.presence_metric && values[target].is_some() {
                    presence[target] = Some(Value::Bool(true));
                }
            }
            merged.add_column_values(&out_name, column.dtype, values)?;
        }

        merged.add_column_values(&format!("has_{}", spec.name), DType::Bool, presence)?;
    }

    merged.sort_rows_by(&KEY_COLS);

    tracing::info!(
        sources = inputs.len(),
        rows = merged.len(),
        columns = merged.width(),
        "merged source panels"
    );

    Ok(merged)
}
