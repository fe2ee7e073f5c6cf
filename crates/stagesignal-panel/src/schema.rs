//! Canonical weekly-panel schema: one declared column list that every
//! persisted panel conforms to, regardless of which sources ran.
//!
//! `enforce_schema` is the writer-side gate (insert, drop, reorder,
//! coerce) and `validate_schema` is the reader-side check; enforcement
//! output always validates, and enforcement is idempotent.

use serde::Serialize;

use crate::frame::{DType, Frame};

/// One declared column of the canonical panel.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub dtype: DType,
    pub nullable: bool,
}

impl ColumnSpec {
    const fn required(name: &'static str, dtype: DType) -> Self {
        Self {
            name,
            dtype,
            nullable: false,
        }
    }

    const fn optional(name: &'static str, dtype: DType) -> Self {
        Self {
            name,
            dtype,
            nullable: true,
        }
    }
}

/// The canonical column list: keys first, then per-source metric blocks,
/// then provenance. Only the keys are non-nullable; every metric may be
/// absent for a given (show, week).
#[must_use]
pub fn canonical_schema() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::required("show", DType::Str),
        ColumnSpec::required("week_start", DType::Str),
        ColumnSpec::optional("tt_posts", DType::Int),
        ColumnSpec::optional("tt_sum_views", DType::Int),
        ColumnSpec::optional("tt_sum_likes", DType::Int),
        ColumnSpec::optional("tt_sum_comments", DType::Int),
        ColumnSpec::optional("tt_sum_shares", DType::Int),
        ColumnSpec::optional("tt_unique_hashtags", DType::Int),
        ColumnSpec::optional("tt_posting_days", DType::Int),
        ColumnSpec::optional("ig_posts", DType::Int),
        ColumnSpec::optional("ig_sum_likes", DType::Int),
        ColumnSpec::optional("ig_sum_comments", DType::Int),
        ColumnSpec::optional("ig_unique_hashtags", DType::Int),
        ColumnSpec::optional("ig_reel_ct", DType::Int),
        ColumnSpec::optional("ig_posting_days", DType::Int),
        ColumnSpec::optional("gt_index", DType::Float),
        ColumnSpec::optional("gt_is_partial", DType::Bool),
        ColumnSpec::optional("wiki_views", DType::Int),
        ColumnSpec::optional("wiki_days", DType::Int),
        ColumnSpec::optional("rd_posts", DType::Int),
        ColumnSpec::optional("rd_sum_score", DType::Int),
        ColumnSpec::optional("rd_sum_comments", DType::Int),
        ColumnSpec::optional("rd_posting_days", DType::Int),
        ColumnSpec::optional("has_tiktok", DType::Bool),
        ColumnSpec::optional("has_instagram", DType::Bool),
        ColumnSpec::optional("has_trends", DType::Bool),
        ColumnSpec::optional("has_wikipedia", DType::Bool),
        ColumnSpec::optional("has_reddit", DType::Bool),
        ColumnSpec::optional("scrape_run_at", DType::Str),
    ]
}

/// Conform `frame` to `schema`: insert missing declared columns as
/// all-absent, drop undeclared columns, order columns per the schema, and
/// coerce each column's cells to the declared dtype (coercion failures
/// become absent). Idempotent.
#[must_use]
pub fn enforce_schema(frame: &Frame, schema: &[ColumnSpec]) -> Frame {
    let mut out = frame.clone();

    let mut inserted = 0usize;
    for spec in schema {
        if !out.has_column(spec.name) {
            // Cannot collide: the guard above just checked.
            let _ = out.add_column(spec.name, spec.dtype);
            inserted += 1;
        }
    }

    let declared: Vec<&str> = schema.iter().map(|s| s.name).collect();
    let dropped = out
        .column_names()
        .iter()
        .filter(|n| !declared.contains(*n))
        .count();
    out.reorder_columns(&declared);

    for spec in schema {
        out.coerce_column(spec.name, spec.dtype);
    }

    if inserted > 0 || dropped > 0 {
        tracing::debug!(inserted, dropped, "schema enforcement adjusted columns");
    }

    out
}

/// Check `frame` against `schema` without modifying it. Returns the list
/// of violations; empty means conformant.
#[must_use]
pub fn validate_schema(frame: &Frame, schema: &[ColumnSpec]) -> Vec<String> {
    let mut errors = Vec::new();

    let names = frame.column_names();
    let declared: Vec<&str> = schema.iter().map(|s| s.name).collect();

    for spec in schema {
        match frame.column(spec.name) {
            None => errors.push(format!("missing column: {}", spec.name)),
            Some(column) => {
                if column.dtype != spec.dtype {
                    errors.push(format!(
                        "column {} has dtype {:?}, expected {:?}",
                        spec.name, column.dtype, spec.dtype
                    ));
                }
                if !spec.nullable && column.non_null_count() != frame.len() {
                    errors.push(format!(
                        "non-nullable column {} has absent cells",
                        spec.name
                    ));
                }
            }
        }
    }

    for name in &names {
        if !declared.contains(name) {
            errors.push(format!("undeclared column: {name}"));
        }
    }

    // Order check only makes sense once the sets match.
    if errors.is_empty() && names != declared {
        errors.push("columns are out of canonical order".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Value;

    fn messy_frame() -> Frame {
        let mut frame = Frame::with_columns(&[
            ("stray", DType::Str),
            ("week_start", DType::Str),
            ("show", DType::Str),
            ("tt_sum_views", DType::Str),
        ]);
        frame
            .push_row(vec![
                Some(Value::Str("noise".into())),
                Some(Value::Str("2024-01-01".into())),
                Some(Value::Str("hamlet".into())),
                Some(Value::Str("1200".into())),
            ])
            .unwrap();
        frame
            .push_row(vec![
                None,
                Some(Value::Str("2024-01-08".into())),
                Some(Value::Str("hamlet".into())),
                Some(Value::Str("n/a".into())),
            ])
            .unwrap();
        frame
    }

    #[test]
    fn enforced_frame_validates() {
        let schema = canonical_schema();
        let enforced = enforce_schema(&messy_frame(), &schema);
        assert!(validate_schema(&enforced, &schema).is_empty());
    }

    #[test]
    fn enforcement_is_idempotent() {
        let schema = canonical_schema();
        let once = enforce_schema(&messy_frame(), &schema);
        let twice = enforce_schema(&once, &schema);
        assert_eq!(once.column_names(), twice.column_names());
        for name in once.column_names() {
            for row in 0..once.len() {
                assert_eq!(once.get(row, name), twice.get(row, name));
            }
        }
    }

    #[test]
    fn undeclared_columns_are_dropped_and_missing_inserted() {
        let schema = canonical_schema();
        let enforced = enforce_schema(&messy_frame(), &schema);
        assert!(!enforced.has_column("stray"));
        assert!(enforced.has_column("wiki_views"));
        assert_eq!(enforced.get(0, "wiki_views"), None);
    }

    #[test]
    fn coercion_failure_becomes_absent() {
        let schema = canonical_schema();
        let enforced = enforce_schema(&messy_frame(), &schema);
        assert_eq!(enforced.get(0, "tt_sum_views"), Some(&Value::Int(1200)));
        assert_eq!(enforced.get(1, "tt_sum_views"), None);
    }

    #[test]
    fn validate_flags_absent_keys() {
        let schema = canonical_schema();
        let mut frame = enforce_schema(&Frame::new(), &schema);
        let cells = schema.iter().map(|_| None).collect();
        frame.push_row(cells).unwrap();
        let errors = validate_schema(&frame, &schema);
        assert!(errors.iter().any(|e| e.contains("show")));
        assert!(errors.iter().any(|e| e.contains("week_start")));
    }

    #[test]
    fn validate_flags_wrong_order() {
        let schema = canonical_schema();
        let mut enforced = enforce_schema(&messy_frame(), &schema);
        enforced.rename_column("show", "tmp");
        enforced.rename_column("week_start", "show");
        enforced.rename_column("tmp", "week_start");
        let errors = validate_schema(&enforced, &schema);
        assert!(errors.iter().any(|e| e.contains("order")));
    }
}
