//! Panel artifact codecs: CSV for the panel itself, JSON for the schema
//! companion and the validation report.
//!
//! The CSV dialect is RFC 4180: fields containing commas, quotes, or
//! newlines are quoted, embedded quotes doubled. Absent cells round-trip
//! as empty fields; an empty field always reads back as absent, so a panel
//! written and re-read preserves the absent-vs-zero distinction.

use std::fs;
use std::path::Path;

use crate::frame::{DType, Frame, Value};
use crate::quality::ValidationReport;
use crate::schema::ColumnSpec;
use crate::PanelError;

fn io_err(path: &Path, source: std::io::Error) -> PanelError {
    PanelError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn escape_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Write `frame` as CSV with a header row.
///
/// # Errors
///
/// Returns [`PanelError::Io`] on filesystem failure.
pub fn write_csv(frame: &Frame, path: &Path) -> Result<(), PanelError> {
    let mut out = String::new();
    let header: Vec<String> = frame
        .column_names()
        .iter()
        .map(|n| escape_field(n))
        .collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in 0..frame.len() {
        let cells: Vec<String> = frame
            .row(row)
            .iter()
            .map(|cell| cell.as_ref().map_or_else(String::new, |v| escape_field(&v.render())))
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| io_err(path, e))?;
    tracing::info!(path = %path.display(), rows = frame.len(), "wrote panel CSV");
    Ok(())
}

/// Split CSV text into records of fields, honoring quoted fields that may
/// contain commas, doubled quotes, and newlines.
fn parse_records(text: &str) -> Result<Vec<Vec<String>>, PanelError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => {
                    if field.is_empty() {
                        in_quotes = true;
                    } else {
                        return Err(PanelError::Csv {
                            line,
                            reason: "quote inside unquoted field".to_string(),
                        });
                    }
                }
                ',' => {
                    record.push(std::mem::take(&mut field));
                }
                '\r' => {}
                '\n' => {
                    line += 1;
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err(PanelError::Csv {
            line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

fn infer_dtype(cells: &[Option<String>]) -> DType {
    let observed: Vec<&String> = cells.iter().flatten().collect();
    if observed.is_empty() {
        return DType::Str;
    }
    if observed.iter().all(|s| s.parse::<i64>().is_ok()) {
        return DType::Int;
    }
    if observed.iter().all(|s| s.parse::<f64>().is_ok()) {
        return DType::Float;
    }
    if observed.iter().all(|s| *s == "true" || *s == "false") {
        return DType::Bool;
    }
    DType::Str
}

/// Read a CSV file into a frame, inferring Int/Float/Bool/Str per column
/// from the observed cells. Empty fields become absent. The canonical
/// schema enforcer should run on the result before use.
///
/// # Errors
///
/// Returns [`PanelError::Io`] on filesystem failure or [`PanelError::Csv`]
/// on malformed input (ragged rows, bad quoting, empty file).
pub fn read_csv(path: &Path) -> Result<Frame, PanelError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let records = parse_records(&text)?;
    let Some((header, rows)) = records.split_first() else {
        return Err(PanelError::Csv {
            line: 1,
            reason: "empty file".to_string(),
        });
    };

    let mut cells_by_column: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
    for (offset, record) in rows.iter().enumerate() {
        if record.len() != header.len() {
            return Err(PanelError::Csv {
                line: offset + 2,
                reason: format!(
                    "expected {} fields, found {}",
                    header.len(),
                    record.len()
                ),
            });
        }
        for (idx, raw) in record.iter().enumerate() {
            cells_by_column[idx].push(if raw.is_empty() {
                None
            } else {
                Some(raw.clone())
            });
        }
    }

    let mut frame = Frame::new();
    for (name, raw_cells) in header.iter().zip(cells_by_column) {
        let dtype = infer_dtype(&raw_cells);
        let values: Vec<Option<Value>> = raw_cells
            .into_iter()
            .map(|cell| {
                cell.and_then(|raw| Value::Str(raw).coerce(dtype))
            })
            .collect();
        frame.add_column_values(name, dtype, values)?;
    }
    tracing::debug!(path = %path.display(), rows = frame.len(), columns = frame.width(), "read panel CSV");
    Ok(frame)
}

/// Write the canonical column list as a JSON companion to the panel CSV.
///
/// # Errors
///
/// Returns [`PanelError::Json`] or [`PanelError::Io`].
pub fn write_schema_json(schema: &[ColumnSpec], path: &Path) -> Result<(), PanelError> {
    let text = serde_json::to_string_pretty(schema)?;
    fs::write(path, text).map_err(|e| io_err(path, e))
}

/// Persist a validation report as pretty JSON.
///
/// # Errors
///
/// Returns [`PanelError::Json`] or [`PanelError::Io`].
pub fn write_validation_report(report: &ValidationReport, path: &Path) -> Result<(), PanelError> {
    let text = serde_json::to_string_pretty(report)?;
    fs::write(path, text).map_err(|e| io_err(path, e))
}

/// Load a previously written validation report.
///
/// # Errors
///
/// Returns [`PanelError::Io`] or [`PanelError::Json`].
pub fn read_validation_report(path: &Path) -> Result<ValidationReport, PanelError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        let mut frame = Frame::with_columns(&[
            ("show", DType::Str),
            ("week_start", DType::Str),
            ("tt_sum_views", DType::Int),
            ("gt_index", DType::Float),
            ("gt_is_partial", DType::Bool),
        ]);
        frame
            .push_row(vec![
                Some(Value::Str("oh, mary!".into())),
                Some(Value::Str("2024-01-01".into())),
                Some(Value::Int(1200)),
                Some(Value::Float(55.5)),
                Some(Value::Bool(false)),
            ])
            .unwrap();
        frame
            .push_row(vec![
                Some(Value::Str("hamlet".into())),
                Some(Value::Str("2024-01-08".into())),
                None,
                None,
                None,
            ])
            .unwrap();
        frame
    }

    #[test]
    fn csv_round_trip_preserves_absence_and_types() {
        let dir = std::env::temp_dir().join("stagesignal-io-roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("panel.csv");

        let original = sample();
        write_csv(&original, &path).unwrap();
        let reread = read_csv(&path).unwrap();

        assert_eq!(reread.len(), 2);
        assert_eq!(reread.get_str(0, "show"), Some("oh, mary!"));
        assert_eq!(reread.get(0, "tt_sum_views"), Some(&Value::Int(1200)));
        assert_eq!(reread.get_f64(0, "gt_index"), Some(55.5));
        assert_eq!(reread.get(0, "gt_is_partial"), Some(&Value::Bool(false)));
        assert_eq!(reread.get(1, "tt_sum_views"), None);
        assert_eq!(reread.get(1, "gt_index"), None);
    }

    #[test]
    fn commas_and_quotes_are_escaped() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn ragged_row_is_rejected_with_line_number() {
        let err = parse_and_read("a,b\n1,2\n3\n").unwrap_err();
        match err {
            PanelError::Csv { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn parse_and_read(text: &str) -> Result<Frame, PanelError> {
        let dir = std::env::temp_dir().join("stagesignal-io-parse");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("case-{}.csv", text.len()));
        std::fs::write(&path, text).unwrap();
        read_csv(&path)
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse_records("a,b\n\"open,2\n").unwrap_err();
        assert!(matches!(err, PanelError::Csv { .. }));
    }

    #[test]
    fn quoted_newline_stays_in_field() {
        let records = parse_records("a\n\"line1\nline2\"\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][0], "line1\nline2");
    }

    #[test]
    fn mixed_numeric_column_infers_float() {
        let frame = parse_and_read("x\n1\n2.5\n").unwrap();
        assert_eq!(frame.column("x").unwrap().dtype, DType::Float);
        assert_eq!(frame.get_f64(0, "x"), Some(1.0));
    }

    #[test]
    fn validation_report_round_trips() {
        use crate::merge::default_source_specs;
        use crate::quality::{generate_validation_report, QualityConfig};
        use crate::schema::canonical_schema;

        let schema = canonical_schema();
        let frame = crate::schema::enforce_schema(&Frame::new(), &schema);
        let report = generate_validation_report(
            &frame,
            &schema,
            &default_source_specs(),
            &QualityConfig::default(),
        );

        let dir = std::env::temp_dir().join("stagesignal-io-report");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("validation.json");
        write_validation_report(&report, &path).unwrap();
        let reread = read_validation_report(&path).unwrap();
        assert_eq!(reread.status, report.status);
        assert_eq!(reread.coverage.len(), report.coverage.len());
    }
}
