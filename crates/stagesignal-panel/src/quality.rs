//! Data-quality gate over a merged weekly panel.
//!
//! Produces a [`ValidationReport`] covering per-source coverage, spike and
//! drop anomalies against a trailing median, schema conformance, and
//! timestamp hygiene, rolled up into an OK / ACTION_NEEDED status that the
//! modeling stage refuses to cross without an explicit override.

use std::collections::BTreeSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::frame::{DType, Frame};
use crate::merge::SourceSpec;
use crate::schema::{validate_schema, ColumnSpec};
use crate::timebins::week_start;

/// Thresholds for the gate; defaults match the pipeline's env defaults.
#[derive(Debug, Clone)]
pub struct QualityConfig {
    /// Ratio to the trailing median beyond which a cell is anomalous.
    pub anomaly_threshold: f64,
    /// Trailing window length, in prior non-absent weeks.
    pub anomaly_lookback_weeks: usize,
    /// Total anomaly count above which the panel is ACTION_NEEDED.
    pub anomaly_ceiling: usize,
    /// Per-source coverage percentage below which the panel is ACTION_NEEDED.
    pub coverage_floor_pct: f64,
    /// Week-start convention the timestamp check enforces.
    pub week_start_day: Weekday,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 5.0,
            anomaly_lookback_weeks: 8,
            anomaly_ceiling: 10,
            coverage_floor_pct: 60.0,
            week_start_day: Weekday::Mon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Ok,
    ActionNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

/// One cell flagged against its trailing median.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub show: String,
    pub week_start: String,
    pub column: String,
    pub value: f64,
    pub trailing_median: f64,
    pub ratio: f64,
    pub kind: AnomalyKind,
}

/// Availability of one source across the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub source: String,
    pub metric: String,
    pub present_rows: usize,
    pub total_rows: usize,
    pub coverage_pct: f64,
    pub distinct_shows: usize,
    pub distinct_weeks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub rows: usize,
    pub coverage: Vec<CoverageMetrics>,
    pub anomaly_count: usize,
    /// Truncated to [`ANOMALY_REPORT_CAP`] entries; `anomaly_count` is exact.
    pub anomalies: Vec<Anomaly>,
    pub schema_ok: bool,
    pub schema_errors: Vec<String>,
    pub timestamp_issues: Vec<String>,
}

/// Persisted anomaly list cap; the full count is still reported.
pub const ANOMALY_REPORT_CAP: usize = 100;

/// Median of a non-empty slice. Not exposed; panel medians are tiny.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        f64::midpoint(values[mid - 1], values[mid])
    }
}

/// Flag cells whose ratio to the trailing median of the same show/column
/// is strictly above `threshold` (spike) or strictly between zero and
/// `1/threshold` (drop). One prior observed week is enough baseline; rows
/// without a positive trailing median are never flagged. Assumes rows
/// sorted by (show, week_start); detection walks row order within each
/// show.
#[must_use]
pub fn detect_anomalies(frame: &Frame, config: &QualityConfig) -> Vec<Anomaly> {
    let metric_columns: Vec<String> = frame
        .columns()
        .iter()
        .filter(|c| {
            matches!(c.dtype, DType::Int | DType::Float)
                && c.name != "show"
                && c.name != "week_start"
        })
        .map(|c| c.name.clone())
        .collect();

    let mut anomalies = Vec::new();
    for column in &metric_columns {
        let values = frame.f64_column(column);
        let mut history: Vec<f64> = Vec::new();
        let mut current_show: Option<&str> = None;
        for row in 0..frame.len() {
            let show = frame.get_str(row, "show").unwrap_or_default();
            if current_show != Some(show) {
                current_show = Some(show);
                history.clear();
            }
            let Some(value) = values[row] else { continue };
            if !history.is_empty() {
                let start = history.len().saturating_sub(config.anomaly_lookback_weeks);
                let mut window: Vec<f64> = history[start..].to_vec();
                let baseline = median(&mut window);
                if baseline > 0.0 {
                    let ratio = value / baseline;
                    let kind = if ratio > config.anomaly_threshold {
                        Some(AnomalyKind::Spike)
                    } else if ratio > 0.0 && ratio < 1.0 / config.anomaly_threshold {
                        Some(AnomalyKind::Drop)
                    } else {
                        None
                    };
                    if let Some(kind) = kind {
                        anomalies.push(Anomaly {
                            show: show.to_string(),
                            week_start: frame
                                .get_str(row, "week_start")
                                .unwrap_or_default()
                                .to_string(),
                            column: column.clone(),
                            value,
                            trailing_median: baseline,
                            ratio,
                            kind,
                        });
                    }
                }
            }
            history.push(value);
        }
    }
    anomalies
}

/// Per-source availability over the merged panel.
#[must_use]
pub fn coverage_by_source(frame: &Frame, specs: &[SourceSpec]) -> Vec<CoverageMetrics> {
    specs
        .iter()
        .map(|spec| {
            let mut present = 0usize;
            let mut shows = BTreeSet::new();
            let mut weeks = BTreeSet::new();
            for row in 0..frame.len() {
                if frame.get(row, spec.presence_metric).is_some() {
                    present += 1;
                    if let Some(show) = frame.get_str(row, "show") {
                        shows.insert(show.to_string());
                    }
                    if let Some(week) = frame.get_str(row, "week_start") {
                        weeks.insert(week.to_string());
                    }
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let coverage_pct = if frame.is_empty() {
                0.0
            } else {
                100.0 * present as f64 / frame.len() as f64
            };
            CoverageMetrics {
                source: spec.name.to_string(),
                metric: spec.presence_metric.to_string(),
                present_rows: present,
                total_rows: frame.len(),
                coverage_pct,
                distinct_shows: shows.len(),
                distinct_weeks: weeks.len(),
            }
        })
        .collect()
}

/// Week-alignment, duplicate-key, and monotonicity checks.
#[must_use]
pub fn timestamp_issues(frame: &Frame, start_day: Weekday) -> Vec<String> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();
    let mut previous: Option<(String, String)> = None;
    for row in 0..frame.len() {
        let show = frame.get_str(row, "show").unwrap_or_default().to_string();
        let Some(raw) = frame.get_str(row, "week_start") else {
            issues.push(format!("row {row}: absent week_start"));
            continue;
        };
        match chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Err(_) => issues.push(format!("row {row}: unparsable week_start {raw:?}")),
            Ok(date) => {
                if week_start(date, start_day) != date {
                    issues.push(format!(
                        "row {row}: week_start {raw} is not aligned to {start_day}"
                    ));
                }
            }
        }
        if !seen.insert((show.clone(), raw.to_string())) {
            issues.push(format!("row {row}: duplicate key ({show}, {raw})"));
        }
        if let Some((prev_show, prev_week)) = &previous {
            if *prev_show == show && raw < prev_week.as_str() {
                issues.push(format!(
                    "row {row}: week_start {raw} regresses within show {show}"
                ));
            }
        }
        previous = Some((show, raw.to_string()));
    }
    issues
}

/// Run every check and roll up the status. ACTION_NEEDED when any source
/// coverage falls below the floor, the anomaly count exceeds the ceiling,
/// the schema does not validate, or any timestamp issue exists.
#[must_use]
pub fn generate_validation_report(
    frame: &Frame,
    schema: &[ColumnSpec],
    specs: &[SourceSpec],
    config: &QualityConfig,
) -> ValidationReport {
    let coverage = coverage_by_source(frame, specs);
    let anomalies = detect_anomalies(frame, config);
    let schema_errors = validate_schema(frame, schema);
    let timestamps = timestamp_issues(frame, config.week_start_day);

    let coverage_breached = coverage
        .iter()
        .any(|c| c.coverage_pct < config.coverage_floor_pct);
    let status = if coverage_breached
        || anomalies.len() > config.anomaly_ceiling
        || !schema_errors.is_empty()
        || !timestamps.is_empty()
    {
        ValidationStatus::ActionNeeded
    } else {
        ValidationStatus::Ok
    };

    tracing::info!(
        rows = frame.len(),
        anomalies = anomalies.len(),
        coverage_breached,
        schema_ok = schema_errors.is_empty(),
        timestamp_issues = timestamps.len(),
        status = ?status,
        "validation report generated"
    );

    let anomaly_count = anomalies.len();
    let mut capped = anomalies;
    capped.truncate(ANOMALY_REPORT_CAP);

    ValidationReport {
        status,
        rows: frame.len(),
        coverage,
        anomaly_count,
        anomalies: capped,
        schema_ok: schema_errors.is_empty(),
        schema_errors,
        timestamp_issues: timestamps,
    }
}
