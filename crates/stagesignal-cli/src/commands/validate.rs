//! `validate`: run the quality gate over a panel CSV and persist the
//! report. The exit code reflects only I/O health; an ACTION_NEEDED panel
//! still writes its report and exits zero, and the modeling stage is the
//! one that refuses to consume it.

use std::fs;

use anyhow::Context;

use stagesignal_core::AppConfig;
use stagesignal_panel::{
    canonical_schema, default_source_specs, enforce_schema, generate_validation_report, io,
    QualityConfig, ValidationStatus,
};

use crate::ValidateArgs;

pub fn run(config: &AppConfig, args: &ValidateArgs) -> anyhow::Result<()> {
    let raw = io::read_csv(&args.panel)
        .with_context(|| format!("reading panel {}", args.panel.display()))?;
    let schema = canonical_schema();
    // Normalize dtypes the CSV reader could not infer (all-absent columns).
    let panel = enforce_schema(&raw, &schema);

    let quality = QualityConfig {
        anomaly_threshold: config.anomaly_threshold,
        anomaly_lookback_weeks: config.anomaly_lookback_weeks,
        anomaly_ceiling: config.anomaly_ceiling,
        coverage_floor_pct: config.coverage_floor_pct,
        week_start_day: config.week_start_day,
    };
    let report =
        generate_validation_report(&panel, &schema, &default_source_specs(), &quality);

    let out = args.out.clone().unwrap_or_else(|| {
        config.data_dir.join("validation_report.json")
    });
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    io::write_validation_report(&report, &out)?;

    let status = match report.status {
        ValidationStatus::Ok => "OK",
        ValidationStatus::ActionNeeded => "ACTION_NEEDED",
    };
    println!(
        "validation: {status} ({} rows, {} anomalies, {} timestamp issues) -> {}",
        report.rows,
        report.anomaly_count,
        report.timestamp_issues.len(),
        out.display()
    );
    for coverage in &report.coverage {
        println!(
            "  {:<10} {:>6.1}% ({} shows, {} weeks)",
            coverage.source, coverage.coverage_pct, coverage.distinct_shows, coverage.distinct_weeks
        );
    }
    Ok(())
}
