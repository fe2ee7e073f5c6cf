//! `model`: fit the lagged causality engine against a modeling panel (the
//! canonical panel joined with box-office outcomes) and write the JSON,
//! CSV, and plain-text result artifacts.

use std::collections::BTreeMap;
use std::fs;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use serde_json::json;

use stagesignal_core::AppConfig;
use stagesignal_models::{
    fit_fe_ols, fit_panel_within, granger_lag_summaries, lag_sensitivity, prepare,
    GrangerLagSummary, ModelResult,
    SensitivitySummary,
};
use stagesignal_panel::features::{add_lags, DEFAULT_LAGS};
use stagesignal_panel::{io, DType, Frame, Value, ValidationStatus};

use crate::ModelArgs;

/// Refuse to model past a failed quality gate. The report defaults to the
/// one `validate` writes under the data dir; with no report anywhere,
/// `--allow-action-needed` is the only way forward.
fn enforce_quality_gate(
    data_dir: &Path,
    report: Option<&Path>,
    allow_action_needed: bool,
) -> anyhow::Result<()> {
    let fallback = data_dir.join("validation_report.json");
    let report_path = match report {
        Some(path) => path.to_path_buf(),
        None if fallback.exists() => fallback,
        None => {
            anyhow::ensure!(
                allow_action_needed,
                "no validation report found at {} (run `validate` first or pass --report; \
                 --allow-action-needed skips the gate)",
                fallback.display()
            );
            return Ok(());
        }
    };
    let report = io::read_validation_report(&report_path)
        .with_context(|| format!("reading report {}", report_path.display()))?;
    if report.status == ValidationStatus::ActionNeeded && !allow_action_needed {
        anyhow::bail!(
            "validation report {} is ACTION_NEEDED; pass --allow-action-needed to proceed anyway",
            report_path.display()
        );
    }
    Ok(())
}

pub fn run(config: &AppConfig, args: &ModelArgs) -> anyhow::Result<()> {
    enforce_quality_gate(
        &config.data_dir,
        args.report.as_deref(),
        args.allow_action_needed,
    )?;

    let mut frame = io::read_csv(&args.panel)
        .with_context(|| format!("reading panel {}", args.panel.display()))?;
    let outcome = args.outcome.column();
    anyhow::ensure!(
        frame.has_column(outcome),
        "panel {} has no outcome column {outcome}",
        args.panel.display()
    );
    frame.sort_rows_by(&["show", "week_start"]);

    let predictors = predictor_columns(&frame);
    anyhow::ensure!(
        !predictors.is_empty(),
        "panel {} has no engagement metric columns",
        args.panel.display()
    );

    let min_obs = args.min_obs.unwrap_or(config.model_min_obs);
    let mut wanted_lags = vec![args.lag];
    if args.sensitivity {
        wanted_lags.extend(DEFAULT_LAGS);
        wanted_lags.sort_unstable();
        wanted_lags.dedup();
    }
    for predictor in &predictors {
        for &lag in &wanted_lags {
            if !frame.has_column(&format!("{predictor}_lag{lag}")) {
                add_lags(&mut frame, &[predictor.as_str()], &[lag])?;
            }
        }
    }

    let mut results: Vec<ModelResult> = Vec::new();
    let mut skipped: Vec<(String, String)> = Vec::new();
    for predictor in &predictors {
        let column = format!("{predictor}_lag{}", args.lag);
        // Both estimator families per predictor: FE-OLS with the full-model
        // R², the within estimator with its within/between/overall trio.
        let fit = prepare(&frame, outcome, &column, &[], min_obs).and_then(|panel| {
            let fe = fit_fe_ols(&panel, outcome, &column, args.lag)?;
            let within = fit_panel_within(&panel, outcome, &column, args.lag)?;
            Ok([fe, within])
        });
        match fit {
            Ok(pair) => results.extend(pair),
            Err(e) => {
                tracing::warn!(predictor = %predictor, error = %e, "fit skipped");
                skipped.push((predictor.clone(), e.to_string()));
            }
        }
    }
    anyhow::ensure!(
        !results.is_empty(),
        "every fit failed ({} predictors skipped)",
        skipped.len()
    );
    results.sort_by(|a, b| {
        a.p_value
            .partial_cmp(&b.p_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut granger: BTreeMap<String, Vec<GrangerLagSummary>> = BTreeMap::new();
    if args.granger {
        for predictor in &predictors {
            match granger_lag_summaries(&frame, outcome, predictor, args.lag) {
                Ok(summaries) => {
                    granger.insert(predictor.clone(), summaries);
                }
                Err(e) => {
                    tracing::warn!(predictor = %predictor, error = %e, "granger skipped");
                }
            }
        }
    }

    let mut sensitivity: Vec<SensitivitySummary> = Vec::new();
    if args.sensitivity {
        for predictor in &predictors {
            sensitivity.push(lag_sensitivity(
                &frame,
                outcome,
                predictor,
                &DEFAULT_LAGS,
                min_obs,
            ));
        }
    }

    let out_dir = args.out_dir.clone().unwrap_or_else(|| config.data_dir.clone());
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();

    let json_path = out_dir.join(format!("model_results_{stamp}.json"));
    let payload = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "panel": args.panel.display().to_string(),
        "outcome": outcome,
        "lag": args.lag,
        "min_obs": min_obs,
        "results": results,
        "skipped": skipped
            .iter()
            .map(|(predictor, reason)| json!({"predictor": predictor, "reason": reason}))
            .collect::<Vec<_>>(),
        "granger": granger,
        "sensitivity": sensitivity,
    });
    fs::write(&json_path, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("writing {}", json_path.display()))?;

    let csv_path = out_dir.join(format!("model_results_{stamp}.csv"));
    write_results_csv(&results, &csv_path)?;

    let summary = render_summary(outcome, args.lag, &results, &skipped);
    let summary_path = out_dir.join(format!("model_summary_{stamp}.txt"));
    fs::write(&summary_path, &summary)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    print!("{summary}");
    println!("artifacts: {} / {}", json_path.display(), csv_path.display());
    Ok(())
}

/// Engagement metric columns eligible as predictors: numeric, carrying a
/// known source prefix, and not already a derived feature.
fn predictor_columns(frame: &Frame) -> Vec<String> {
    const PREFIXES: [&str; 5] = ["tt_", "ig_", "gt_", "wiki_", "rd_"];
    frame
        .columns()
        .iter()
        .filter(|c| matches!(c.dtype, DType::Int | DType::Float))
        .filter(|c| PREFIXES.iter().any(|p| c.name.starts_with(p)))
        .filter(|c| !c.name.contains("_lag") && !c.name.contains("_lead"))
        .map(|c| c.name.clone())
        .collect()
}

fn write_results_csv(results: &[ModelResult], path: &Path) -> anyhow::Result<()> {
    let mut table = Frame::with_columns(&[
        ("model_type", DType::Str),
        ("predictor", DType::Str),
        ("outcome", DType::Str),
        ("lag", DType::Int),
        ("coefficient", DType::Float),
        ("std_error", DType::Float),
        ("t_stat", DType::Float),
        ("p_value", DType::Float),
        ("ci_low", DType::Float),
        ("ci_high", DType::Float),
        ("r_squared", DType::Float),
        ("r_squared_within", DType::Float),
        ("r_squared_between", DType::Float),
        ("r_squared_overall", DType::Float),
        ("n_obs", DType::Int),
        ("n_shows", DType::Int),
    ]);
    for r in results {
        #[allow(clippy::cast_possible_wrap)]
        table.push_row(vec![
            Some(Value::Str(r.model_type.to_string())),
            Some(Value::Str(r.predictor.clone())),
            Some(Value::Str(r.outcome.clone())),
            Some(Value::Int(r.lag as i64)),
            Some(Value::Float(r.coefficient)),
            Some(Value::Float(r.std_error)),
            Some(Value::Float(r.t_stat)),
            Some(Value::Float(r.p_value)),
            Some(Value::Float(r.ci_low)),
            Some(Value::Float(r.ci_high)),
            r.r_squared.map(Value::Float),
            r.r_squared_within.map(Value::Float),
            r.r_squared_between.map(Value::Float),
            r.r_squared_overall.map(Value::Float),
            Some(Value::Int(r.n_obs as i64)),
            Some(Value::Int(r.n_shows as i64)),
        ])?;
    }
    io::write_csv(&table, path)?;
    Ok(())
}

fn source_of(predictor: &str) -> &'static str {
    if predictor.starts_with("tt_") {
        "tiktok"
    } else if predictor.starts_with("ig_") {
        "instagram"
    } else if predictor.starts_with("gt_") {
        "trends"
    } else if predictor.starts_with("wiki_") {
        "wikipedia"
    } else if predictor.starts_with("rd_") {
        "reddit"
    } else {
        "other"
    }
}

fn render_summary(
    outcome: &str,
    lag: usize,
    results: &[ModelResult],
    skipped: &[(String, String)],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "lagged engagement model: outcome={outcome} lag={lag}w");
    let _ = writeln!(out, "fits: {} ok, {} skipped", results.len(), skipped.len());

    let significant: Vec<&ModelResult> = results.iter().filter(|r| r.is_significant()).collect();
    let _ = writeln!(out, "\nsignificant predictors (p < 0.05), by source:");
    if significant.is_empty() {
        let _ = writeln!(out, "  none");
    } else {
        let mut by_source: BTreeMap<&str, Vec<&ModelResult>> = BTreeMap::new();
        for r in significant.iter().copied() {
            by_source.entry(source_of(&r.predictor)).or_default().push(r);
        }
        for (source, rows) in by_source {
            let _ = writeln!(out, "  {source}:");
            for r in rows {
                let _ = writeln!(
                    out,
                    "    {:<28} [{}] coef={:>12.4} t={:>7.2} p={:.4}",
                    r.predictor, r.model_type, r.coefficient, r.t_stat, r.p_value
                );
            }
        }
    }

    let _ = writeln!(out, "\ntop predictors by p-value:");
    for (rank, r) in results.iter().take(5).enumerate() {
        let _ = writeln!(
            out,
            "  {}. {:<28} [{}] p={:.4} coef={:.4} (n={}, shows={})",
            rank + 1,
            r.predictor,
            r.model_type,
            r.p_value,
            r.coefficient,
            r.n_obs,
            r.n_shows
        );
    }
    for (predictor, reason) in skipped {
        let _ = writeln!(out, "  skipped {predictor}: {reason}");
    }
    out
}
