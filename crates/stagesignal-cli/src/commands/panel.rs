//! `panel`: aggregate raw items into per-source weekly frames, merge them,
//! fill the missing weeks, and write the canonical panel plus its schema
//! companion.

use std::fs;

use anyhow::Context;
use chrono::Utc;

use stagesignal_core::{AppConfig, RawItem};
use stagesignal_panel::timebins::fill_missing_weeks;
use stagesignal_panel::{
    canonical_schema, default_source_specs, enforce_schema, io, merge_panels, Value,
};
use stagesignal_sources::weekly_frames;

use crate::PanelArgs;

pub fn run(config: &AppConfig, args: &PanelArgs) -> anyhow::Result<()> {
    let mut items: Vec<RawItem> = Vec::new();
    for path in &args.raw {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let batch: Vec<RawItem> =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        items.extend(batch);
    }
    anyhow::ensure!(!items.is_empty(), "no raw items in the given files");

    let observed_start = items.iter().map(|i| i.posted_at.date_naive()).min();
    let observed_end = items.iter().map(|i| i.posted_at.date_naive()).max();
    let start = args
        .start
        .or(observed_start)
        .context("cannot determine panel start")?;
    let end = args.end.or(observed_end).context("cannot determine panel end")?;

    let frames = weekly_frames(items, config.week_start_day)?;
    let merged = merge_panels(&frames)?;
    let mut panel = fill_missing_weeks(&merged, start, end, "show", config.week_start_day)?;

    // Rows inserted by the gap fill have no source data by construction.
    for spec in default_source_specs() {
        let flag = format!("has_{}", spec.name);
        for row in 0..panel.len() {
            if panel.get(row, &flag).is_none() {
                panel.set(row, &flag, Some(Value::Bool(false)));
            }
        }
    }

    let schema = canonical_schema();
    let mut panel = enforce_schema(&panel, &schema);
    let run_at = Utc::now().to_rfc3339();
    for row in 0..panel.len() {
        panel.set(row, "scrape_run_at", Some(Value::Str(run_at.clone())));
    }
    panel.sort_rows_by(&["show", "week_start"]);

    let out_dir = args.out_dir.clone().unwrap_or_else(|| config.data_dir.clone());
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let panel_path = out_dir.join("weekly_panel.csv");
    let schema_path = out_dir.join("weekly_panel_schema.json");
    io::write_csv(&panel, &panel_path)?;
    io::write_schema_json(&schema, &schema_path)?;

    println!(
        "panel: {} rows x {} columns ({start} to {end}) -> {}",
        panel.len(),
        panel.width(),
        panel_path.display()
    );
    Ok(())
}
