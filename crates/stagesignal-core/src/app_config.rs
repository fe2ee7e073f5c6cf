use std::path::PathBuf;

use chrono::Weekday;

/// Runtime configuration for the pipeline, loaded from env vars.
///
/// Fetch politeness and retry knobs apply to every source collector; the
/// quality-gate thresholds drive the OK / ACTION_NEEDED decision.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    /// Path to the tracked-show roster (YAML).
    pub shows_path: PathBuf,
    /// Root directory for panel/report/model artifacts.
    pub data_dir: PathBuf,

    pub fetch_user_agent: String,
    pub fetch_timeout_secs: u64,
    /// Randomized pre-request delay window, milliseconds.
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
    /// Total attempts per URL (first try + retries).
    pub fetch_max_attempts: u32,
    pub fetch_backoff_base_ms: u64,
    pub fetch_max_backoff_ms: u64,

    /// First day of the weekly bin every source is aggregated into.
    pub week_start_day: Weekday,

    pub anomaly_threshold: f64,
    pub anomaly_lookback_weeks: usize,
    /// Anomaly count above which the validation status flips to ACTION_NEEDED.
    pub anomaly_ceiling: usize,
    /// Minimum per-source coverage (percent of panel rows) before ACTION_NEEDED.
    pub coverage_floor_pct: f64,

    /// Minimum non-absent observations a predictor needs before a fit runs.
    pub model_min_obs: usize,
}
