use std::path::PathBuf;

use chrono::Weekday;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if any value fails to parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files, which suits tests
/// and callers that manage env setup themselves.
///
/// # Errors
///
/// Returns `ConfigError` if any value fails to parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup, no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<f64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let log_level = or_default("SIGNAL_LOG_LEVEL", "info");
    let shows_path = PathBuf::from(or_default("SIGNAL_SHOWS_PATH", "./config/shows.yaml"));
    let data_dir = PathBuf::from(or_default("SIGNAL_DATA_DIR", "./data"));

    let fetch_user_agent = or_default(
        "SIGNAL_FETCH_USER_AGENT",
        "stagesignal/0.1 (broadway-engagement-research)",
    );
    let fetch_timeout_secs = parse_u64("SIGNAL_FETCH_TIMEOUT_SECS", "30")?;
    let politeness_min_ms = parse_u64("SIGNAL_POLITENESS_MIN_MS", "2000")?;
    let politeness_max_ms = parse_u64("SIGNAL_POLITENESS_MAX_MS", "5000")?;
    if politeness_max_ms < politeness_min_ms {
        return Err(ConfigError::InvalidEnvVar {
            var: "SIGNAL_POLITENESS_MAX_MS".to_string(),
            reason: format!("must be >= SIGNAL_POLITENESS_MIN_MS ({politeness_min_ms})"),
        });
    }
    let fetch_max_attempts = parse_u32("SIGNAL_FETCH_MAX_ATTEMPTS", "4")?;
    let fetch_backoff_base_ms = parse_u64("SIGNAL_FETCH_BACKOFF_BASE_MS", "2000")?;
    let fetch_max_backoff_ms = parse_u64("SIGNAL_FETCH_MAX_BACKOFF_MS", "16000")?;

    let week_start_day = parse_week_start_day(&or_default("SIGNAL_WEEK_START_DAY", "monday"))?;

    let anomaly_threshold = parse_f64("SIGNAL_ANOMALY_THRESHOLD", "5.0")?;
    let anomaly_lookback_weeks = parse_usize("SIGNAL_ANOMALY_LOOKBACK_WEEKS", "8")?;
    let anomaly_ceiling = parse_usize("SIGNAL_ANOMALY_CEILING", "10")?;
    let coverage_floor_pct = parse_f64("SIGNAL_COVERAGE_FLOOR_PCT", "60.0")?;

    let model_min_obs = parse_usize("SIGNAL_MODEL_MIN_OBS", "30")?;

    Ok(AppConfig {
        log_level,
        shows_path,
        data_dir,
        fetch_user_agent,
        fetch_timeout_secs,
        politeness_min_ms,
        politeness_max_ms,
        fetch_max_attempts,
        fetch_backoff_base_ms,
        fetch_max_backoff_ms,
        week_start_day,
        anomaly_threshold,
        anomaly_lookback_weeks,
        anomaly_ceiling,
        coverage_floor_pct,
        model_min_obs,
    })
}

/// Parse a week-start day name ("monday", "sun", "Tue") into a `Weekday`.
fn parse_week_start_day(raw: &str) -> Result<Weekday, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SIGNAL_WEEK_START_DAY".to_string(),
            reason: format!("unrecognized day name: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_apply_with_empty_env() {
        let map = HashMap::new();
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(config.week_start_day, Weekday::Mon);
        assert_eq!(config.fetch_max_attempts, 4);
        assert_eq!(config.politeness_min_ms, 2000);
        assert_eq!(config.politeness_max_ms, 5000);
        assert!((config.anomaly_threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.anomaly_lookback_weeks, 8);
        assert!((config.coverage_floor_pct - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overrides_are_read() {
        let mut map = HashMap::new();
        map.insert("SIGNAL_WEEK_START_DAY", "sunday");
        map.insert("SIGNAL_FETCH_MAX_ATTEMPTS", "6");
        map.insert("SIGNAL_ANOMALY_THRESHOLD", "3.5");
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(config.week_start_day, Weekday::Sun);
        assert_eq!(config.fetch_max_attempts, 6);
        assert!((config.anomaly_threshold - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_numeric_value_is_rejected() {
        let mut map = HashMap::new();
        map.insert("SIGNAL_FETCH_MAX_ATTEMPTS", "many");
        let err = build_app_config(lookup_from_map(&map)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { var, .. } if var == "SIGNAL_FETCH_MAX_ATTEMPTS"));
    }

    #[test]
    fn invalid_week_day_is_rejected() {
        let mut map = HashMap::new();
        map.insert("SIGNAL_WEEK_START_DAY", "someday");
        assert!(build_app_config(lookup_from_map(&map)).is_err());
    }

    #[test]
    fn politeness_window_must_be_ordered() {
        let mut map = HashMap::new();
        map.insert("SIGNAL_POLITENESS_MIN_MS", "5000");
        map.insert("SIGNAL_POLITENESS_MAX_MS", "1000");
        assert!(build_app_config(lookup_from_map(&map)).is_err());
    }
}
