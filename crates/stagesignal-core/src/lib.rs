//! Shared configuration and record types for the stagesignal pipeline.
//!
//! Holds the env-driven application config, the tracked-show roster loaded
//! from YAML, and the raw per-item record every source collector emits.

use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod shows;
pub mod types;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use shows::{load_shows, ShowConfig, ShowsFile};
pub use types::{RawItem, Source};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read shows file {path}: {source}")]
    ShowsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse shows file: {0}")]
    ShowsFileParse(#[from] serde_yaml::Error),

    #[error("shows file validation failed: {0}")]
    Validation(String),
}
