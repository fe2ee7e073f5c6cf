//! Weekly panel construction for stagesignal.
//!
//! Owns the small column-frame type the pipeline is built on, the weekly
//! time binner, the canonical schema enforcer, the multi-source panel
//! merger, the data-quality gate, feature engineering, and the CSV/JSON
//! artifact codecs. Everything here is a pure function over frames; no I/O
//! happens outside [`io`].

use thiserror::Error;

pub mod features;
pub mod frame;
pub mod io;
pub mod merge;
pub mod quality;
pub mod schema;
pub mod timebins;

pub use frame::{Column, DType, Frame, Value};
pub use merge::{default_source_specs, merge_panels, SourceSpec};
pub use quality::{generate_validation_report, QualityConfig, ValidationReport, ValidationStatus};
pub use schema::{canonical_schema, enforce_schema, validate_schema, ColumnSpec};

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("column not found: {name}")]
    ColumnNotFound { name: String },

    #[error("duplicate column: {name}")]
    DuplicateColumn { name: String },

    #[error("row arity {got} does not match column count {expected}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("column {name} has {got} values but frame has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("CSV parse error at line {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
