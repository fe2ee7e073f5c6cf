//! Per-source signal collectors and their weekly aggregators.
//!
//! Each collector is a thin client over one public API that turns responses
//! into [`stagesignal_core::RawItem`]s; the aggregators in [`aggregate`]
//! dedupe those items, bin them into weeks, and emit per-source frames the
//! panel merger consumes. Collectors never substitute zero for a metric a
//! platform withheld.

pub mod aggregate;
pub mod error;
pub mod forum;
pub mod shortvideo;
pub mod trends;
pub mod wiki;

pub use aggregate::{dedupe_items, weekly_frames};
pub use error::SourceError;
pub use forum::ForumClient;
pub use shortvideo::ShortVideoClient;
pub use trends::TrendsClient;
pub use wiki::WikipediaClient;
