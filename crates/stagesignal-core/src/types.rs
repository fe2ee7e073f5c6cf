use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data source family a raw item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    TikTok,
    Instagram,
    Trends,
    Wikipedia,
    Reddit,
}

impl Source {
    /// Stable lowercase name used in logs, reports, and dedupe keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::TikTok => "tiktok",
            Source::Instagram => "instagram",
            Source::Trends => "trends",
            Source::Wikipedia => "wikipedia",
            Source::Reddit => "reddit",
        }
    }

    /// Column prefix this source contributes to the weekly panel.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Source::TikTok => "tt",
            Source::Instagram => "ig",
            Source::Trends => "gt",
            Source::Wikipedia => "wiki",
            Source::Reddit => "rd",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One post/article-view/query-point captured from a source.
///
/// Immutable once captured. Metric fields a platform withholds stay `None`;
/// downstream aggregation must never substitute zero for a withheld count.
/// Duplicates share `(source, item_id)` and are resolved by keeping the copy
/// with the latest `captured_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Show slug this item belongs to.
    pub show: String,
    pub source: Source,
    /// Source-native identifier (post id, date stamp, query key).
    pub item_id: String,
    /// When the item was posted / the observation occurred.
    pub posted_at: DateTime<Utc>,
    /// When this copy of the item was captured.
    pub captured_at: DateTime<Utc>,
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    /// Forum net score (upvotes minus downvotes).
    pub score: Option<i64>,
    /// Search-interest index in `[0, 100]`.
    pub interest: Option<f64>,
    /// Search-interest point covering a still-incomplete period.
    pub is_partial: Option<bool>,
    /// Short-form video flag on photo-feed posts.
    pub is_reel: Option<bool>,
    /// Free-text tags (hashtags, flair).
    pub tags: Vec<String>,
}

impl RawItem {
    /// A minimal item with every metric absent; collectors fill in what the
    /// platform exposed.
    #[must_use]
    pub fn new(
        show: impl Into<String>,
        source: Source,
        item_id: impl Into<String>,
        posted_at: DateTime<Utc>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            show: show.into(),
            source,
            item_id: item_id.into(),
            posted_at,
            captured_at,
            views: None,
            likes: None,
            comments: None,
            shares: None,
            score: None,
            interest: None,
            is_partial: None,
            is_reel: None,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_serializes_lowercase() {
        let json = serde_json::to_string(&Source::TikTok).unwrap();
        assert_eq!(json, "\"tiktok\"");
        assert_eq!(Source::Wikipedia.as_str(), "wikipedia");
    }

    #[test]
    fn prefixes_are_distinct() {
        let all = [
            Source::TikTok,
            Source::Instagram,
            Source::Trends,
            Source::Wikipedia,
            Source::Reddit,
        ];
        let prefixes: std::collections::HashSet<_> = all.iter().map(|s| s.prefix()).collect();
        assert_eq!(prefixes.len(), all.len());
    }
}
