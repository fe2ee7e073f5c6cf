//! Wikimedia pageviews collector.
//!
//! Uses the published Wikimedia REST API, which sanctions programmatic
//! access under its own rate rules, so the caller typically builds the
//! shared [`FetchClient`] with robots checking left on and the REST origin
//! simply has no disallow for this path.

use chrono::{NaiveDate, TimeZone, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;

use stagesignal_core::{RawItem, ShowConfig, Source};
use stagesignal_fetch::FetchClient;

use crate::error::SourceError;

const DEFAULT_BASE_URL: &str = "https://wikimedia.org/api/rest_v1";

/// Characters that must be escaped inside a path segment; article titles
/// keep their underscores and punctuation otherwise.
const TITLE_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'/');

#[derive(Debug, Deserialize)]
struct PageviewsResponse {
    items: Vec<PageviewItem>,
}

#[derive(Debug, Deserialize)]
struct PageviewItem {
    /// `YYYYMMDD00` day stamp.
    timestamp: String,
    views: i64,
}

/// Daily pageview collector for one wiki article per show.
pub struct WikipediaClient<'a> {
    fetch: &'a FetchClient,
    base_url: String,
}

impl<'a> WikipediaClient<'a> {
    #[must_use]
    pub fn new(fetch: &'a FetchClient) -> Self {
        Self {
            fetch,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (tests, mirrors).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Collect one item per day the API reports for the show's article.
    /// Shows without a configured article yield no items.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] on request failure or
    /// [`SourceError::Payload`] when a day stamp does not parse.
    pub async fn collect(
        &self,
        show: &ShowConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawItem>, SourceError> {
        let Some(article) = &show.wiki_article else {
            tracing::debug!(show = %show.name, "no wiki article configured; skipping");
            return Ok(Vec::new());
        };

        let title = utf8_percent_encode(article, TITLE_ESCAPE);
        let url = format!(
            "{}/metrics/pageviews/per-article/en.wikipedia/all-access/user/{title}/daily/{}00/{}00",
            self.base_url,
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );

        let response = self.fetch.fetch(&url).await?;
        let payload: PageviewsResponse = response.json()?;

        let slug = show.slug();
        let captured_at = Utc::now();
        let mut items = Vec::with_capacity(payload.items.len());
        for point in payload.items {
            let day = point
                .timestamp
                .get(..8)
                .and_then(|stamp| NaiveDate::parse_from_str(stamp, "%Y%m%d").ok())
                .ok_or_else(|| {
                    SourceError::payload(
                        "wikipedia",
                        format!("bad day stamp {:?}", point.timestamp),
                    )
                })?;
            let posted_at = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default());
            let mut item = RawItem::new(
                slug.clone(),
                Source::Wikipedia,
                format!("{slug}:{}", point.timestamp),
                posted_at,
                captured_at,
            );
            item.views = Some(point.views);
            items.push(item);
        }

        tracing::info!(show = %slug, days = items.len(), "collected pageviews");
        Ok(items)
    }
}
