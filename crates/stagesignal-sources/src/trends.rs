//! Search-interest collector.
//!
//! There is no stable public endpoint for search-interest data, so the API
//! root is always supplied by the caller (a licensed gateway in production,
//! a mock server in tests). The payload contract is one interest point per
//! day per query, indexed 0-100, with a partial flag on points whose period
//! has not closed yet.

use chrono::{NaiveDate, TimeZone, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;

use stagesignal_core::{RawItem, ShowConfig, Source};
use stagesignal_fetch::FetchClient;

use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct InterestResponse {
    points: Vec<InterestPoint>,
}

#[derive(Debug, Deserialize)]
struct InterestPoint {
    /// `YYYY-MM-DD`.
    date: String,
    value: f64,
    #[serde(default)]
    is_partial: bool,
}

pub struct TrendsClient<'a> {
    fetch: &'a FetchClient,
    base_url: String,
}

impl<'a> TrendsClient<'a> {
    #[must_use]
    pub fn new(fetch: &'a FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }

    /// Collect one item per (query, day). Shows with no configured queries
    /// yield no items; a failed query is skipped rather than failing the
    /// show, since queries are independent requests.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Payload`] when a returned date does not parse.
    pub async fn collect(
        &self,
        show: &ShowConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawItem>, SourceError> {
        let slug = show.slug();
        let captured_at = Utc::now();
        let mut items = Vec::new();

        for query in &show.trend_queries {
            let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC);
            let url = format!(
                "{}/interest-over-time?q={encoded}&start={start}&end={end}",
                self.base_url
            );
            let Some(response) = self.fetch.fetch_safe(&url).await else {
                tracing::warn!(show = %slug, query = %query, "interest query failed; skipping");
                continue;
            };
            let payload: InterestResponse = response.json()?;
            for point in payload.points {
                let day = NaiveDate::parse_from_str(&point.date, "%Y-%m-%d").map_err(|_| {
                    SourceError::payload("trends", format!("bad date {:?}", point.date))
                })?;
                let posted_at =
                    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default());
                let mut item = RawItem::new(
                    slug.clone(),
                    Source::Trends,
                    format!("{slug}:{query}:{}", point.date),
                    posted_at,
                    captured_at,
                );
                item.interest = Some(point.value);
                item.is_partial = Some(point.is_partial);
                item.tags = vec![query.clone()];
                items.push(item);
            }
        }

        tracing::info!(show = %slug, points = items.len(), "collected search interest");
        Ok(items)
    }
}
