//! Discussion-forum collector (Reddit-style listing API).

use chrono::{DateTime, NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;

use stagesignal_core::{RawItem, ShowConfig, Source};
use stagesignal_fetch::FetchClient;

use crate::error::SourceError;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    created_utc: f64,
    score: Option<i64>,
    num_comments: Option<i64>,
    link_flair_text: Option<String>,
}

pub struct ForumClient<'a> {
    fetch: &'a FetchClient,
    base_url: String,
}

impl<'a> ForumClient<'a> {
    #[must_use]
    pub fn new(fetch: &'a FetchClient) -> Self {
        Self {
            fetch,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search for the show's forum terms (falling back to the show name)
    /// and keep posts created inside the window. A failed term is skipped;
    /// overlapping terms produce duplicates the dedupe pass resolves.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] with category `Parse` on an
    /// unreadable listing body.
    pub async fn collect(
        &self,
        show: &ShowConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawItem>, SourceError> {
        let slug = show.slug();
        let terms: Vec<&str> = if show.forum_terms.is_empty() {
            vec![show.name.as_str()]
        } else {
            show.forum_terms.iter().map(String::as_str).collect()
        };

        let captured_at = Utc::now();
        let mut items = Vec::new();
        for term in terms {
            let encoded = utf8_percent_encode(term, NON_ALPHANUMERIC);
            let url = format!(
                "{}/search.json?q={encoded}&sort=new&limit={PAGE_LIMIT}",
                self.base_url
            );
            let Some(response) = self.fetch.fetch_safe(&url).await else {
                tracing::warn!(show = %slug, term, "forum search failed; skipping term");
                continue;
            };
            let listing: Listing = response.json()?;

            for post in listing.data.children {
                #[allow(clippy::cast_possible_truncation)]
                let Some(posted_at) = DateTime::from_timestamp(post.data.created_utc as i64, 0)
                else {
                    tracing::warn!(show = %slug, id = %post.data.id, "unrepresentable post timestamp; dropping");
                    continue;
                };
                let posted_day = posted_at.date_naive();
                if posted_day < start || posted_day > end {
                    continue;
                }
                let mut item = RawItem::new(
                    slug.clone(),
                    Source::Reddit,
                    post.data.id,
                    posted_at,
                    captured_at,
                );
                item.score = post.data.score;
                item.comments = post.data.num_comments;
                if let Some(flair) = post.data.link_flair_text {
                    item.tags = vec![flair];
                }
                items.push(item);
            }
        }

        tracing::info!(show = %slug, posts = items.len(), "collected forum posts");
        Ok(items)
    }
}
