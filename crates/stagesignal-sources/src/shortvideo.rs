//! Short-video and photo-feed post collectors.
//!
//! Both platforms expose the same post-listing shape through the research
//! gateway, so one client serves both; the source decides which account
//! handle to read from the roster and which metrics the platform actually
//! reports. The photo feed withholds like/comment counts on some accounts;
//! those stay absent on the item.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;

use stagesignal_core::{RawItem, ShowConfig, Source};
use stagesignal_fetch::FetchClient;

use crate::error::SourceError;

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("hashtag pattern is valid"));

#[derive(Debug, Deserialize)]
struct PostsResponse {
    posts: Vec<PostPayload>,
}

#[derive(Debug, Deserialize)]
struct PostPayload {
    id: String,
    created_at: DateTime<Utc>,
    caption: Option<String>,
    views: Option<i64>,
    likes: Option<i64>,
    comments: Option<i64>,
    shares: Option<i64>,
    is_reel: Option<bool>,
}

pub struct ShortVideoClient<'a> {
    fetch: &'a FetchClient,
    base_url: String,
    source: Source,
}

impl<'a> ShortVideoClient<'a> {
    /// Collector for the short-video platform (reads `video_handle`).
    #[must_use]
    pub fn video(fetch: &'a FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
            source: Source::TikTok,
        }
    }

    /// Collector for the photo-feed platform (reads `photo_handle`).
    #[must_use]
    pub fn photo(fetch: &'a FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
            source: Source::Instagram,
        }
    }

    fn handle<'s>(&self, show: &'s ShowConfig) -> Option<&'s str> {
        match self.source {
            Source::TikTok => show.video_handle.as_deref(),
            Source::Instagram => show.photo_handle.as_deref(),
            _ => None,
        }
    }

    /// Collect the account's posts in the window. A show without a handle,
    /// or whose account cannot be fetched, yields no items and does not
    /// stop the run.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] with category `Parse` when the
    /// gateway answers with an unreadable body.
    pub async fn collect(
        &self,
        show: &ShowConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawItem>, SourceError> {
        let slug = show.slug();
        let Some(handle) = self.handle(show) else {
            tracing::debug!(show = %slug, source = %self.source, "no handle configured; skipping");
            return Ok(Vec::new());
        };

        let url = format!(
            "{}/users/{handle}/posts?since={start}&until={end}",
            self.base_url
        );
        let Some(response) = self.fetch.fetch_safe(&url).await else {
            tracing::warn!(show = %slug, source = %self.source, "account fetch failed; skipping show");
            return Ok(Vec::new());
        };
        let payload: PostsResponse = response.json()?;

        let captured_at = Utc::now();
        let mut items = Vec::with_capacity(payload.posts.len());
        for post in payload.posts {
            let mut item = RawItem::new(
                slug.clone(),
                self.source,
                post.id,
                post.created_at,
                captured_at,
            );
            item.views = post.views;
            item.likes = post.likes;
            item.comments = post.comments;
            item.shares = post.shares;
            item.is_reel = post.is_reel;
            if let Some(caption) = &post.caption {
                item.tags = extract_hashtags(caption);
            }
            items.push(item);
        }

        tracing::info!(show = %slug, source = %self.source, posts = items.len(), "collected posts");
        Ok(items)
    }
}

/// Lowercased hashtags from a caption, deduplicated, in first-seen order.
#[must_use]
pub fn extract_hashtags(caption: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for capture in HASHTAG.captures_iter(caption) {
        let tag = capture[1].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
