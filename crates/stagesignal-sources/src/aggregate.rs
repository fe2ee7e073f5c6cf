//! Dedupe and weekly aggregation of raw items into per-source frames.
//!
//! Aggregation is where the absent-vs-zero rule matters most: a sum over a
//! metric every post withheld is absent, a sum over posts that genuinely
//! had zero engagement is zero. Counts (posts, posting days, unique
//! hashtags) are always defined once a group exists.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Weekday;

use stagesignal_core::{RawItem, Source};
use stagesignal_panel::timebins::{format_week, week_start};
use stagesignal_panel::{default_source_specs, DType, Frame, SourceSpec, Value};

use crate::error::SourceError;

/// Resolve duplicate `(source, item_id)` captures by keeping the copy with
/// the latest `captured_at`. Output order is deterministic (sorted by
/// source then id) and the operation is idempotent.
#[must_use]
pub fn dedupe_items(items: Vec<RawItem>) -> Vec<RawItem> {
    let before = items.len();
    let mut latest: BTreeMap<(&'static str, String), RawItem> = BTreeMap::new();
    for item in items {
        let key = (item.source.as_str(), item.item_id.clone());
        let keep = latest
            .get(&key)
            .is_none_or(|existing| item.captured_at > existing.captured_at);
        if keep {
            latest.insert(key, item);
        }
    }
    let deduped: Vec<RawItem> = latest.into_values().collect();
    if deduped.len() < before {
        tracing::debug!(before, after = deduped.len(), "deduplicated raw items");
    }
    deduped
}

/// Items of one source grouped by `(show, week_start)`, ordered by key.
fn weekly_groups(
    items: &[RawItem],
    source: Source,
    start_day: Weekday,
) -> BTreeMap<(String, String), Vec<&RawItem>> {
    let mut groups: BTreeMap<(String, String), Vec<&RawItem>> = BTreeMap::new();
    for item in items.iter().filter(|i| i.source == source) {
        let week = format_week(week_start(item.posted_at.date_naive(), start_day));
        groups
            .entry((item.show.clone(), week))
            .or_default()
            .push(item);
    }
    groups
}

/// Sum of the present values; absent when the metric was withheld on every
/// item in the group.
fn sum_present<I: Iterator<Item = Option<i64>>>(values: I) -> Option<Value> {
    let present: Vec<i64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(Value::Int(present.iter().sum()))
    }
}

#[allow(clippy::cast_possible_wrap)]
fn count(n: usize) -> Option<Value> {
    Some(Value::Int(n as i64))
}

fn posting_days(group: &[&RawItem]) -> usize {
    group
        .iter()
        .map(|i| i.posted_at.date_naive())
        .collect::<BTreeSet<_>>()
        .len()
}

fn unique_tags(group: &[&RawItem]) -> usize {
    group
        .iter()
        .flat_map(|i| i.tags.iter().map(|t| t.to_lowercase()))
        .collect::<BTreeSet<_>>()
        .len()
}

fn key_cells(show: &str, week: &str) -> [Option<Value>; 2] {
    [
        Some(Value::Str(show.to_string())),
        Some(Value::Str(week.to_string())),
    ]
}

/// Weekly short-video metrics (`tt_*`).
///
/// # Errors
///
/// Propagates frame construction failures as [`SourceError::Panel`].
pub fn aggregate_tiktok(items: &[RawItem], start_day: Weekday) -> Result<Frame, SourceError> {
    let mut frame = Frame::with_columns(&[
        ("show", DType::Str),
        ("week_start", DType::Str),
        ("tt_posts", DType::Int),
        ("tt_sum_views", DType::Int),
        ("tt_sum_likes", DType::Int),
        ("tt_sum_comments", DType::Int),
        ("tt_sum_shares", DType::Int),
        ("tt_unique_hashtags", DType::Int),
        ("tt_posting_days", DType::Int),
    ]);
    for ((show, week), group) in weekly_groups(items, Source::TikTok, start_day) {
        let [show_cell, week_cell] = key_cells(&show, &week);
        frame.push_row(vec![
            show_cell,
            week_cell,
            count(group.len()),
            sum_present(group.iter().map(|i| i.views)),
            sum_present(group.iter().map(|i| i.likes)),
            sum_present(group.iter().map(|i| i.comments)),
            sum_present(group.iter().map(|i| i.shares)),
            count(unique_tags(&group)),
            count(posting_days(&group)),
        ])?;
    }
    Ok(frame)
}

/// Weekly photo-feed metrics (`ig_*`); likes/comments stay absent when the
/// platform withheld them on every post that week.
///
/// # Errors
///
/// Propagates frame construction failures as [`SourceError::Panel`].
pub fn aggregate_instagram(items: &[RawItem], start_day: Weekday) -> Result<Frame, SourceError> {
    let mut frame = Frame::with_columns(&[
        ("show", DType::Str),
        ("week_start", DType::Str),
        ("ig_posts", DType::Int),
        ("ig_sum_likes", DType::Int),
        ("ig_sum_comments", DType::Int),
        ("ig_unique_hashtags", DType::Int),
        ("ig_reel_ct", DType::Int),
        ("ig_posting_days", DType::Int),
    ]);
    for ((show, week), group) in weekly_groups(items, Source::Instagram, start_day) {
        let reels = group.iter().filter(|i| i.is_reel == Some(true)).count();
        let [show_cell, week_cell] = key_cells(&show, &week);
        frame.push_row(vec![
            show_cell,
            week_cell,
            count(group.len()),
            sum_present(group.iter().map(|i| i.likes)),
            sum_present(group.iter().map(|i| i.comments)),
            count(unique_tags(&group)),
            count(reels),
            count(posting_days(&group)),
        ])?;
    }
    Ok(frame)
}

/// Weekly search-interest metrics (`gt_*`): mean index across every query
/// point in the week, and whether any point was partial.
///
/// # Errors
///
/// Propagates frame construction failures as [`SourceError::Panel`].
pub fn aggregate_trends(items: &[RawItem], start_day: Weekday) -> Result<Frame, SourceError> {
    let mut frame = Frame::with_columns(&[
        ("show", DType::Str),
        ("week_start", DType::Str),
        ("gt_index", DType::Float),
        ("gt_is_partial", DType::Bool),
    ]);
    for ((show, week), group) in weekly_groups(items, Source::Trends, start_day) {
        let values: Vec<f64> = group.iter().filter_map(|i| i.interest).collect();
        #[allow(clippy::cast_precision_loss)]
        let index = if values.is_empty() {
            None
        } else {
            Some(Value::Float(values.iter().sum::<f64>() / values.len() as f64))
        };
        let partial = group.iter().any(|i| i.is_partial == Some(true));
        let [show_cell, week_cell] = key_cells(&show, &week);
        frame.push_row(vec![show_cell, week_cell, index, Some(Value::Bool(partial))])?;
    }
    Ok(frame)
}

/// Weekly pageview metrics (`wiki_*`): summed daily views plus how many
/// days the API actually reported.
///
/// # Errors
///
/// Propagates frame construction failures as [`SourceError::Panel`].
pub fn aggregate_wikipedia(items: &[RawItem], start_day: Weekday) -> Result<Frame, SourceError> {
    let mut frame = Frame::with_columns(&[
        ("show", DType::Str),
        ("week_start", DType::Str),
        ("wiki_views", DType::Int),
        ("wiki_days", DType::Int),
    ]);
    for ((show, week), group) in weekly_groups(items, Source::Wikipedia, start_day) {
        let [show_cell, week_cell] = key_cells(&show, &week);
        frame.push_row(vec![
            show_cell,
            week_cell,
            sum_present(group.iter().map(|i| i.views)),
            count(posting_days(&group)),
        ])?;
    }
    Ok(frame)
}

/// Weekly forum metrics (`rd_*`).
///
/// # Errors
///
/// Propagates frame construction failures as [`SourceError::Panel`].
pub fn aggregate_reddit(items: &[RawItem], start_day: Weekday) -> Result<Frame, SourceError> {
    let mut frame = Frame::with_columns(&[
        ("show", DType::Str),
        ("week_start", DType::Str),
        ("rd_posts", DType::Int),
        ("rd_sum_score", DType::Int),
        ("rd_sum_comments", DType::Int),
        ("rd_posting_days", DType::Int),
    ]);
    for ((show, week), group) in weekly_groups(items, Source::Reddit, start_day) {
        let [show_cell, week_cell] = key_cells(&show, &week);
        frame.push_row(vec![
            show_cell,
            week_cell,
            count(group.len()),
            sum_present(group.iter().map(|i| i.score)),
            sum_present(group.iter().map(|i| i.comments)),
            count(posting_days(&group)),
        ])?;
    }
    Ok(frame)
}

/// Dedupe, then aggregate every source into `(spec, frame)` pairs in
/// canonical source order, ready for the panel merger.
///
/// # Errors
///
/// Propagates frame construction failures as [`SourceError::Panel`].
pub fn weekly_frames(
    items: Vec<RawItem>,
    start_day: Weekday,
) -> Result<Vec<(SourceSpec, Frame)>, SourceError> {
    let items = dedupe_items(items);
    let mut out = Vec::new();
    for spec in default_source_specs() {
        let frame = match spec.name {
            "tiktok" => aggregate_tiktok(&items, start_day)?,
            "instagram" => aggregate_instagram(&items, start_day)?,
            "trends" => aggregate_trends(&items, start_day)?,
            "wikipedia" => aggregate_wikipedia(&items, start_day)?,
            "reddit" => aggregate_reddit(&items, start_day)?,
            other => {
                return Err(SourceError::payload(
                    other,
                    "no aggregator registered for source",
                ))
            }
        };
        tracing::info!(source = spec.name, rows = frame.len(), "aggregated weekly frame");
        out.push((spec, frame));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(source: Source, id: &str, day: u32, captured_hour: u32) -> RawItem {
        RawItem::new(
            "hamlet",
            source,
            id,
            Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, captured_hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn dedupe_keeps_latest_capture_and_is_idempotent() {
        let mut stale = item(Source::TikTok, "v1", 3, 1);
        stale.views = Some(10);
        let mut fresh = item(Source::TikTok, "v1", 3, 9);
        fresh.views = Some(99);
        let other = item(Source::Reddit, "v1", 3, 1);

        let once = dedupe_items(vec![stale, fresh, other]);
        assert_eq!(once.len(), 2);
        let tiktok = once.iter().find(|i| i.source == Source::TikTok).unwrap();
        assert_eq!(tiktok.views, Some(99));

        let twice = dedupe_items(once.clone());
        assert_eq!(twice.len(), once.len());
        assert_eq!(twice[0].item_id, once[0].item_id);
    }

    #[test]
    fn tiktok_week_rolls_up_counts_and_sums() {
        let mut a = item(Source::TikTok, "a", 1, 0); // Mon 2024-01-01
        a.views = Some(100);
        a.likes = Some(10);
        a.tags = vec!["Broadway".into()];
        let mut b = item(Source::TikTok, "b", 3, 0); // Wed same week
        b.views = Some(50);
        b.tags = vec!["broadway".into(), "theatre".into()];

        let frame = aggregate_tiktok(&[a, b], Weekday::Mon).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.get_str(0, "week_start"), Some("2024-01-01"));
        assert_eq!(frame.get_f64(0, "tt_posts"), Some(2.0));
        assert_eq!(frame.get_f64(0, "tt_sum_views"), Some(150.0));
        // Only one post had likes; the sum is over present values.
        assert_eq!(frame.get_f64(0, "tt_sum_likes"), Some(10.0));
        assert_eq!(frame.get_f64(0, "tt_unique_hashtags"), Some(2.0));
        assert_eq!(frame.get_f64(0, "tt_posting_days"), Some(2.0));
    }

    #[test]
    fn withheld_metrics_stay_absent_not_zero() {
        let a = item(Source::Instagram, "p1", 2, 0);
        let b = item(Source::Instagram, "p2", 4, 0);

        let frame = aggregate_instagram(&[a, b], Weekday::Mon).unwrap();
        assert_eq!(frame.get_f64(0, "ig_posts"), Some(2.0));
        assert_eq!(frame.get(0, "ig_sum_likes"), None);
        assert_eq!(frame.get(0, "ig_sum_comments"), None);
        assert_eq!(frame.get_f64(0, "ig_reel_ct"), Some(0.0));
    }

    #[test]
    fn trends_week_means_queries_and_flags_partial() {
        let mut a = item(Source::Trends, "q1:2024-01-01", 1, 0);
        a.interest = Some(40.0);
        a.is_partial = Some(false);
        let mut b = item(Source::Trends, "q1:2024-01-02", 2, 0);
        b.interest = Some(60.0);
        b.is_partial = Some(true);

        let frame = aggregate_trends(&[a, b], Weekday::Mon).unwrap();
        assert_eq!(frame.get_f64(0, "gt_index"), Some(50.0));
        assert_eq!(frame.get(0, "gt_is_partial"), Some(&Value::Bool(true)));
    }

    #[test]
    fn items_split_across_weeks() {
        let mut a = item(Source::Wikipedia, "2024010100", 3, 0);
        a.views = Some(500);
        let mut b = item(Source::Wikipedia, "2024011000", 10, 0);
        b.views = Some(700);

        let frame = aggregate_wikipedia(&[a, b], Weekday::Mon).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get_str(0, "week_start"), Some("2024-01-01"));
        assert_eq!(frame.get_str(1, "week_start"), Some("2024-01-08"));
        assert_eq!(frame.get_f64(0, "wiki_views"), Some(500.0));
    }

    #[test]
    fn weekly_frames_cover_every_source() {
        let frames = weekly_frames(Vec::new(), Weekday::Mon).unwrap();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|(_, f)| f.is_empty()));
    }
}
