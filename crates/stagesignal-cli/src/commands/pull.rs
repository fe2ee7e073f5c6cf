//! `pull`: collect raw signals from every configured source for every
//! show in the roster and persist them as one JSON batch.

use std::fs;

use anyhow::Context;
use chrono::Utc;

use stagesignal_core::{load_shows, AppConfig, RawItem, ShowConfig};
use stagesignal_fetch::FetchClient;
use stagesignal_sources::{
    dedupe_items, ForumClient, ShortVideoClient, TrendsClient, WikipediaClient,
};

use crate::PullArgs;

pub async fn run(config: &AppConfig, args: &PullArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.start <= args.end, "window start is after its end");

    let roster = load_shows(&config.shows_path)
        .with_context(|| format!("loading roster {}", config.shows_path.display()))?;
    let fetch = FetchClient::from_config(config)?;

    let wiki = WikipediaClient::new(&fetch);
    let trends = args
        .trends_base_url
        .as_ref()
        .map(|base| TrendsClient::new(&fetch, base));
    let video = args
        .video_base_url
        .as_ref()
        .map(|base| ShortVideoClient::video(&fetch, base));
    let photo = args
        .photo_base_url
        .as_ref()
        .map(|base| ShortVideoClient::photo(&fetch, base));
    let forum = match &args.forum_base_url {
        Some(base) => ForumClient::new(&fetch).with_base_url(base),
        None => ForumClient::new(&fetch),
    };

    let mut items: Vec<RawItem> = Vec::new();
    for show in &roster.shows {
        collect_into(&mut items, show, wiki.collect(show, args.start, args.end).await);
        if let Some(client) = &trends {
            collect_into(&mut items, show, client.collect(show, args.start, args.end).await);
        }
        if let Some(client) = &video {
            collect_into(&mut items, show, client.collect(show, args.start, args.end).await);
        }
        if let Some(client) = &photo {
            collect_into(&mut items, show, client.collect(show, args.start, args.end).await);
        }
        collect_into(&mut items, show, forum.collect(show, args.start, args.end).await);
    }

    let items = dedupe_items(items);

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let path = config.data_dir.join(format!(
        "raw_items_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let text = serde_json::to_string_pretty(&items)?;
    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;

    println!(
        "pulled {} items for {} shows ({} to {}) -> {}",
        items.len(),
        roster.shows.len(),
        args.start,
        args.end,
        path.display()
    );
    Ok(())
}

/// Append a collector's items; a failed show/source pair is logged and
/// skipped so the rest of the run proceeds.
fn collect_into(
    items: &mut Vec<RawItem>,
    show: &ShowConfig,
    outcome: Result<Vec<RawItem>, stagesignal_sources::SourceError>,
) {
    match outcome {
        Ok(batch) => items.extend(batch),
        Err(e) => {
            tracing::warn!(show = %show.name, error = %e, "source collection failed; skipping");
        }
    }
}
