use anyhow::{anyhow, Result};

use reelmark_api::backend::BackendClient;
use reelmark_core::models::{episode_code, WatchlistEntry};
use reelmark_core::progress::{self, needs_season_backfill};
use reelmark_runtime::{Runtime, Watchlist};

use super::library::signed_in_watchlist;
use crate::output::{self, Output};

async fn lookup(watchlist: &Watchlist<BackendClient>, id: &str) -> Result<WatchlistEntry> {
    watchlist
        .get(id)
        .await
        .ok_or_else(|| anyhow!("no watchlist entry with id {id} (see `reelmark list`)"))
}

/// Entry with season data, fetched from the catalog first if missing.
async fn with_seasons(
    runtime: &Runtime,
    watchlist: &Watchlist<BackendClient>,
    id: &str,
) -> Result<WatchlistEntry> {
    let entry = lookup(watchlist, id).await?;
    if !needs_season_backfill(&entry) {
        return Ok(entry);
    }
    let detail = runtime.tv_detail(Some(watchlist), entry.tmdb_id).await?;
    Ok(detail.entry.unwrap_or(entry))
}

fn report(entry: &WatchlistEntry, output: &Output) {
    output.println(format!(
        "{}: {} ({})",
        entry.display_title().unwrap_or(output::NOT_AVAILABLE),
        output::entry_progress(entry),
        progress::watch_state(entry)
    ));
    output.json(entry);
}

pub async fn seen(id: &str, runtime: &Runtime, output: &Output) -> Result<()> {
    let watchlist = signed_in_watchlist(runtime).await?;
    let entry = watchlist.toggle_movie_seen(id).await?;
    report(&entry, output);
    Ok(())
}

pub async fn episode(
    id: &str,
    season: u32,
    episode: u32,
    runtime: &Runtime,
    output: &Output,
) -> Result<()> {
    let watchlist = signed_in_watchlist(runtime).await?;
    let entry = with_seasons(runtime, &watchlist, id).await?;
    let episode_count = entry.snapshot.episode_count(season);
    let entry = watchlist
        .toggle_episode(id, season, episode, episode_count)
        .await?;
    let state = if entry.seen_episodes.contains(season, episode) {
        "seen"
    } else {
        "not seen"
    };
    output.println(format!("{} marked {state}", episode_code(season, episode)));
    report(&entry, output);
    Ok(())
}

pub async fn season(
    id: &str,
    season: u32,
    seen: bool,
    runtime: &Runtime,
    output: &Output,
) -> Result<()> {
    let watchlist = signed_in_watchlist(runtime).await?;
    let entry = with_seasons(runtime, &watchlist, id).await?;
    let episode_count = entry.snapshot.episode_count(season).ok_or_else(|| {
        anyhow!("episode count of season {season} is unknown; toggle episodes one by one")
    })?;

    let entry = watchlist
        .set_season_seen(id, season, episode_count, seen)
        .await?;
    output.println(format!(
        "Season {season}: {}/{episode_count} seen",
        entry.seen_episodes.seen_in_season(season)
    ));
    report(&entry, output);
    Ok(())
}
