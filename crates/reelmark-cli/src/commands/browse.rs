use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgAction, Args, ValueEnum};
use comfy_table::{presets, Cell, Table};
use owo_colors::OwoColorize;
use serde_json::json;

use reelmark_api::backend::BackendClient;
use reelmark_api::tmdb::types::{CatalogItem, Credits, Video};
use reelmark_api::traits::{CatalogService, DiscoverParams, Page, TimeWindow, TrendingScope};
use reelmark_core::models::{MediaRef, WatchlistEntry};
use reelmark_runtime::{Runtime, Watchlist};

use super::KindArg;
use crate::output::{self, or_na, rating, Output, NOT_AVAILABLE};

const CAST_SHOWN: usize = 6;
const POSTER_SIZE: &str = "w500";
const CREDITS_SHOWN: usize = 10;
const BIOGRAPHY_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    All,
    Movie,
    Tv,
}

impl From<ScopeArg> for TrendingScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::All => Self::All,
            ScopeArg::Movie => Self::Movie,
            ScopeArg::Tv => Self::Tv,
        }
    }
}

#[derive(Args)]
pub struct TrendingArgs {
    #[arg(value_enum, default_value = "all")]
    scope: ScopeArg,
    /// Trending today instead of this week
    #[arg(long, action = ArgAction::SetTrue)]
    day: bool,
    #[arg(long, default_value_t = 1)]
    page: u32,
}

#[derive(Args)]
pub struct DiscoverArgs {
    #[arg(value_enum)]
    kind: KindArg,
    /// e.g. popularity.desc, vote_average.desc
    #[arg(long)]
    sort_by: Option<String>,
    /// Genre ids, comma separated (see `reelmark genres`)
    #[arg(long = "genre", value_delimiter = ',')]
    genres: Vec<u64>,
    /// Released on or after (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Released on or before (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long, default_value_t = 1)]
    page: u32,
}

fn print_listing(page: &Page<CatalogItem>, output: &Output) {
    if page.results.is_empty() {
        output.info("No results");
    } else {
        output.println(output::catalog_table(&page.results).to_string());
        output.println(format!(
            "Page {} of {} ({} results)",
            page.page,
            page.total_pages.max(1),
            page.total_results
        ));
    }
    output.json(page);
}

pub async fn trending(args: TrendingArgs, runtime: &Runtime, output: &Output) -> Result<()> {
    let window = if args.day {
        TimeWindow::Day
    } else {
        TimeWindow::Week
    };
    let page = runtime
        .catalog()
        .await?
        .trending(args.scope.into(), window, args.page.max(1))
        .await?;
    print_listing(&page, output);
    Ok(())
}

pub async fn discover(args: DiscoverArgs, runtime: &Runtime, output: &Output) -> Result<()> {
    let mut params = DiscoverParams::new(args.kind.into())
        .page(args.page)
        .genres(args.genres)
        .dates(args.from, args.to);
    if let Some(sort_by) = args.sort_by {
        params = params.sort_by(sort_by);
    }
    let page = runtime.catalog().await?.discover(&params).await?;
    print_listing(&page, output);
    Ok(())
}

pub async fn upcoming(page: u32, runtime: &Runtime, output: &Output) -> Result<()> {
    let page = runtime.catalog().await?.upcoming(page.max(1)).await?;
    print_listing(&page, output);
    Ok(())
}

pub async fn search(query: &str, page: u32, runtime: &Runtime, output: &Output) -> Result<()> {
    let page = runtime.catalog().await?.search(query, page.max(1)).await?;
    print_listing(&page, output);
    Ok(())
}

pub async fn genres(kind: KindArg, runtime: &Runtime, output: &Output) -> Result<()> {
    let genres = runtime.catalog().await?.genres(kind.into()).await?;
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["ID", "Genre"]);
    for genre in &genres {
        table.add_row(vec![Cell::new(genre.id), Cell::new(&genre.name)]);
    }
    output.println(table.to_string());
    output.json(&genres);
    Ok(())
}

/// The user's watchlist if a backend is reachable. Detail views still
/// render without one.
async fn optional_watchlist(runtime: &Runtime) -> Option<Watchlist<BackendClient>> {
    match runtime.watchlist().await {
        Ok(watchlist) => Some(watchlist),
        Err(e) => {
            tracing::debug!(error = %e, "Rendering details without watchlist state");
            None
        }
    }
}

fn cast_line(credits: &Credits) -> Option<String> {
    let names: Vec<String> = credits
        .cast
        .iter()
        .take(CAST_SHOWN)
        .map(|c| match c.character.as_deref().filter(|ch| !ch.is_empty()) {
            Some(character) => format!("{} as {character}", c.name),
            None => c.name.clone(),
        })
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn trailer_url(videos: &[Video]) -> Option<String> {
    videos
        .iter()
        .filter(|v| v.is_trailer())
        .max_by_key(|v| v.official)
        .and_then(Video::url)
}

fn entry_line(entry: Option<&WatchlistEntry>) -> String {
    match entry {
        Some(entry) => format!(
            "On your watchlist (entry {}): {}",
            entry.id,
            output::entry_progress(entry)
        ),
        None => "Not on your watchlist".into(),
    }
}

pub async fn movie(id: u64, with_reviews: bool, runtime: &Runtime, output: &Output) -> Result<()> {
    let watchlist = optional_watchlist(runtime).await;
    let detail = runtime.movie_detail(watchlist.as_ref(), id).await?;
    let reviews = if with_reviews {
        Some(
            runtime
                .catalog()
                .await?
                .reviews(MediaRef::movie(id), 1)
                .await?,
        )
    } else {
        None
    };

    let images = runtime.config().await.catalog;
    let d = &detail.details;
    let year = d.release_date.as_deref().and_then(|r| r.get(..4));
    output.println(format!("{} ({})", d.title.bold(), year.unwrap_or(NOT_AVAILABLE)));
    if let Some(tagline) = d.tagline.as_deref().filter(|t| !t.is_empty()) {
        output.println(format!("\"{tagline}\""));
    }
    let genres: Vec<&str> = d.genres.iter().map(|g| g.name.as_str()).collect();
    output.println(format!(
        "Rating {} ({} votes) | {} | {}",
        rating(d.vote_average),
        or_na(d.vote_count),
        d.runtime.map_or_else(|| NOT_AVAILABLE.to_string(), |m| format!("{m} min")),
        if genres.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            genres.join(", ")
        }
    ));
    output.println(String::new());
    output.println(d.overview.as_deref().unwrap_or("No overview available."));
    output.println(String::new());
    output.println(format!("Cast: {}", or_na(cast_line(&detail.credits))));
    output.println(format!("Trailer: {}", or_na(trailer_url(&detail.videos))));
    output.println(format!(
        "Poster: {}",
        or_na(d.poster_path.as_deref().map(|p| images.image_url(POSTER_SIZE, p)))
    ));
    output.println(entry_line(detail.entry.as_ref()));

    if let Some(ref reviews) = reviews {
        output.println(String::new());
        output.println(format!("Reviews ({})", reviews.total_results));
        for review in &reviews.results {
            let score = review.author_details.as_ref().and_then(|a| a.rating);
            output.println(format!("- {} [{}]", review.author, rating(score)));
            output.println(format!("  {}", output::truncate(&review.content, 280)));
        }
    }

    output.json(&json!({
        "details": detail.details,
        "credits": detail.credits,
        "videos": detail.videos,
        "entry": detail.entry,
        "reviews": reviews,
    }));
    Ok(())
}

pub async fn tv(id: u64, season: Option<u32>, runtime: &Runtime, output: &Output) -> Result<()> {
    let watchlist = optional_watchlist(runtime).await;
    let detail = runtime.tv_detail(watchlist.as_ref(), id).await?;
    let images = runtime.config().await.catalog;
    let d = &detail.details;
    let entry = detail.entry.as_ref();

    let year = d.first_air_date.as_deref().and_then(|r| r.get(..4));
    output.println(format!("{} ({})", d.name.bold(), year.unwrap_or(NOT_AVAILABLE)));
    output.println(format!(
        "Rating {} | {} seasons | {} episodes | {}",
        rating(d.vote_average),
        or_na(d.number_of_seasons),
        or_na(d.number_of_episodes),
        d.status.as_deref().unwrap_or(NOT_AVAILABLE)
    ));
    output.println(String::new());
    output.println(d.overview.as_deref().unwrap_or("No overview available."));
    output.println(String::new());

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["Season", "Name", "Episodes", "Seen"]);
    for s in &d.seasons {
        let seen = match entry {
            _ if s.is_specials() => "-".to_string(),
            Some(entry) => season_progress(entry, s.season_number, s.episode_count),
            None => NOT_AVAILABLE.to_string(),
        };
        table.add_row(vec![
            Cell::new(s.season_number),
            Cell::new(s.name.as_deref().unwrap_or(NOT_AVAILABLE)),
            Cell::new(s.episode_count),
            Cell::new(seen),
        ]);
    }
    output.println(table.to_string());
    output.println(format!("Cast: {}", or_na(cast_line(&detail.credits))));
    output.println(format!("Trailer: {}", or_na(trailer_url(&detail.videos))));
    output.println(format!(
        "Poster: {}",
        or_na(d.poster_path.as_deref().map(|p| images.image_url(POSTER_SIZE, p)))
    ));
    output.println(entry_line(entry));

    let season_details = match season {
        Some(number) => Some(runtime.catalog().await?.tv_season(id, number).await?),
        None => None,
    };
    if let Some(ref sd) = season_details {
        output.println(String::new());
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_header(vec!["Episode", "Name", "Air date", "Seen"]);
        for ep in &sd.episodes {
            let seen = entry.is_some_and(|e| {
                e.seen_episodes
                    .contains(sd.season_number, ep.episode_number)
            });
            table.add_row(vec![
                Cell::new(ep.episode_number),
                Cell::new(ep.name.as_deref().unwrap_or(NOT_AVAILABLE)),
                Cell::new(ep.air_date.as_deref().unwrap_or(NOT_AVAILABLE)),
                Cell::new(if seen { "✓" } else { "" }),
            ]);
        }
        output.println(table.to_string());
    }

    output.json(&json!({
        "details": detail.details,
        "credits": detail.credits,
        "videos": detail.videos,
        "entry": detail.entry,
        "season": season_details,
    }));
    Ok(())
}

/// "seen/count" for a regular season, with a check once complete.
fn season_progress(entry: &WatchlistEntry, season: u32, episode_count: u32) -> String {
    let seen = entry.seen_episodes.seen_in_season(season);
    if episode_count == 0 {
        return format!("{seen}/?");
    }
    if entry.completed_seasons.contains(&season) {
        format!("{seen}/{episode_count} ✓")
    } else {
        format!("{seen}/{episode_count}")
    }
}

pub async fn person(id: u64, runtime: &Runtime, output: &Output) -> Result<()> {
    let person = runtime.catalog().await?.person(id).await?;

    output.println(person.name.bold().to_string());
    output.println(format!(
        "Known for: {} | Born: {} | {}",
        person.known_for_department.as_deref().unwrap_or(NOT_AVAILABLE),
        person.birthday.as_deref().unwrap_or(NOT_AVAILABLE),
        person.place_of_birth.as_deref().unwrap_or(NOT_AVAILABLE)
    ));
    if let Some(bio) = person.biography.as_deref().filter(|b| !b.is_empty()) {
        output.println(String::new());
        output.println(output::truncate(bio, BIOGRAPHY_CHARS));
    }

    let mut known_for: Vec<CatalogItem> = person
        .combined_credits
        .cast
        .iter()
        .chain(person.combined_credits.crew.iter())
        .map(|c| c.item.clone())
        .collect();
    known_for.sort_by(|a, b| {
        b.popularity
            .unwrap_or(0.0)
            .total_cmp(&a.popularity.unwrap_or(0.0))
    });
    known_for.dedup_by_key(|item| (item.id, item.media_type));
    known_for.truncate(CREDITS_SHOWN);
    if !known_for.is_empty() {
        output.println(String::new());
        output.println(output::catalog_table(&known_for).to_string());
    }

    output.json(&person);
    Ok(())
}
